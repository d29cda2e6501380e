//! AWS Authentication
//!
//! Resolves credentials and the default region through the standard AWS
//! provider chain (environment, shared config and credentials files, SSO,
//! container and instance metadata) and signs requests with Signature
//! Version 4.

use crate::error::{ProviderError, Result};
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use std::time::SystemTime;

pub use aws_credential_types::Credentials;

/// Region used when nothing else is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Credentials and region resolved from the provider chain
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub credentials: Credentials,
    /// Region from AWS_REGION or the profile, when one is set
    pub region: Option<String>,
}

/// Load credentials and region for `profile` (or the default chain)
pub async fn load_identity(profile: Option<&str>) -> Result<ResolvedIdentity> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    let sdk_config = loader.load().await;

    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| ProviderError::Credentials("no credentials provider configured".to_string()))?;
    let credentials = provider
        .provide_credentials()
        .await
        .map_err(|e| ProviderError::Credentials(e.to_string()))?;

    // Security: Validates the region format before using it in endpoints
    let region = sdk_config.region().map(|r| r.to_string()).filter(|r| {
        let valid = validate_region(r);
        if !valid {
            tracing::warn!("Ignoring invalid region from AWS configuration");
        }
        valid
    });

    tracing::debug!("Resolved credentials for access key {}", credentials.access_key_id());
    Ok(ResolvedIdentity { credentials, region })
}

/// Validate an AWS region name such as `eu-west-1` or `us-gov-east-1`
pub fn validate_region(region: &str) -> bool {
    if region.len() < 9 || region.len() > 25 {
        return false;
    }
    region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && region.contains('-')
        && region.chars().last().is_some_and(|c| c.is_ascii_digit())
}

/// A request as seen by the signer
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub url: &'a url::Url,
    /// Extra headers that must be covered by the signature (content-type, x-amz-target)
    pub headers: &'a [(String, String)],
    pub body: &'a [u8],
}

/// SigV4 signer for a single service/region pair
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    region: String,
    service: &'static str,
}

fn signing_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Signing(e.to_string())
}

impl Signer {
    pub fn new(credentials: Credentials, region: &str, service: &'static str) -> Self {
        Self {
            credentials,
            region: region.to_string(),
            service,
        }
    }

    /// Compute the headers to add to the request: x-amz-date,
    /// x-amz-security-token (when present) and authorization.
    pub fn sign(&self, request: &SigningRequest<'_>, time: SystemTime) -> Result<Vec<(String, String)>> {
        let identity: Identity = self.credentials.clone().into();
        let params: aws_sigv4::http_request::SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(time)
            .settings(SigningSettings::default())
            .build()
            .map_err(signing_error)?
            .into();

        let signable = SignableRequest::new(
            request.method,
            request.url.as_str(),
            request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            SignableBody::Bytes(request.body),
        )
        .map_err(signing_error)?;

        let (instructions, _signature) = sign(signable, &params).map_err(signing_error)?.into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}
