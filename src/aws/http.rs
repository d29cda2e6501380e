//! HTTP utilities for signed AWS API calls

use super::auth::{Signer, SigningRequest};
use crate::error::{ApiError, ApiErrorCode, ProviderError, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.chars().count() > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Retry configuration for throttled or failed calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }
}

/// A fully-built request, ready to be signed and sent
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub operation: &'static str,
    pub method: Method,
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// HTTP client wrapper for AWS API calls
#[derive(Clone)]
pub struct AwsHttpClient {
    client: Client,
    retry: RetryConfig,
}

impl AwsHttpClient {
    /// Create a new HTTP client
    pub fn new(retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cloudrec/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Transport {
                endpoint: "client builder".to_string(),
                source: e,
            })?;

        Ok(Self { client, retry })
    }

    /// Sign and send a request, retrying throttling and server errors.
    /// Returns the parsed JSON body (`Value::Null` for empty bodies).
    pub async fn send(&self, signer: &Signer, request: &ApiRequest) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.send_once(signer, request).await {
                Err(ProviderError::RemoteApi { source, operation, .. })
                    if source.is_retryable() && attempt + 1 < self.retry.max_attempts =>
                {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} failed with {} (attempt {}), retrying in {:?}",
                        operation,
                        source.code,
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once(&self, signer: &Signer, request: &ApiRequest) -> Result<Value> {
        tracing::debug!("{} {} ({})", request.method, request.url, request.operation);

        let signing = SigningRequest {
            method: request.method.as_str(),
            url: &request.url,
            headers: &request.headers,
            body: &request.body,
        };
        let auth_headers = signer.sign(&signing, std::time::SystemTime::now())?;

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in request.headers.iter().chain(auth_headers.iter()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let endpoint = request.url.origin().ascii_serialization();
        let response = builder.send().await.map_err(|e| ProviderError::Transport {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| ProviderError::Transport {
            endpoint,
            source: e,
        })?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            let error = parse_api_error(status.as_u16(), &headers, &body);
            return Err(ProviderError::remote(request.operation, request.url.path(), error));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::decode(format!("{} response", request.operation), e))
    }
}

/// Decode an error response from any of the supported protocols:
/// REST-JSON (`x-amzn-ErrorType` header), JSON-RPC (`__type`) and
/// Query with JSON replies (`Error.Code`).
pub fn parse_api_error(status: u16, headers: &HeaderMap, body: &str) -> ApiError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    let header_code = headers
        .get("x-amzn-errortype")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body_code = ["__type", "code", "Code"]
        .iter()
        .find_map(|k| parsed.get(*k).and_then(|v| v.as_str()))
        .or_else(|| {
            parsed
                .get("Error")
                .and_then(|e| e.get("Code"))
                .and_then(|v| v.as_str())
        })
        .map(|s| s.to_string());

    let code = header_code
        .or(body_code)
        .map(|raw| normalize_code(&raw))
        .map(|raw| ApiErrorCode::from_wire(&raw))
        .unwrap_or_else(|| match status {
            404 => ApiErrorCode::NotFound,
            429 => ApiErrorCode::Throttling,
            403 => ApiErrorCode::AccessDenied,
            _ => ApiErrorCode::Other(format!("Http{}", status)),
        });

    let message = ["message", "Message"]
        .iter()
        .find_map(|k| parsed.get(*k).and_then(|v| v.as_str()))
        .or_else(|| {
            parsed
                .get("Error")
                .and_then(|e| e.get("Message"))
                .and_then(|v| v.as_str())
        })
        .map(|s| s.to_string())
        .unwrap_or_else(|| sanitize_for_log(body));

    let request_id = headers
        .get("x-amzn-requestid")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            parsed
                .get("RequestId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        });

    ApiError {
        status,
        code,
        message,
        request_id,
    }
}

/// `aws.protocoltests#ResourceNotFoundException` or
/// `ResourceNotFoundException:http://internal.amazon.com/` -> `ResourceNotFoundException`
fn normalize_code(raw: &str) -> String {
    let without_uri = raw.split(':').next().unwrap_or(raw);
    let short = without_uri.rsplit('#').next().unwrap_or(without_uri);
    short.trim().to_string()
}
