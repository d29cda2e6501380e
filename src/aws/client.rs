//! AWS Client
//!
//! Main client handle passed to every handler call. Combines credentials,
//! the signing HTTP client, endpoint resolution and the three wire
//! protocols the handlers speak.

use super::auth::{Credentials, Signer, DEFAULT_REGION};
use super::http::{ApiRequest, AwsHttpClient, RetryConfig};
use crate::error::{ProviderError, Result};
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const JSON_CONTENT_TYPE: &str = "application/json";
const AMZ_JSON_1_0: &str = "application/x-amz-json-1.0";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Remote services the handlers talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Backup,
    Iam,
    OpenSearchServerless,
    QuickSight,
    Rum,
    Sts,
}

impl Service {
    /// Name used in the SigV4 credential scope
    pub fn signing_name(self) -> &'static str {
        match self {
            Service::Backup => "backup",
            Service::Iam => "iam",
            Service::OpenSearchServerless => "aoss",
            Service::QuickSight => "quicksight",
            Service::Rum => "rum",
            Service::Sts => "sts",
        }
    }

    /// Key used for endpoint overrides in the configuration file
    pub fn config_key(self) -> &'static str {
        match self {
            Service::Backup => "backup",
            Service::Iam => "iam",
            Service::OpenSearchServerless => "opensearchserverless",
            Service::QuickSight => "quicksight",
            Service::Rum => "rum",
            Service::Sts => "sts",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        [
            Service::Backup,
            Service::Iam,
            Service::OpenSearchServerless,
            Service::QuickSight,
            Service::Rum,
            Service::Sts,
        ]
        .into_iter()
        .find(|s| s.config_key() == key)
    }

    /// IAM is a global service, signed in us-east-1
    fn is_global(self) -> bool {
        matches!(self, Service::Iam)
    }
}

/// Main AWS client
#[derive(Clone)]
pub struct AwsClient {
    pub http: AwsHttpClient,
    credentials: Credentials,
    pub region: String,
    endpoints: HashMap<Service, url::Url>,
    account_id: Arc<RwLock<Option<String>>>,
    poll_interval: Duration,
}

impl AwsClient {
    /// Create a new client for a region with explicit credentials
    pub fn new(credentials: Credentials, region: &str) -> Result<Self> {
        Self::with_retry(credentials, region, RetryConfig::default())
    }

    pub fn with_retry(credentials: Credentials, region: &str, retry: RetryConfig) -> Result<Self> {
        let http = AwsHttpClient::new(retry)?;

        Ok(Self {
            http,
            credentials,
            region: region.to_string(),
            endpoints: HashMap::new(),
            account_id: Arc::new(RwLock::new(None)),
            poll_interval: Duration::from_secs(5),
        })
    }

    /// Route a service to a custom endpoint (local fakes, VPC endpoints)
    pub fn with_endpoint(mut self, service: Service, endpoint: &str) -> Result<Self> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            ProviderError::validation(format!("endpoints.{}", service.config_key()), e.to_string())
        })?;
        self.endpoints.insert(service, url);
        Ok(self)
    }

    /// Use a known account ID instead of asking STS
    pub fn with_account_id(self, account_id: &str) -> Self {
        if let Ok(mut cache) = self.account_id.try_write() {
            *cache = Some(account_id.to_string());
        }
        self
    }

    /// Interval between polls while waiting on eventually-consistent state
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolve the base URL for a service
    pub fn endpoint(&self, service: Service) -> Result<url::Url> {
        if let Some(url) = self.endpoints.get(&service) {
            return Ok(url.clone());
        }

        let host = if service.is_global() {
            format!("https://{}.amazonaws.com", service.signing_name())
        } else {
            format!("https://{}.{}.amazonaws.com", service.signing_name(), self.region)
        };
        url::Url::parse(&host).map_err(|e| ProviderError::validation("region", e.to_string()))
    }

    fn signer(&self, service: Service) -> Signer {
        let region = if service.is_global() {
            DEFAULT_REGION
        } else {
            self.region.as_str()
        };
        Signer::new(self.credentials.clone(), region, service.signing_name())
    }

    /// Get the caller's account ID (cached after the first lookup)
    pub async fn account_id(&self) -> Result<String> {
        {
            let cache = self.account_id.read().await;
            if let Some(id) = cache.as_ref() {
                return Ok(id.clone());
            }
        }

        let result = self
            .query(Service::Sts, "GetCallerIdentity", "2011-06-15", &[])
            .await?;
        let id = result
            .get("Account")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::decode("GetCallerIdentity response", "missing Account"))?
            .to_string();

        tracing::debug!("Resolved caller account ID {}", id);

        let mut cache = self.account_id.write().await;
        *cache = Some(id.clone());
        Ok(id)
    }

    // =========================================================================
    // Wire protocols
    // =========================================================================

    /// REST-JSON call: method + path (+ query) + optional JSON body
    pub async fn rest_json(
        &self,
        service: Service,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut url = self.endpoint(service)?;
        url.set_path(path);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }

        let (headers, body) = match body {
            Some(body) => (
                vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())],
                serde_json::to_vec(body).map_err(|e| ProviderError::decode(operation, e))?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        let request = ApiRequest {
            operation,
            method,
            url,
            headers,
            body,
        };
        self.http.send(&self.signer(service), &request).await
    }

    /// JSON-RPC 1.0 call: POST / with X-Amz-Target
    pub async fn json_rpc(
        &self,
        service: Service,
        target_prefix: &str,
        operation: &'static str,
        body: &Value,
    ) -> Result<Value> {
        let mut url = self.endpoint(service)?;
        url.set_path("/");

        let request = ApiRequest {
            operation,
            method: Method::POST,
            url,
            headers: vec![
                ("Content-Type".to_string(), AMZ_JSON_1_0.to_string()),
                ("X-Amz-Target".to_string(), format!("{}.{}", target_prefix, operation)),
            ],
            body: serde_json::to_vec(body).map_err(|e| ProviderError::decode(operation, e))?,
        };
        self.http.send(&self.signer(service), &request).await
    }

    /// Query call with JSON replies; returns the `<Action>Result` object
    pub async fn query(
        &self,
        service: Service,
        action: &'static str,
        version: &str,
        params: &[(String, String)],
    ) -> Result<Value> {
        let mut url = self.endpoint(service)?;
        url.set_path("/");

        // The serializer is not Send; finish it before any await
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("Action", action);
            form.append_pair("Version", version);
            for (k, v) in params {
                form.append_pair(k, v);
            }
            form.finish().into_bytes()
        };

        let request = ApiRequest {
            operation: action,
            method: Method::POST,
            url,
            headers: vec![
                ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
                ("Accept".to_string(), JSON_CONTENT_TYPE.to_string()),
            ],
            body,
        };
        let response = self.http.send(&self.signer(service), &request).await?;

        Ok(response
            .get(format!("{}Response", action))
            .and_then(|r| r.get(format!("{}Result", action)))
            .cloned()
            .unwrap_or(Value::Null))
    }
}

/// Build a request path from raw segments, percent-encoding each one
pub fn encode_path(segments: &[&str]) -> String {
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(&urlencoding::encode(segment));
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AwsClient {
        AwsClient::new(Credentials::new("AKID", "secret", None, None, "test"), "eu-west-1").unwrap()
    }

    #[test]
    fn test_regional_endpoint() {
        let url = client().endpoint(Service::Backup).unwrap();
        assert_eq!(url.as_str(), "https://backup.eu-west-1.amazonaws.com/");
    }

    #[test]
    fn test_global_endpoint() {
        let url = client().endpoint(Service::Iam).unwrap();
        assert_eq!(url.as_str(), "https://iam.amazonaws.com/");
    }

    #[test]
    fn test_endpoint_override() {
        let overridden = client()
            .with_endpoint(Service::Rum, "http://127.0.0.1:4566")
            .unwrap();
        assert_eq!(overridden.endpoint(Service::Rum).unwrap().as_str(), "http://127.0.0.1:4566/");
        assert!(client().with_endpoint(Service::Rum, "not a url").is_err());
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(
            encode_path(&["tags", "arn:aws:backup:us-east-1:123:framework:f-1", ""]),
            "/tags/arn%3Aaws%3Abackup%3Aus-east-1%3A123%3Aframework%3Af-1/"
        );
        assert_eq!(encode_path(&[]), "/");
    }

    #[test]
    fn test_service_config_keys_round_trip() {
        for key in ["backup", "iam", "opensearchserverless", "quicksight", "rum", "sts"] {
            assert_eq!(Service::from_config_key(key).unwrap().config_key(), key);
        }
        assert!(Service::from_config_key("ec2").is_none());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_protocol_futures_are_send() {
        let client = client();
        let params = vec![("InstanceProfileName".to_string(), "web".to_string())];
        assert_send(&client.query(Service::Iam, "GetInstanceProfile", "2010-05-08", &params));
        assert_send(&client.rest_json(Service::Rum, "ListRumMetricsDestinations", Method::GET, "/", &[("a", "b")], None));
        assert_send(&client.account_id());
    }

    #[tokio::test]
    async fn test_account_id_override_skips_sts() {
        let client = client().with_account_id("123456789012");
        assert_eq!(client.account_id().await.unwrap(), "123456789012");
    }
}
