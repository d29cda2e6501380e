//! Error taxonomy shared by every handler.
//!
//! Remote failures are classified once, at the HTTP layer, into an
//! [`ApiErrorCode`]. Handlers match on that code to implement the
//! idempotent not-found semantics and propagate everything else with
//! the resource and operation attached.

use std::fmt;
use thiserror::Error;

/// Classified error code returned by a remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCode {
    ResourceNotFound,
    NoSuchEntity,
    NotFound,
    Throttling,
    AccessDenied,
    Conflict,
    Validation,
    Other(String),
}

impl ApiErrorCode {
    /// Map a raw wire code (`ResourceNotFoundException`, `NoSuchEntity`, ...)
    /// onto a classified code.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "ResourceNotFoundException" => ApiErrorCode::ResourceNotFound,
            "NoSuchEntity" | "NoSuchEntityException" => ApiErrorCode::NoSuchEntity,
            "NotFoundException" | "NotFound" => ApiErrorCode::NotFound,
            "ThrottlingException"
            | "Throttling"
            | "TooManyRequestsException"
            | "RequestLimitExceeded" => ApiErrorCode::Throttling,
            "AccessDeniedException" | "AccessDenied" | "UnrecognizedClientException" => {
                ApiErrorCode::AccessDenied
            }
            "ConflictException" | "ConflictingOperation" | "ConcurrentModificationException" => {
                ApiErrorCode::Conflict
            }
            "ValidationException" | "ValidationError" | "InvalidParameterValueException" => {
                ApiErrorCode::Validation
            }
            other => ApiErrorCode::Other(other.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiErrorCode::ResourceNotFound | ApiErrorCode::NoSuchEntity | ApiErrorCode::NotFound
        )
    }

    pub fn is_throttling(&self) -> bool {
        matches!(self, ApiErrorCode::Throttling)
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorCode::ResourceNotFound => write!(f, "ResourceNotFoundException"),
            ApiErrorCode::NoSuchEntity => write!(f, "NoSuchEntity"),
            ApiErrorCode::NotFound => write!(f, "NotFoundException"),
            ApiErrorCode::Throttling => write!(f, "ThrottlingException"),
            ApiErrorCode::AccessDenied => write!(f, "AccessDeniedException"),
            ApiErrorCode::Conflict => write!(f, "ConflictException"),
            ApiErrorCode::Validation => write!(f, "ValidationException"),
            ApiErrorCode::Other(code) => write!(f, "{}", code),
        }
    }
}

/// An error response decoded from a remote API call.
#[derive(Debug, Clone, Error)]
#[error("{code} (HTTP {status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: ApiErrorCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.code.is_not_found()
    }

    /// Throttling and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.code.is_throttling() || self.status == 429 || self.status >= 500
    }
}

/// Errors surfaced by resource and data-source handlers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{operation} {resource}: {source}")]
    RemoteApi {
        operation: String,
        resource: String,
        #[source]
        source: ApiError,
    },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("unexpected format of ID ({id}), expected {expected}")]
    MalformedIdentifier { id: String, expected: String },

    #[error("invalid value for {attribute}: {message}")]
    Validation { attribute: String, message: String },

    #[error("sending request to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("decoding {what}: {message}")]
    Decode { what: String, message: String },

    #[error("timeout after {seconds}s waiting for {resource} to become {target}")]
    Timeout {
        resource: String,
        target: String,
        seconds: u64,
    },

    #[error("{resource} reached unexpected state {state}")]
    UnexpectedState { resource: String, state: String },

    #[error("missing credentials: {0}")]
    Credentials(String),

    #[error("signing request: {0}")]
    Signing(String),
}

impl ProviderError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ProviderError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn decode(what: impl Into<String>, message: impl fmt::Display) -> Self {
        ProviderError::Decode {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// True for a local `NotFound` or a remote error classified as not-found.
    pub fn is_not_found(&self) -> bool {
        match self {
            ProviderError::NotFound { .. } => true,
            ProviderError::RemoteApi { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Attach the operation and resource to a bare API error.
    pub fn remote(operation: impl Into<String>, resource: impl Into<String>, source: ApiError) -> Self {
        ProviderError::RemoteApi {
            operation: operation.into(),
            resource: resource.into(),
            source,
        }
    }

    /// Re-label a remote error with handler context, leaving other
    /// variants untouched.
    pub fn with_context(self, operation: &str, resource: &str) -> Self {
        match self {
            ProviderError::RemoteApi { source, .. } => ProviderError::remote(operation, resource, source),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: &str, status: u16) -> ApiError {
        ApiError {
            status,
            code: ApiErrorCode::from_wire(code),
            message: "boom".to_string(),
            request_id: None,
        }
    }

    #[test]
    fn test_not_found_codes_are_classified() {
        assert!(api_error("ResourceNotFoundException", 404).is_not_found());
        assert!(api_error("NoSuchEntity", 404).is_not_found());
        assert!(!api_error("AccessDeniedException", 403).is_not_found());
        assert!(!api_error("SomethingNotFoundButDifferent", 400).is_not_found());
    }

    #[test]
    fn test_retryable() {
        assert!(api_error("ThrottlingException", 400).is_retryable());
        assert!(api_error("InternalFailure", 500).is_retryable());
        assert!(!api_error("ValidationException", 400).is_retryable());
    }

    #[test]
    fn test_with_context_relabels_remote_errors() {
        let err = ProviderError::remote("reading", "x", api_error("NoSuchEntity", 404))
            .with_context("deleting", "IAM Instance Profile (p)");
        assert_eq!(
            err.to_string(),
            "deleting IAM Instance Profile (p): NoSuchEntity (HTTP 404): boom"
        );
        assert!(err.is_not_found());
    }
}
