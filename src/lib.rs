//! Typed create/read/update/delete handlers that reconcile declarative
//! resource configuration against AWS APIs.
//!
//! - [`aws`] - Credentials, request signing and the client handle
//! - [`resource`] - Handler traits, schemas, identifiers, finders and waiters
//! - [`service`] - Per-service resources and data sources
//! - [`error`] - Error taxonomy shared by every handler
//! - [`config`] - Persistent user configuration

pub mod aws;
pub mod config;
pub mod error;
pub mod resource;
pub mod service;

/// Version injected at compile time via CLOUDREC_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDREC_VERSION") {
    Some(v) => v,
    None => "dev",
};
