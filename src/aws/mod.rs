//! AWS API interaction module
//!
//! This module provides the transport every handler uses: credentials and
//! request signing, the retrying HTTP client, and the client handle that
//! speaks the REST-JSON, JSON-RPC and Query protocols.
//!
//! # Module Structure
//!
//! - [`auth`] - Credential resolution and SigV4 signing
//! - [`client`] - Client handle injected into every handler call
//! - [`http`] - Signed HTTP calls, retries and error decoding
//!
//! # Example
//!
//! ```ignore
//! use cloudrec::aws::{auth, client::{AwsClient, Service}};
//!
//! async fn example() -> cloudrec::error::Result<()> {
//!     let identity = auth::load_identity(None).await?;
//!     let client = AwsClient::new(identity.credentials, "eu-west-1")?;
//!     let frameworks = client
//!         .rest_json(Service::Backup, "ListFrameworks", reqwest::Method::GET, "/audit/frameworks", &[], None)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

pub use client::{encode_path, AwsClient, Service};
