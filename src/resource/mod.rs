//! Resource abstraction layer
//!
//! Every resource kind is a struct implementing [`Resource`]; every data
//! source implements [`DataSource`]. Handlers receive the client handle
//! explicitly and exchange typed configuration and state.
//!
//! # Architecture
//!
//! - [`schema`] - Attribute declarations, validation and diffing
//! - [`identifier`] - Composite identifier codec
//! - [`finder`] - Pagination and not-found normalization
//! - [`waiter`] - Polling for eventually-consistent state
//! - [`convert`] - Timestamp, policy and tag coercions
//! - [`registry`] - Type-erased lookup by type name
//!
//! # Example
//!
//! ```ignore
//! use cloudrec::resource::Resource;
//! use cloudrec::service::rum::{MetricsDestination, MetricsDestinationConfig};
//!
//! async fn create(client: &cloudrec::aws::AwsClient) -> cloudrec::error::Result<()> {
//!     let config = MetricsDestinationConfig {
//!         app_monitor_name: "web".into(),
//!         destination: "CloudWatch".into(),
//!         destination_arn: None,
//!         iam_role_arn: None,
//!     };
//!     let state = MetricsDestination.create(client, &config).await?;
//!     println!("created {}", state.id);
//!     Ok(())
//! }
//! ```

pub mod convert;
pub mod finder;
pub mod identifier;
pub mod registry;
pub mod schema;
pub mod waiter;

use crate::aws::AwsClient;
use crate::error::{ProviderError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use identifier::IdCodec;
pub use registry::{get_all_data_source_keys, get_all_resource_keys, get_data_source, get_resource};
pub use schema::{AttrType, Attribute, Diff, Schema, Validator};

/// Create/read/update/delete handlers for one resource kind
#[async_trait]
pub trait Resource: Send + Sync {
    type Config: Serialize + DeserializeOwned + Send + Sync;
    type State: Serialize + DeserializeOwned + Send + Sync;

    /// Type name, e.g. `aws_backup_framework`
    const TYPE_NAME: &'static str;

    fn schema() -> Schema;

    /// Identifier stored in a state
    fn state_id(state: &Self::State) -> &str;

    /// Check a configuration against the schema
    fn validate(config: &Self::Config) -> Result<()> {
        Self::schema().validate(&to_value(config)?)
    }

    async fn create(&self, client: &AwsClient, config: &Self::Config) -> Result<Self::State>;

    /// `Ok(None)` when the remote object no longer exists
    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<Self::State>>;

    async fn update(
        &self,
        client: &AwsClient,
        id: &str,
        prior: &Self::Config,
        desired: &Self::Config,
    ) -> Result<Self::State>;

    /// Succeeds when the object is already gone
    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()>;
}

/// Lookup handler for one data source kind
#[async_trait]
pub trait DataSource: Send + Sync {
    type Args: Serialize + DeserializeOwned + Send + Sync;
    type Output: Serialize + DeserializeOwned + Send + Sync;

    const TYPE_NAME: &'static str;

    fn schema() -> Schema;

    fn validate(args: &Self::Args) -> Result<()> {
        Self::schema().validate(&to_value(args)?)
    }

    async fn read(&self, client: &AwsClient, args: &Self::Args) -> Result<Self::Output>;
}

/// Diff two configurations of `R`, rejecting changes to replace-on-change
/// attributes. An empty diff means no remote write is needed.
pub fn plan_update<R: Resource>(prior: &R::Config, desired: &R::Config) -> Result<Diff> {
    R::validate(desired)?;
    let diff = R::schema().diff(&to_value(prior)?, &to_value(desired)?);
    if let Some(attribute) = diff.replace.first() {
        return Err(ProviderError::validation(
            *attribute,
            "cannot be updated in place, the resource must be replaced",
        ));
    }
    Ok(diff)
}

/// State read back right after a write must exist
pub fn require_present<T>(state: Option<T>, resource: &str) -> Result<T> {
    state.ok_or_else(|| ProviderError::not_found(resource))
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ProviderError::decode("configuration", e))
}
