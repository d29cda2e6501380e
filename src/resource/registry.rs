//! Resource Registry - look up handlers by type name
//!
//! Typed handlers are erased to `serde_json::Value` in and out so that the
//! command line can drive them by name. Resources expose only the calls
//! that need no configuration (read and delete); writes go through the
//! typed [`Resource`] trait.

use super::{DataSource, Resource, Schema};
use crate::aws::AwsClient;
use crate::error::{ProviderError, Result};
use crate::service::{backup, iam, opensearchserverless, quicksight, rum};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A resource handler driven with JSON values
#[async_trait]
pub trait DynResource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<Value>>;
    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()>;
}

/// A data source handler driven with JSON values
#[async_trait]
pub trait DynDataSource: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Schema;
    async fn read(&self, client: &AwsClient, args: Value) -> Result<Value>;
}

struct ErasedResource<R>(R);

struct ErasedDataSource<D>(D);

fn from_value<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ProviderError::decode(what, e))
}

fn to_value<T: Serialize>(what: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ProviderError::decode(what, e))
}

#[async_trait]
impl<R: Resource + 'static> DynResource for ErasedResource<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        R::schema()
    }

    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<Value>> {
        match self.0.read(client, id).await? {
            Some(state) => Ok(Some(to_value(R::TYPE_NAME, &state)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()> {
        self.0.delete(client, id).await
    }
}

#[async_trait]
impl<D: DataSource + 'static> DynDataSource for ErasedDataSource<D> {
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        D::schema()
    }

    async fn read(&self, client: &AwsClient, args: Value) -> Result<Value> {
        let args: D::Args = from_value(D::TYPE_NAME, args)?;
        let output = self.0.read(client, &args).await?;
        to_value(D::TYPE_NAME, &output)
    }
}

/// Handlers keyed by type name
pub struct Registry {
    pub resources: HashMap<&'static str, Box<dyn DynResource>>,
    pub data_sources: HashMap<&'static str, Box<dyn DynDataSource>>,
}

impl Registry {
    fn register_resource<R: Resource + 'static>(&mut self, handler: R) {
        self.resources.insert(R::TYPE_NAME, Box::new(ErasedResource(handler)));
    }

    fn register_data_source<D: DataSource + 'static>(&mut self, handler: D) {
        self.data_sources.insert(D::TYPE_NAME, Box::new(ErasedDataSource(handler)));
    }
}

/// Global registry
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Get the registry (built on first access)
pub fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut registry = Registry {
            resources: HashMap::new(),
            data_sources: HashMap::new(),
        };

        registry.register_resource(backup::Framework);
        registry.register_resource(iam::InstanceProfile);
        registry.register_resource(opensearchserverless::AccessPolicy);
        registry.register_resource(quicksight::User);
        registry.register_resource(rum::MetricsDestination);

        registry.register_data_source(backup::FrameworkDataSource);
        registry.register_data_source(iam::InstanceProfileDataSource);
        registry.register_data_source(opensearchserverless::AccessPolicyDataSource);

        registry
    })
}

/// Get a resource handler by type name
pub fn get_resource(key: &str) -> Option<&'static dyn DynResource> {
    get_registry().resources.get(key).map(|r| r.as_ref())
}

/// Get a data source handler by type name
pub fn get_data_source(key: &str) -> Option<&'static dyn DynDataSource> {
    get_registry().data_sources.get(key).map(|d| d.as_ref())
}

/// All resource type names, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry().resources.keys().copied().collect();
    keys.sort_unstable();
    keys
}

/// All data source type names, sorted
pub fn get_all_data_source_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry().data_sources.keys().copied().collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        assert_eq!(
            get_all_resource_keys(),
            vec![
                "aws_backup_framework",
                "aws_iam_instance_profile",
                "aws_opensearchserverless_access_policy",
                "aws_quicksight_user",
                "aws_rum_metrics_destination",
            ]
        );
        assert_eq!(
            get_all_data_source_keys(),
            vec![
                "aws_backup_framework",
                "aws_iam_instance_profile",
                "aws_opensearchserverless_access_policy",
            ]
        );
    }

    #[test]
    fn test_lookup_exposes_schema() {
        let resource = get_resource("aws_quicksight_user").unwrap();
        assert_eq!(resource.type_name(), "aws_quicksight_user");
        assert!(resource.schema().get("email").is_some());
        assert!(get_resource("aws_s3_bucket").is_none());
    }

    #[test]
    fn test_schema_type_names_match_keys() {
        for key in get_all_resource_keys() {
            assert_eq!(get_resource(key).unwrap().schema().type_name, key);
        }
        for key in get_all_data_source_keys() {
            assert_eq!(get_data_source(key).unwrap().schema().type_name, key);
        }
    }
}
