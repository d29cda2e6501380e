//! OpenSearch Serverless access policies
//!
//! JSON-RPC 1.0 API (`X-Amz-Target: OpenSearchServerless.<Operation>`).

mod access_policy;
mod access_policy_data_source;

pub use access_policy::{AccessPolicy, AccessPolicyConfig, AccessPolicyState};
pub use access_policy_data_source::{AccessPolicyDataSource, AccessPolicyLookup, AccessPolicyOutput};

use crate::aws::{AwsClient, Service};
use crate::error::{ProviderError, Result};
use crate::resource::finder;
use serde_json::{json, Value};

const TARGET_PREFIX: &str = "OpenSearchServerless";

/// Access policy types accepted by the service
pub const ACCESS_POLICY_TYPES: &[&str] = &["data"];

fn label(name: &str, policy_type: &str) -> String {
    format!("OpenSearch Serverless Access Policy ({}/{})", name, policy_type)
}

pub(crate) async fn call(client: &AwsClient, operation: &'static str, body: &Value) -> Result<Value> {
    client
        .json_rpc(Service::OpenSearchServerless, TARGET_PREFIX, operation, body)
        .await
}

/// GetAccessPolicy; `NotFound` when the policy does not exist
pub async fn find_access_policy_by_name_and_type(client: &AwsClient, name: &str, policy_type: &str) -> Result<Value> {
    let result = call(client, "GetAccessPolicy", &json!({ "name": name, "type": policy_type }))
        .await
        .map(|r| r.get("accessPolicyDetail").cloned().unwrap_or(Value::Null));

    match finder::normalize_not_found(result, &label(name, policy_type))? {
        Value::Null => Err(ProviderError::not_found(label(name, policy_type))),
        detail => Ok(detail),
    }
}
