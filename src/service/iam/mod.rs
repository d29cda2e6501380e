//! IAM instance profiles
//!
//! IAM speaks the Query protocol; replies are requested as JSON. IAM is a
//! global service, so the client always signs for us-east-1.

mod instance_profile;
mod instance_profile_data_source;

pub use instance_profile::{InstanceProfile, InstanceProfileConfig, InstanceProfileState};
pub use instance_profile_data_source::{InstanceProfileDataSource, InstanceProfileLookup, InstanceProfileOutput};

use crate::aws::{AwsClient, Service};
use crate::error::{ProviderError, Result};
use crate::resource::finder;
use serde_json::Value;
use std::collections::BTreeMap;

pub(crate) const API_VERSION: &str = "2010-05-08";

fn label(name: &str) -> String {
    format!("IAM Instance Profile ({})", name)
}

/// Query protocol call against IAM
pub(crate) async fn call(client: &AwsClient, action: &'static str, params: Vec<(String, String)>) -> Result<Value> {
    client.query(Service::Iam, action, API_VERSION, &params).await
}

/// List members of a Query-protocol list, which JSON replies render either
/// as a bare array or wrapped in `member`
pub(crate) fn members(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(map)) => match map.get("member") {
            Some(Value::Array(items)) => items.clone(),
            Some(single @ Value::Object(_)) => vec![single.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// `Tags.member.N.Key` / `Tags.member.N.Value` parameters
pub(crate) fn tag_params(tags: &BTreeMap<String, String>) -> Vec<(String, String)> {
    tags.iter()
        .enumerate()
        .flat_map(|(i, (k, v))| {
            [
                (format!("Tags.member.{}.Key", i + 1), k.clone()),
                (format!("Tags.member.{}.Value", i + 1), v.clone()),
            ]
        })
        .collect()
}

/// GetInstanceProfile; `NotFound` when the profile does not exist
pub async fn find_instance_profile_by_name(client: &AwsClient, name: &str) -> Result<Value> {
    let result = call(
        client,
        "GetInstanceProfile",
        vec![("InstanceProfileName".to_string(), name.to_string())],
    )
    .await
    .map(|r| r.get("InstanceProfile").cloned().unwrap_or(Value::Null));

    match finder::normalize_not_found(result, &label(name))? {
        Value::Null => Err(ProviderError::not_found(label(name))),
        profile => Ok(profile),
    }
}
