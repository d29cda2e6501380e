//! QuickSight users
//!
//! REST-JSON API rooted at `/accounts/{AwsAccountId}/namespaces/{Namespace}`.

mod user;

pub use user::{User, UserConfig, UserState, DEFAULT_USER_NAMESPACE};

use crate::aws::{encode_path, AwsClient, Service};
use crate::error::{ProviderError, Result};
use crate::resource::finder;
use reqwest::Method;
use serde_json::Value;

fn label(id: &str) -> String {
    format!("QuickSight User ({})", id)
}

pub(crate) fn user_path(account_id: &str, namespace: &str, user_name: Option<&str>) -> String {
    match user_name {
        Some(user) => encode_path(&["accounts", account_id, "namespaces", namespace, "users", user]),
        None => encode_path(&["accounts", account_id, "namespaces", namespace, "users"]),
    }
}

/// DescribeUser; `NotFound` when the user does not exist
pub async fn find_user_by_id(client: &AwsClient, account_id: &str, namespace: &str, user_name: &str) -> Result<Value> {
    let what = label(&format!("{}/{}/{}", account_id, namespace, user_name));
    let result = client
        .rest_json(
            Service::QuickSight,
            "DescribeUser",
            Method::GET,
            &user_path(account_id, namespace, Some(user_name)),
            &[],
            None,
        )
        .await
        .map(|r| r.get("User").cloned().unwrap_or(Value::Null));

    match finder::normalize_not_found(result, &what)? {
        Value::Null => Err(ProviderError::not_found(what)),
        user => Ok(user),
    }
}
