//! AWS Backup audit frameworks
//!
//! REST-JSON API. Frameworks deploy asynchronously, so every write is
//! followed by a wait on `DeploymentStatus`.

mod framework;
mod framework_data_source;

pub use framework::{Control, ControlScope, Framework, FrameworkConfig, FrameworkState, InputParameter};
pub use framework_data_source::{FrameworkDataSource, FrameworkLookup, FrameworkOutput};

use crate::aws::{encode_path, AwsClient, Service};
use crate::error::Result;
use crate::resource::convert::{self, str_at};
use crate::resource::finder::{self, Page};
use crate::resource::waiter::{self, Poll};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

pub(crate) const CREATE_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub(crate) const UPDATE_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub(crate) const DELETE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

const STATUS_COMPLETED: &str = "COMPLETED";
const STATUS_FAILED: &str = "FAILED";

fn label(name: &str) -> String {
    format!("Backup Framework ({})", name)
}

/// DescribeFramework; `NotFound` when the framework does not exist
pub async fn find_framework_by_name(client: &AwsClient, name: &str) -> Result<Value> {
    let result = client
        .rest_json(
            Service::Backup,
            "DescribeFramework",
            Method::GET,
            &encode_path(&["audit", "frameworks", name]),
            &[],
            None,
        )
        .await;
    finder::normalize_not_found(result, &label(name))
}

/// All tags on a Backup resource (ListTags is paginated)
pub async fn list_tags(client: &AwsClient, arn: &str) -> Result<BTreeMap<String, String>> {
    let path = encode_path(&["tags", arn, ""]);
    let pages = finder::list_all(|token| {
        let path = path.clone();
        async move {
            let query: Vec<(&str, &str)> = match token.as_deref() {
                Some(t) => vec![("nextToken", t)],
                None => Vec::new(),
            };
            let response = client
                .rest_json(Service::Backup, "ListTags", Method::GET, &path, &query, None)
                .await?;
            Ok(Page::new(
                vec![convert::tags_from_object(response.get("Tags"))],
                str_at(&response, "NextToken"),
            ))
        }
    })
    .await?;

    Ok(pages.into_iter().flatten().collect())
}

/// Apply only the changed tag keys
pub async fn update_tags(
    client: &AwsClient,
    arn: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Result<()> {
    let (upsert, remove) = convert::tag_changes(old, new);

    if !remove.is_empty() {
        client
            .rest_json(
                Service::Backup,
                "UntagResource",
                Method::POST,
                &encode_path(&["untag", arn]),
                &[],
                Some(&json!({ "TagKeyList": remove })),
            )
            .await?;
    }

    if !upsert.is_empty() {
        client
            .rest_json(
                Service::Backup,
                "TagResource",
                Method::POST,
                &encode_path(&["tags", arn]),
                &[],
                Some(&json!({ "Tags": upsert })),
            )
            .await?;
    }

    Ok(())
}

/// Wait for a framework deployment to reach COMPLETED
pub async fn wait_framework_deployed(client: &AwsClient, name: &str, timeout: Duration) -> Result<Value> {
    let resource = label(name);
    waiter::wait_until(&resource, STATUS_COMPLETED, timeout, client.poll_interval(), || async {
        match finder::optional(find_framework_by_name(client, name).await)? {
            // Not visible yet right after CreateFramework
            None => Ok(Poll::Pending("NOT_FOUND".to_string())),
            Some(output) => {
                let status = str_at(&output, "DeploymentStatus").unwrap_or_default();
                Ok(match status.as_str() {
                    STATUS_COMPLETED => Poll::Ready(output),
                    STATUS_FAILED => Poll::Failed(status),
                    _ => Poll::Pending(status),
                })
            }
        }
    })
    .await
}

/// Wait until DescribeFramework reports not-found
pub async fn wait_framework_deleted(client: &AwsClient, name: &str, timeout: Duration) -> Result<()> {
    waiter::wait_for_deletion(&label(name), timeout, client.poll_interval(), || async {
        Ok(finder::optional(find_framework_by_name(client, name).await)?.is_some())
    })
    .await
}
