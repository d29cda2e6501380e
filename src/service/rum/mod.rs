//! CloudWatch RUM metrics destinations
//!
//! REST-JSON API. A destination has no identifier of its own; it is
//! addressed through its app monitor.

mod metrics_destination;

pub use metrics_destination::{MetricsDestination, MetricsDestinationConfig, MetricsDestinationState};

use crate::aws::{encode_path, AwsClient, Service};
use crate::error::Result;
use crate::resource::convert::str_at;
use crate::resource::finder::{self, Page};
use reqwest::Method;
use serde_json::Value;

fn label(app_monitor_name: &str) -> String {
    format!("CloudWatch RUM Metrics Destination ({})", app_monitor_name)
}

pub(crate) fn destination_path(app_monitor_name: &str) -> String {
    encode_path(&["rummetrics", app_monitor_name, "metricsdestination"])
}

/// First destination of an app monitor; `NotFound` when the monitor has
/// none or does not exist
pub async fn find_metrics_destination_by_app_monitor(client: &AwsClient, app_monitor_name: &str) -> Result<Value> {
    let path = destination_path(app_monitor_name);
    let result = finder::find_first(
        &label(app_monitor_name),
        |token| {
            let path = path.clone();
            async move {
                let mut query = vec![("maxResults", "100")];
                if let Some(t) = token.as_deref() {
                    query.push(("nextToken", t));
                }
                let response = client
                    .rest_json(Service::Rum, "ListRumMetricsDestinations", Method::GET, &path, &query, None)
                    .await?;
                let items = response
                    .get("Destinations")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                Ok(Page::new(items, str_at(&response, "NextToken")))
            }
        },
        |_| true,
    )
    .await;

    finder::normalize_not_found(result, &label(app_monitor_name))
}
