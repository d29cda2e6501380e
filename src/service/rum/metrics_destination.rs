//! `aws_rum_metrics_destination` resource

use super::{destination_path, find_metrics_destination_by_app_monitor, label};
use crate::aws::{AwsClient, Service};
use crate::error::{ProviderError, Result};
use crate::resource::convert::str_at;
use crate::resource::finder;
use crate::resource::{plan_update, require_present, AttrType, Attribute, IdCodec, Resource, Schema, Validator};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DESTINATION_ID: IdCodec = IdCodec::new('/', &["app_monitor_name"]);

const DESTINATIONS: &[&str] = &["CloudWatch", "Evidently"];
const DESTINATION_EVIDENTLY: &str = "Evidently";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDestinationConfig {
    pub app_monitor_name: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_role_arn: Option<String>,
}

impl MetricsDestinationConfig {
    fn check_destination_arn(&self) -> Result<()> {
        if self.destination == DESTINATION_EVIDENTLY && self.destination_arn.is_none() {
            return Err(ProviderError::validation(
                "destination_arn",
                "required when destination is Evidently",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDestinationState {
    pub id: String,
    pub app_monitor_name: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_role_arn: Option<String>,
}

/// CloudWatch RUM metrics destination
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsDestination;

impl MetricsDestination {
    async fn put(&self, client: &AwsClient, config: &MetricsDestinationConfig) -> Result<()> {
        let mut body = json!({ "Destination": config.destination });
        if let Some(arn) = &config.destination_arn {
            body["DestinationArn"] = json!(arn);
        }
        if let Some(arn) = &config.iam_role_arn {
            body["IamRoleArn"] = json!(arn);
        }

        client
            .rest_json(
                Service::Rum,
                "PutRumMetricsDestination",
                Method::POST,
                &destination_path(&config.app_monitor_name),
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    /// DeleteRumMetricsDestination for one destination; a missing one is not an error
    async fn remove(&self, client: &AwsClient, app_monitor_name: &str, kind: &str, arn: Option<&str>) -> Result<()> {
        let mut query = vec![("destination", kind)];
        if let Some(arn) = arn {
            query.push(("destinationArn", arn));
        }

        let result = client
            .rest_json(
                Service::Rum,
                "DeleteRumMetricsDestination",
                Method::DELETE,
                &destination_path(app_monitor_name),
                &query,
                None,
            )
            .await
            .map(|_| ());
        finder::ignore_not_found(result)
    }
}

fn flatten_destination(app_monitor_name: &str, destination: &Value) -> MetricsDestinationState {
    MetricsDestinationState {
        id: app_monitor_name.to_string(),
        app_monitor_name: app_monitor_name.to_string(),
        destination: str_at(destination, "Destination").unwrap_or_default(),
        destination_arn: str_at(destination, "DestinationArn"),
        iam_role_arn: str_at(destination, "IamRoleArn"),
    }
}

#[async_trait]
impl Resource for MetricsDestination {
    type Config = MetricsDestinationConfig;
    type State = MetricsDestinationState;

    const TYPE_NAME: &'static str = "aws_rum_metrics_destination";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(
                Attribute::required("app_monitor_name", AttrType::String)
                    .force_new()
                    .validate(Validator::NotEmpty),
            )
            .attribute(Attribute::required("destination", AttrType::String).validate(Validator::OneOf(DESTINATIONS)))
            .attribute(Attribute::optional("destination_arn", AttrType::String))
            .attribute(Attribute::optional("iam_role_arn", AttrType::String))
    }

    fn state_id(state: &MetricsDestinationState) -> &str {
        &state.id
    }

    fn validate(config: &MetricsDestinationConfig) -> Result<()> {
        let value = serde_json::to_value(config).map_err(|e| ProviderError::decode("configuration", e))?;
        Self::schema().validate(&value)?;
        config.check_destination_arn()
    }

    async fn create(&self, client: &AwsClient, config: &MetricsDestinationConfig) -> Result<MetricsDestinationState> {
        Self::validate(config)?;

        tracing::info!("Creating {}", label(&config.app_monitor_name));
        self.put(client, config)
            .await
            .map_err(|e| e.with_context("creating", &label(&config.app_monitor_name)))?;

        let id = DESTINATION_ID.encode(&[&config.app_monitor_name])?;
        require_present(self.read(client, &id).await?, &label(&id))
    }

    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<MetricsDestinationState>> {
        let [app_monitor_name] = DESTINATION_ID.decode_n::<1>(id)?;

        match finder::optional(find_metrics_destination_by_app_monitor(client, &app_monitor_name).await)
            .map_err(|e| e.with_context("reading", &label(&app_monitor_name)))?
        {
            Some(destination) => Ok(Some(flatten_destination(&app_monitor_name, &destination))),
            None => {
                tracing::warn!("{} not found, removing from state", label(&app_monitor_name));
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        client: &AwsClient,
        id: &str,
        prior: &MetricsDestinationConfig,
        desired: &MetricsDestinationConfig,
    ) -> Result<MetricsDestinationState> {
        let [app_monitor_name] = DESTINATION_ID.decode_n::<1>(id)?;
        let diff = plan_update::<Self>(prior, desired)?;

        // A destination is keyed by its kind and ARN, so a new pair would
        // otherwise sit alongside the old one
        if diff.has_changes(&["destination", "destination_arn"]) {
            tracing::info!(
                "Removing previous destination {} of {}",
                prior.destination,
                label(&app_monitor_name)
            );
            self.remove(client, &app_monitor_name, &prior.destination, prior.destination_arn.as_deref())
                .await
                .map_err(|e| e.with_context("updating", &label(&app_monitor_name)))?;
        }

        if !diff.is_empty() {
            tracing::info!("Updating {}", label(&app_monitor_name));
            self.put(client, desired)
                .await
                .map_err(|e| e.with_context("updating", &label(&app_monitor_name)))?;
        }

        require_present(self.read(client, id).await?, &label(&app_monitor_name))
    }

    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()> {
        let [app_monitor_name] = DESTINATION_ID.decode_n::<1>(id)?;

        let Some(destination) = finder::optional(find_metrics_destination_by_app_monitor(client, &app_monitor_name).await)
            .map_err(|e| e.with_context("reading", &label(&app_monitor_name)))?
        else {
            return Ok(());
        };

        let kind = str_at(&destination, "Destination").unwrap_or_default();
        let arn = str_at(&destination, "DestinationArn");

        tracing::info!("Deleting {}", label(&app_monitor_name));
        self.remove(client, &app_monitor_name, &kind, arn.as_deref())
            .await
            .map_err(|e| e.with_context("deleting", &label(&app_monitor_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MetricsDestinationConfig {
        MetricsDestinationConfig {
            app_monitor_name: "web".to_string(),
            destination: "CloudWatch".to_string(),
            destination_arn: None,
            iam_role_arn: None,
        }
    }

    #[test]
    fn test_evidently_requires_arn() {
        MetricsDestination::validate(&config()).unwrap();

        let evidently = MetricsDestinationConfig {
            destination: "Evidently".to_string(),
            ..config()
        };
        let err = MetricsDestination::validate(&evidently).unwrap_err();
        assert!(matches!(err, ProviderError::Validation { ref attribute, .. } if attribute == "destination_arn"));
    }

    #[test]
    fn test_unknown_destination_rejected() {
        let bad = MetricsDestinationConfig {
            destination: "S3".to_string(),
            ..config()
        };
        assert!(MetricsDestination::validate(&bad).is_err());
    }

    #[test]
    fn test_flatten_destination() {
        let state = flatten_destination(
            "web",
            &json!({"Destination": "Evidently", "DestinationArn": "arn:aws:evidently:us-east-1:1:project/p"}),
        );
        assert_eq!(state.id, "web");
        assert_eq!(state.destination, "Evidently");
        assert!(state.iam_role_arn.is_none());
    }
}
