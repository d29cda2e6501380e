//! `aws_backup_framework` resource

use super::{
    find_framework_by_name, label, list_tags, update_tags, wait_framework_deleted, wait_framework_deployed,
    CREATE_TIMEOUT, DELETE_TIMEOUT, UPDATE_TIMEOUT,
};
use crate::aws::{encode_path, AwsClient, Service};
use crate::error::{ProviderError, Result};
use crate::resource::convert::{self, str_at};
use crate::resource::finder;
use crate::resource::{plan_update, require_present, AttrType, Attribute, IdCodec, Resource, Schema, Validator};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const FRAMEWORK_ID: IdCodec = IdCodec::new('/', &["name"]);

/// Input parameter of a control
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Resources a control evaluates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlScope {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance_resource_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance_resource_types: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// One control in a framework
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_parameter: Vec<InputParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ControlScope>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub control: Vec<Control>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkState {
    pub id: String,
    pub name: String,
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub control: Vec<Control>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl From<&Value> for InputParameter {
    fn from(value: &Value) -> Self {
        Self {
            name: str_at(value, "ParameterName"),
            value: str_at(value, "ParameterValue"),
        }
    }
}

impl From<&Value> for ControlScope {
    fn from(value: &Value) -> Self {
        let strings = |key: &str| -> Vec<String> {
            value
                .get(key)
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|s| s.as_str().map(|s| s.to_string())).collect())
                .unwrap_or_default()
        };
        Self {
            compliance_resource_ids: strings("ComplianceResourceIds"),
            compliance_resource_types: strings("ComplianceResourceTypes"),
            tags: convert::tags_from_object(value.get("Tags")),
        }
    }
}

impl From<&Value> for Control {
    fn from(value: &Value) -> Self {
        let scope = value
            .get("ControlScope")
            .map(ControlScope::from)
            .filter(|s| *s != ControlScope::default());
        Self {
            name: str_at(value, "ControlName").unwrap_or_default(),
            input_parameter: value
                .get("ControlInputParameters")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().map(InputParameter::from).collect())
                .unwrap_or_default(),
            scope,
        }
    }
}

impl Control {
    fn to_wire(&self) -> Value {
        let mut control = json!({ "ControlName": self.name });

        if !self.input_parameter.is_empty() {
            control["ControlInputParameters"] = self
                .input_parameter
                .iter()
                .map(|p| {
                    let mut param = json!({});
                    if let Some(name) = &p.name {
                        param["ParameterName"] = json!(name);
                    }
                    if let Some(value) = &p.value {
                        param["ParameterValue"] = json!(value);
                    }
                    param
                })
                .collect();
        }

        if let Some(scope) = &self.scope {
            let mut wire = json!({});
            if !scope.compliance_resource_ids.is_empty() {
                wire["ComplianceResourceIds"] = json!(scope.compliance_resource_ids);
            }
            if !scope.compliance_resource_types.is_empty() {
                wire["ComplianceResourceTypes"] = json!(scope.compliance_resource_types);
            }
            if !scope.tags.is_empty() {
                wire["Tags"] = json!(scope.tags);
            }
            control["ControlScope"] = wire;
        }

        control
    }
}

/// Build state from a DescribeFramework response plus its tags
pub(super) fn flatten_framework(output: &Value, tags: BTreeMap<String, String>) -> FrameworkState {
    let name = str_at(output, "FrameworkName").unwrap_or_default();
    FrameworkState {
        id: name.clone(),
        name,
        arn: str_at(output, "FrameworkArn").unwrap_or_default(),
        description: str_at(output, "FrameworkDescription").filter(|d| !d.is_empty()),
        control: output
            .get("FrameworkControls")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(Control::from).collect())
            .unwrap_or_default(),
        creation_time: output.get("CreationTime").and_then(convert::timestamp),
        deployment_status: str_at(output, "DeploymentStatus"),
        status: str_at(output, "FrameworkStatus"),
        tags,
    }
}

fn controls_to_wire(controls: &[Control]) -> Value {
    Value::Array(controls.iter().map(Control::to_wire).collect())
}

/// AWS Backup audit framework
#[derive(Debug, Clone, Copy, Default)]
pub struct Framework;

impl Framework {
    pub fn control_schema() -> Schema {
        Schema::new("control")
            .attribute(Attribute::required("name", AttrType::String).validate(Validator::LengthBetween(1, 256)))
            .attribute(
                Attribute::optional("input_parameter", AttrType::Set).block(
                    Schema::new("input_parameter")
                        .attribute(Attribute::optional("name", AttrType::String))
                        .attribute(Attribute::optional("value", AttrType::String)),
                ),
            )
            .attribute(
                Attribute::optional("scope", AttrType::Map).block(
                    Schema::new("scope")
                        .attribute(
                            Attribute::optional("compliance_resource_ids", AttrType::Set)
                                .validate(Validator::NotEmpty),
                        )
                        .attribute(Attribute::optional("compliance_resource_types", AttrType::Set))
                        .attribute(Attribute::optional("tags", AttrType::Map)),
                ),
            )
    }
}

#[async_trait]
impl Resource for Framework {
    type Config = FrameworkConfig;
    type State = FrameworkState;

    const TYPE_NAME: &'static str = "aws_backup_framework";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(Attribute::computed("arn", AttrType::String))
            .attribute(
                Attribute::required("name", AttrType::String)
                    .force_new()
                    .validate(Validator::LengthBetween(1, 256))
                    .validate(Validator::Pattern {
                        pattern: r"^[a-zA-Z][_a-zA-Z0-9]*$",
                        message: "must start with a letter and contain only alphanumeric characters and underscores",
                    }),
            )
            .attribute(
                Attribute::optional("description", AttrType::String).validate(Validator::LengthBetween(0, 1024)),
            )
            .attribute(Attribute::required("control", AttrType::Set).block(Self::control_schema()))
            .attribute(Attribute::computed("creation_time", AttrType::String))
            .attribute(Attribute::computed("deployment_status", AttrType::String))
            .attribute(Attribute::computed("status", AttrType::String))
            .attribute(Attribute::optional("tags", AttrType::Map))
    }

    fn state_id(state: &FrameworkState) -> &str {
        &state.id
    }

    async fn create(&self, client: &AwsClient, config: &FrameworkConfig) -> Result<FrameworkState> {
        Self::validate(config)?;
        if config.control.is_empty() {
            return Err(ProviderError::validation("control", "at least one control is required"));
        }

        let mut body = json!({
            "FrameworkName": config.name,
            "FrameworkControls": controls_to_wire(&config.control),
            "IdempotencyToken": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(description) = &config.description {
            body["FrameworkDescription"] = json!(description);
        }
        if !config.tags.is_empty() {
            body["FrameworkTags"] = json!(config.tags);
        }

        tracing::info!("Creating {}", label(&config.name));
        client
            .rest_json(Service::Backup, "CreateFramework", Method::POST, "/audit/frameworks", &[], Some(&body))
            .await
            .map_err(|e| e.with_context("creating", &label(&config.name)))?;

        let id = FRAMEWORK_ID.encode(&[&config.name])?;

        wait_framework_deployed(client, &config.name, CREATE_TIMEOUT).await?;

        require_present(self.read(client, &id).await?, &label(&id))
    }

    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<FrameworkState>> {
        let [name] = FRAMEWORK_ID.decode_n::<1>(id)?;

        let Some(output) = finder::optional(find_framework_by_name(client, &name).await)
            .map_err(|e| e.with_context("reading", &label(&name)))?
        else {
            tracing::warn!("{} not found, removing from state", label(&name));
            return Ok(None);
        };

        let arn = str_at(&output, "FrameworkArn").unwrap_or_default();
        let tags = list_tags(client, &arn)
            .await
            .map_err(|e| e.with_context("listing tags for", &label(&name)))?;

        Ok(Some(flatten_framework(&output, tags)))
    }

    async fn update(
        &self,
        client: &AwsClient,
        id: &str,
        prior: &FrameworkConfig,
        desired: &FrameworkConfig,
    ) -> Result<FrameworkState> {
        let [name] = FRAMEWORK_ID.decode_n::<1>(id)?;
        let diff = plan_update::<Self>(prior, desired)?;

        if diff.has_changes(&["description", "control"]) {
            let mut body = json!({
                "FrameworkControls": controls_to_wire(&desired.control),
                "IdempotencyToken": uuid::Uuid::new_v4().to_string(),
            });
            if let Some(description) = &desired.description {
                body["FrameworkDescription"] = json!(description);
            }

            tracing::info!("Updating {}", label(&name));
            client
                .rest_json(
                    Service::Backup,
                    "UpdateFramework",
                    Method::PUT,
                    &encode_path(&["audit", "frameworks", &name]),
                    &[],
                    Some(&body),
                )
                .await
                .map_err(|e| e.with_context("updating", &label(&name)))?;

            wait_framework_deployed(client, &name, UPDATE_TIMEOUT).await?;
        }

        if diff.has_change("tags") {
            let output = find_framework_by_name(client, &name).await?;
            let arn = str_at(&output, "FrameworkArn").unwrap_or_default();
            update_tags(client, &arn, &prior.tags, &desired.tags)
                .await
                .map_err(|e| e.with_context("updating tags for", &label(&name)))?;
        }

        require_present(self.read(client, id).await?, &label(&name))
    }

    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()> {
        let [name] = FRAMEWORK_ID.decode_n::<1>(id)?;

        tracing::info!("Deleting {}", label(&name));
        let result = client
            .rest_json(
                Service::Backup,
                "DeleteFramework",
                Method::DELETE,
                &encode_path(&["audit", "frameworks", &name]),
                &[],
                None,
            )
            .await
            .map(|_| ());
        finder::ignore_not_found(result).map_err(|e| e.with_context("deleting", &label(&name)))?;

        wait_framework_deleted(client, &name, DELETE_TIMEOUT).await
    }
}
