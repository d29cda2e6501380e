//! `aws_opensearchserverless_access_policy` resource

use super::{call, find_access_policy_by_name_and_type, label, ACCESS_POLICY_TYPES};
use crate::aws::AwsClient;
use crate::error::Result;
use crate::resource::convert::{self, str_at};
use crate::resource::finder;
use crate::resource::{plan_update, require_present, AttrType, Attribute, IdCodec, Resource, Schema, Validator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const POLICY_ID: IdCodec = IdCodec::new('/', &["name", "type"]);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicyConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicyState {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub policy_version: String,
}

/// Build state from an `accessPolicyDetail`, keeping `configured` when
/// the remote document is semantically the same
fn flatten_policy(id: String, detail: &Value, configured: Option<&str>) -> AccessPolicyState {
    AccessPolicyState {
        id,
        name: str_at(detail, "name").unwrap_or_default(),
        policy_type: str_at(detail, "type").unwrap_or_default(),
        policy: detail
            .get("policy")
            .map(|remote| convert::policy_to_state(configured, remote))
            .unwrap_or_default(),
        description: str_at(detail, "description").filter(|d| !d.is_empty()),
        policy_version: str_at(detail, "policyVersion").unwrap_or_default(),
    }
}

/// OpenSearch Serverless access policy
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    async fn read_with(
        &self,
        client: &AwsClient,
        id: &str,
        configured: Option<&str>,
    ) -> Result<Option<AccessPolicyState>> {
        let [name, policy_type] = POLICY_ID.decode_n::<2>(id)?;

        match finder::optional(find_access_policy_by_name_and_type(client, &name, &policy_type).await)
            .map_err(|e| e.with_context("reading", &label(&name, &policy_type)))?
        {
            Some(detail) => Ok(Some(flatten_policy(id.to_string(), &detail, configured))),
            None => {
                tracing::warn!("{} not found, removing from state", label(&name, &policy_type));
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Resource for AccessPolicy {
    type Config = AccessPolicyConfig;
    type State = AccessPolicyState;

    const TYPE_NAME: &'static str = "aws_opensearchserverless_access_policy";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(
                Attribute::optional("description", AttrType::String).validate(Validator::LengthBetween(1, 1000)),
            )
            .attribute(
                Attribute::required("name", AttrType::String)
                    .force_new()
                    .validate(Validator::LengthBetween(3, 32)),
            )
            .attribute(
                Attribute::required("policy", AttrType::String)
                    .validate(Validator::LengthBetween(1, 20480))
                    .validate(Validator::JsonDocument),
            )
            .attribute(Attribute::computed("policy_version", AttrType::String))
            .attribute(
                Attribute::required("type", AttrType::String)
                    .force_new()
                    .validate(Validator::OneOf(ACCESS_POLICY_TYPES)),
            )
    }

    fn state_id(state: &AccessPolicyState) -> &str {
        &state.id
    }

    async fn create(&self, client: &AwsClient, config: &AccessPolicyConfig) -> Result<AccessPolicyState> {
        Self::validate(config)?;
        let id = POLICY_ID.encode(&[&config.name, &config.policy_type])?;

        let mut body = json!({
            "name": config.name,
            "type": config.policy_type,
            "policy": config.policy,
            "clientToken": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(description) = &config.description {
            body["description"] = json!(description);
        }

        tracing::info!("Creating {}", label(&config.name, &config.policy_type));
        call(client, "CreateAccessPolicy", &body)
            .await
            .map_err(|e| e.with_context("creating", &label(&config.name, &config.policy_type)))?;

        require_present(
            self.read_with(client, &id, Some(&config.policy)).await?,
            &label(&config.name, &config.policy_type),
        )
    }

    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<AccessPolicyState>> {
        self.read_with(client, id, None).await
    }

    async fn update(
        &self,
        client: &AwsClient,
        id: &str,
        prior: &AccessPolicyConfig,
        desired: &AccessPolicyConfig,
    ) -> Result<AccessPolicyState> {
        let [name, policy_type] = POLICY_ID.decode_n::<2>(id)?;
        let diff = plan_update::<Self>(prior, desired)?;

        let policy_changed = diff.has_change("policy") && {
            let old: Value = convert::parse_policy("policy", &prior.policy)?;
            let new: Value = convert::parse_policy("policy", &desired.policy)?;
            !convert::policies_equivalent(&old, &new)
        };

        if policy_changed || diff.has_change("description") {
            // UpdateAccessPolicy needs the current version
            let current = find_access_policy_by_name_and_type(client, &name, &policy_type)
                .await
                .map_err(|e| e.with_context("reading", &label(&name, &policy_type)))?;

            let mut body = json!({
                "name": name,
                "type": policy_type,
                "policyVersion": str_at(&current, "policyVersion").unwrap_or_default(),
                "clientToken": uuid::Uuid::new_v4().to_string(),
            });
            if policy_changed {
                body["policy"] = json!(desired.policy);
            }
            if diff.has_change("description") {
                body["description"] = json!(desired.description.clone().unwrap_or_default());
            }

            tracing::info!("Updating {}", label(&name, &policy_type));
            call(client, "UpdateAccessPolicy", &body)
                .await
                .map_err(|e| e.with_context("updating", &label(&name, &policy_type)))?;
        }

        require_present(
            self.read_with(client, id, Some(&desired.policy)).await?,
            &label(&name, &policy_type),
        )
    }

    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()> {
        let [name, policy_type] = POLICY_ID.decode_n::<2>(id)?;

        tracing::info!("Deleting {}", label(&name, &policy_type));
        let result = call(
            client,
            "DeleteAccessPolicy",
            &json!({
                "name": name,
                "type": policy_type,
                "clientToken": uuid::Uuid::new_v4().to_string(),
            }),
        )
        .await
        .map(|_| ());
        finder::ignore_not_found(result).map_err(|e| e.with_context("deleting", &label(&name, &policy_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"[{"Rules":[{"ResourceType":"index","Resource":["index/books/*"],"Permission":["aoss:ReadDocument"]}],"Principal":["arn:aws:iam::123456789012:user/reader"]}]"#;

    fn config() -> AccessPolicyConfig {
        AccessPolicyConfig {
            name: "books-read".to_string(),
            policy_type: "data".to_string(),
            policy: POLICY.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_config_serializes_type_attribute() {
        let value = serde_json::to_value(config()).unwrap();
        assert_eq!(value["type"], "data");
        AccessPolicy::validate(&config()).unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_policy_and_type() {
        let bad_json = AccessPolicyConfig {
            policy: "{not json".to_string(),
            ..config()
        };
        assert!(AccessPolicy::validate(&bad_json).is_err());

        let bad_type = AccessPolicyConfig {
            policy_type: "network".to_string(),
            ..config()
        };
        assert!(AccessPolicy::validate(&bad_type).is_err());

        let short_name = AccessPolicyConfig {
            name: "ab".to_string(),
            ..config()
        };
        assert!(AccessPolicy::validate(&short_name).is_err());
    }

    #[test]
    fn test_flatten_keeps_equivalent_configured_policy() {
        let detail = json!({
            "name": "books-read",
            "type": "data",
            "policyVersion": "MTY5ODc2NzQ3NTg3M18x",
            "policy": [{
                "Principal": ["arn:aws:iam::123456789012:user/reader"],
                "Rules": [{"Permission": ["aoss:ReadDocument"], "Resource": ["index/books/*"], "ResourceType": "index"}]
            }]
        });
        let state = flatten_policy("books-read/data".to_string(), &detail, Some(POLICY));
        assert_eq!(state.policy, POLICY);
        assert_eq!(state.policy_version, "MTY5ODc2NzQ3NTg3M18x");
        assert!(state.description.is_none());

        let state = flatten_policy("books-read/data".to_string(), &detail, None);
        assert!(state.policy.starts_with(r#"[{"Principal""#));
    }
}
