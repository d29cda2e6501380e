//! `aws_iam_instance_profile` resource

use super::{call, find_instance_profile_by_name, label, members, tag_params};
use crate::aws::AwsClient;
use crate::error::Result;
use crate::resource::convert::{self, str_at};
use crate::resource::finder;
use crate::resource::waiter::{self, Poll};
use crate::resource::{plan_update, require_present, AttrType, Attribute, IdCodec, Resource, Schema, Validator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const PROFILE_ID: IdCodec = IdCodec::new('/', &["name"]);

const DEFAULT_PATH: &str = "/";

/// How long a new profile may take to become visible
const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProfileConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProfileState {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    pub unique_id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl From<&Value> for InstanceProfileState {
    fn from(profile: &Value) -> Self {
        let name = str_at(profile, "InstanceProfileName").unwrap_or_default();
        let roles = members(profile.get("Roles"));
        Self {
            id: name.clone(),
            name,
            path: str_at(profile, "Path").unwrap_or_else(|| DEFAULT_PATH.to_string()),
            role: roles.first().and_then(|r| str_at(r, "RoleName")),
            arn: str_at(profile, "Arn").unwrap_or_default(),
            create_date: profile.get("CreateDate").and_then(convert::timestamp),
            unique_id: str_at(profile, "InstanceProfileId").unwrap_or_default(),
            tags: convert::tags_from_list(Some(&Value::Array(members(profile.get("Tags"))))),
        }
    }
}

fn profile_role_params(name: &str, role: &str) -> Vec<(String, String)> {
    vec![
        ("InstanceProfileName".to_string(), name.to_string()),
        ("RoleName".to_string(), role.to_string()),
    ]
}

async fn add_role(client: &AwsClient, name: &str, role: &str) -> Result<()> {
    call(client, "AddRoleToInstanceProfile", profile_role_params(name, role))
        .await
        .map_err(|e| e.with_context(&format!("adding role {} to", role), &label(name)))?;
    Ok(())
}

async fn remove_role(client: &AwsClient, name: &str, role: &str) -> Result<()> {
    let result = call(client, "RemoveRoleFromInstanceProfile", profile_role_params(name, role))
        .await
        .map(|_| ());
    finder::ignore_not_found(result).map_err(|e| e.with_context(&format!("removing role {} from", role), &label(name)))
}

/// IAM instance profile
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceProfile;

#[async_trait]
impl Resource for InstanceProfile {
    type Config = InstanceProfileConfig;
    type State = InstanceProfileState;

    const TYPE_NAME: &'static str = "aws_iam_instance_profile";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(Attribute::computed("arn", AttrType::String))
            .attribute(Attribute::computed("create_date", AttrType::String))
            .attribute(
                Attribute::required("name", AttrType::String)
                    .force_new()
                    .validate(Validator::LengthBetween(1, 128))
                    .validate(Validator::Pattern {
                        pattern: r"^[\w+=,.@-]*$",
                        message: "must match [\\w+=,.@-]",
                    }),
            )
            .attribute(
                Attribute::optional("path", AttrType::String)
                    .force_new()
                    .default_value(DEFAULT_PATH)
                    .validate(Validator::LengthBetween(1, 512)),
            )
            .attribute(Attribute::optional("role", AttrType::String).validate(Validator::NotEmpty))
            .attribute(Attribute::optional("tags", AttrType::Map))
            .attribute(Attribute::computed("unique_id", AttrType::String))
    }

    fn state_id(state: &InstanceProfileState) -> &str {
        &state.id
    }

    async fn create(&self, client: &AwsClient, config: &InstanceProfileConfig) -> Result<InstanceProfileState> {
        Self::validate(config)?;

        let mut params = vec![
            ("InstanceProfileName".to_string(), config.name.clone()),
            (
                "Path".to_string(),
                config.path.clone().unwrap_or_else(|| DEFAULT_PATH.to_string()),
            ),
        ];
        params.extend(tag_params(&config.tags));

        tracing::info!("Creating {}", label(&config.name));
        call(client, "CreateInstanceProfile", params)
            .await
            .map_err(|e| e.with_context("creating", &label(&config.name)))?;

        let id = PROFILE_ID.encode(&[&config.name])?;

        // New profiles take a moment to become readable
        waiter::wait_until(&label(&id), "visible", PROPAGATION_TIMEOUT, client.poll_interval(), || async {
            Ok(match finder::optional(find_instance_profile_by_name(client, &config.name).await)? {
                Some(_) => Poll::Ready(()),
                None => Poll::Pending("NOT_FOUND".to_string()),
            })
        })
        .await?;

        if let Some(role) = &config.role {
            add_role(client, &config.name, role).await?;
        }

        require_present(self.read(client, &id).await?, &label(&id))
    }

    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<InstanceProfileState>> {
        let [name] = PROFILE_ID.decode_n::<1>(id)?;

        match finder::optional(find_instance_profile_by_name(client, &name).await)
            .map_err(|e| e.with_context("reading", &label(&name)))?
        {
            Some(profile) => Ok(Some(InstanceProfileState::from(&profile))),
            None => {
                tracing::warn!("{} not found, removing from state", label(&name));
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        client: &AwsClient,
        id: &str,
        prior: &InstanceProfileConfig,
        desired: &InstanceProfileConfig,
    ) -> Result<InstanceProfileState> {
        let [name] = PROFILE_ID.decode_n::<1>(id)?;
        let diff = plan_update::<Self>(prior, desired)?;

        if diff.has_change("role") {
            tracing::info!("Updating role of {}", label(&name));
            if let Some(old) = &prior.role {
                remove_role(client, &name, old).await?;
            }
            if let Some(new) = &desired.role {
                add_role(client, &name, new).await?;
            }
        }

        if diff.has_change("tags") {
            let (upsert, remove) = convert::tag_changes(&prior.tags, &desired.tags);
            if !remove.is_empty() {
                let mut params = vec![("InstanceProfileName".to_string(), name.clone())];
                params.extend(
                    remove
                        .iter()
                        .enumerate()
                        .map(|(i, k)| (format!("TagKeys.member.{}", i + 1), k.clone())),
                );
                call(client, "UntagInstanceProfile", params)
                    .await
                    .map_err(|e| e.with_context("untagging", &label(&name)))?;
            }
            if !upsert.is_empty() {
                let mut params = vec![("InstanceProfileName".to_string(), name.clone())];
                params.extend(tag_params(&upsert));
                call(client, "TagInstanceProfile", params)
                    .await
                    .map_err(|e| e.with_context("tagging", &label(&name)))?;
            }
        }

        require_present(self.read(client, id).await?, &label(&name))
    }

    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()> {
        let [name] = PROFILE_ID.decode_n::<1>(id)?;

        let Some(profile) = finder::optional(find_instance_profile_by_name(client, &name).await)
            .map_err(|e| e.with_context("reading", &label(&name)))?
        else {
            return Ok(());
        };

        for role in members(profile.get("Roles")) {
            if let Some(role_name) = str_at(&role, "RoleName") {
                remove_role(client, &name, &role_name).await?;
            }
        }

        tracing::info!("Deleting {}", label(&name));
        let result = call(
            client,
            "DeleteInstanceProfile",
            vec![("InstanceProfileName".to_string(), name.clone())],
        )
        .await
        .map(|_| ());
        finder::ignore_not_found(result).map_err(|e| e.with_context("deleting", &label(&name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_from_profile() {
        let profile = json!({
            "InstanceProfileName": "web",
            "InstanceProfileId": "AIPAEXAMPLE",
            "Arn": "arn:aws:iam::123456789012:instance-profile/web",
            "Path": "/app/",
            "CreateDate": 1700000000,
            "Roles": [{"RoleName": "web-role", "RoleId": "AROAEXAMPLE"}],
            "Tags": [{"Key": "env", "Value": "prod"}]
        });
        let state = InstanceProfileState::from(&profile);
        assert_eq!(state.id, "web");
        assert_eq!(state.path, "/app/");
        assert_eq!(state.role.as_deref(), Some("web-role"));
        assert_eq!(state.unique_id, "AIPAEXAMPLE");
        assert_eq!(state.create_date.as_deref(), Some("2023-11-14T22:13:20Z"));
        assert_eq!(state.tags.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_default_path_is_not_a_change() {
        let prior = InstanceProfileConfig {
            name: "web".to_string(),
            ..Default::default()
        };
        let desired = InstanceProfileConfig {
            path: Some("/".to_string()),
            ..prior.clone()
        };
        assert!(plan_update::<InstanceProfile>(&prior, &desired).unwrap().is_empty());
    }

    #[test]
    fn test_path_change_requires_replacement() {
        let prior = InstanceProfileConfig {
            name: "web".to_string(),
            ..Default::default()
        };
        let desired = InstanceProfileConfig {
            path: Some("/other/".to_string()),
            ..prior.clone()
        };
        assert!(plan_update::<InstanceProfile>(&prior, &desired).is_err());
    }
}
