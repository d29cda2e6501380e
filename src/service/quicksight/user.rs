//! `aws_quicksight_user` resource

use super::{find_user_by_id, label, user_path};
use crate::aws::{AwsClient, Service};
use crate::error::{ProviderError, Result};
use crate::resource::convert::str_at;
use crate::resource::finder;
use crate::resource::{plan_update, require_present, AttrType, Attribute, IdCodec, Resource, Schema, Validator};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_USER_NAMESPACE: &str = "default";

const USER_ID: IdCodec = IdCodec::new('/', &["aws_account_id", "namespace", "user_name"]).with_trailing_rest();

const IDENTITY_TYPES: &[&str] = &["IAM", "QUICKSIGHT"];
const USER_ROLES: &[&str] = &["READER", "AUTHOR", "ADMIN"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_account_id: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_arn: Option<String>,
    pub identity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub user_role: String,
}

impl UserConfig {
    fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_USER_NAMESPACE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub id: String,
    pub arn: String,
    pub aws_account_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    pub namespace: String,
    pub user_name: String,
    pub user_role: String,
}

/// QuickSight user
#[derive(Debug, Clone, Copy, Default)]
pub struct User;

#[async_trait]
impl Resource for User {
    type Config = UserConfig;
    type State = UserState;

    const TYPE_NAME: &'static str = "aws_quicksight_user";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(Attribute::computed("arn", AttrType::String))
            .attribute(Attribute::optional_computed("aws_account_id", AttrType::String).force_new())
            .attribute(Attribute::required("email", AttrType::String).validate(Validator::NotEmpty))
            .attribute(Attribute::optional("iam_arn", AttrType::String).force_new())
            .attribute(
                Attribute::required("identity_type", AttrType::String)
                    .force_new()
                    .validate(Validator::OneOf(IDENTITY_TYPES)),
            )
            .attribute(
                Attribute::optional("namespace", AttrType::String)
                    .force_new()
                    .default_value(DEFAULT_USER_NAMESPACE)
                    .validate(Validator::LengthBetween(1, 63))
                    .validate(Validator::Pattern {
                        pattern: r"^[a-zA-Z0-9._-]*$",
                        message: "must contain only alphanumeric characters, hyphens, underscores, and periods",
                    }),
            )
            .attribute(Attribute::optional("session_name", AttrType::String).force_new())
            .attribute(
                Attribute::optional("user_name", AttrType::String)
                    .force_new()
                    .validate(Validator::NotEmpty),
            )
            .attribute(Attribute::required("user_role", AttrType::String).validate(Validator::OneOf(USER_ROLES)))
    }

    fn state_id(state: &UserState) -> &str {
        &state.id
    }

    async fn create(&self, client: &AwsClient, config: &UserConfig) -> Result<UserState> {
        Self::validate(config)?;

        let account_id = match &config.aws_account_id {
            Some(id) => id.clone(),
            None => client.account_id().await?,
        };
        let namespace = config.namespace();

        let mut body = json!({
            "Email": config.email,
            "IdentityType": config.identity_type,
            "UserRole": config.user_role,
        });
        if let Some(iam_arn) = &config.iam_arn {
            body["IamArn"] = json!(iam_arn);
        }
        if let Some(session_name) = &config.session_name {
            body["SessionName"] = json!(session_name);
        }
        if let Some(user_name) = &config.user_name {
            body["UserName"] = json!(user_name);
        }

        let what = label(&format!("{}/{}", account_id, namespace));
        tracing::info!("Registering {}", what);
        let response = client
            .rest_json(
                Service::QuickSight,
                "RegisterUser",
                Method::POST,
                &user_path(&account_id, namespace, None),
                &[],
                Some(&body),
            )
            .await
            .map_err(|e| e.with_context("registering", &what))?;

        let user_name = str_at(&response, "User.UserName")
            .or_else(|| config.user_name.clone())
            .ok_or_else(|| ProviderError::decode("RegisterUser response", "missing User.UserName"))?;

        let id = USER_ID.encode(&[&account_id, namespace, &user_name])?;
        require_present(self.read(client, &id).await?, &label(&id))
    }

    async fn read(&self, client: &AwsClient, id: &str) -> Result<Option<UserState>> {
        let [account_id, namespace, user_name] = USER_ID.decode_n::<3>(id)?;

        let Some(user) = finder::optional(find_user_by_id(client, &account_id, &namespace, &user_name).await)
            .map_err(|e| e.with_context("reading", &label(id)))?
        else {
            tracing::warn!("{} is not found, removing from state", label(id));
            return Ok(None);
        };

        Ok(Some(flatten_user(id, &account_id, &namespace, &user)))
    }

    async fn update(&self, client: &AwsClient, id: &str, prior: &UserConfig, desired: &UserConfig) -> Result<UserState> {
        let [account_id, namespace, user_name] = USER_ID.decode_n::<3>(id)?;
        let diff = plan_update::<Self>(prior, desired)?;

        if diff.has_changes(&["email", "user_role"]) {
            tracing::info!("Updating {}", label(id));
            client
                .rest_json(
                    Service::QuickSight,
                    "UpdateUser",
                    Method::PUT,
                    &user_path(&account_id, &namespace, Some(&user_name)),
                    &[],
                    Some(&json!({
                        "Email": desired.email,
                        "Role": desired.user_role,
                    })),
                )
                .await
                .map_err(|e| e.with_context("updating", &label(id)))?;
        }

        require_present(self.read(client, id).await?, &label(id))
    }

    async fn delete(&self, client: &AwsClient, id: &str) -> Result<()> {
        let [account_id, namespace, user_name] = USER_ID.decode_n::<3>(id)?;

        tracing::info!("Deleting {}", label(id));
        let result = client
            .rest_json(
                Service::QuickSight,
                "DeleteUser",
                Method::DELETE,
                &user_path(&account_id, &namespace, Some(&user_name)),
                &[],
                None,
            )
            .await
            .map(|_| ());
        finder::ignore_not_found(result).map_err(|e| e.with_context("deleting", &label(id)))
    }
}

fn flatten_user(id: &str, account_id: &str, namespace: &str, user: &Value) -> UserState {
    UserState {
        id: id.to_string(),
        arn: str_at(user, "Arn").unwrap_or_default(),
        aws_account_id: account_id.to_string(),
        email: str_at(user, "Email").unwrap_or_default(),
        identity_type: str_at(user, "IdentityType"),
        namespace: namespace.to_string(),
        user_name: str_at(user, "UserName").unwrap_or_default(),
        user_role: str_at(user, "Role").unwrap_or_default(),
    }
}
