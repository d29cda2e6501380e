//! `aws_opensearchserverless_access_policy` data source

use super::{find_access_policy_by_name_and_type, label, ACCESS_POLICY_TYPES};
use crate::aws::AwsClient;
use crate::error::Result;
use crate::resource::convert::{self, str_at};
use crate::resource::{AttrType, Attribute, DataSource, Schema, Validator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicyLookup {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicyOutput {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub policy: String,
    pub policy_version: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicyDataSource;

#[async_trait]
impl DataSource for AccessPolicyDataSource {
    type Args = AccessPolicyLookup;
    type Output = AccessPolicyOutput;

    const TYPE_NAME: &'static str = "aws_opensearchserverless_access_policy";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::computed("description", AttrType::String))
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(Attribute::required("name", AttrType::String).validate(Validator::LengthBetween(3, 32)))
            .attribute(Attribute::computed("policy", AttrType::String))
            .attribute(Attribute::computed("policy_version", AttrType::String))
            .attribute(Attribute::required("type", AttrType::String).validate(Validator::OneOf(ACCESS_POLICY_TYPES)))
    }

    async fn read(&self, client: &AwsClient, args: &AccessPolicyLookup) -> Result<AccessPolicyOutput> {
        Self::validate(args)?;

        let detail = find_access_policy_by_name_and_type(client, &args.name, &args.policy_type)
            .await
            .map_err(|e| e.with_context("reading", &label(&args.name, &args.policy_type)))?;

        let name = str_at(&detail, "name").unwrap_or_else(|| args.name.clone());
        Ok(AccessPolicyOutput {
            id: name.clone(),
            name,
            policy_type: str_at(&detail, "type").unwrap_or_else(|| args.policy_type.clone()),
            description: str_at(&detail, "description"),
            policy: detail.get("policy").map(convert::canonical_json).unwrap_or_default(),
            policy_version: str_at(&detail, "policyVersion").unwrap_or_default(),
        })
    }
}
