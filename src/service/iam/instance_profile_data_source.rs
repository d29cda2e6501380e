//! `aws_iam_instance_profile` data source

use super::{find_instance_profile_by_name, label, members};
use crate::aws::AwsClient;
use crate::error::Result;
use crate::resource::convert::{self, str_at};
use crate::resource::{AttrType, Attribute, DataSource, Schema, Validator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProfileLookup {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProfileOutput {
    pub id: String,
    pub name: String,
    pub arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceProfileDataSource;

#[async_trait]
impl DataSource for InstanceProfileDataSource {
    type Args = InstanceProfileLookup;
    type Output = InstanceProfileOutput;

    const TYPE_NAME: &'static str = "aws_iam_instance_profile";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::required("name", AttrType::String).validate(Validator::LengthBetween(1, 128)))
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(Attribute::computed("arn", AttrType::String))
            .attribute(Attribute::computed("create_date", AttrType::String))
            .attribute(Attribute::computed("path", AttrType::String))
            .attribute(Attribute::computed("role_arn", AttrType::String))
            .attribute(Attribute::computed("role_id", AttrType::String))
            .attribute(Attribute::computed("role_name", AttrType::String))
    }

    async fn read(&self, client: &AwsClient, args: &InstanceProfileLookup) -> Result<InstanceProfileOutput> {
        Self::validate(args)?;

        let profile = find_instance_profile_by_name(client, &args.name)
            .await
            .map_err(|e| e.with_context("reading", &label(&args.name)))?;

        let roles = members(profile.get("Roles"));
        let role = roles.first();

        Ok(InstanceProfileOutput {
            id: str_at(&profile, "InstanceProfileId").unwrap_or_default(),
            name: args.name.clone(),
            arn: str_at(&profile, "Arn").unwrap_or_default(),
            create_date: profile.get("CreateDate").and_then(convert::timestamp),
            path: str_at(&profile, "Path").unwrap_or_default(),
            role_arn: role.and_then(|r| str_at(r, "Arn")),
            role_id: role.and_then(|r| str_at(r, "RoleId")),
            role_name: role.and_then(|r| str_at(r, "RoleName")),
        })
    }
}
