//! `aws_backup_framework` data source

use super::framework::{flatten_framework, Control, Framework};
use super::{find_framework_by_name, label, list_tags};
use crate::aws::AwsClient;
use crate::error::Result;
use crate::resource::convert::str_at;
use crate::resource::{AttrType, Attribute, DataSource, Schema, Validator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkLookup {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkOutput {
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

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameworkDataSource;

#[async_trait]
impl DataSource for FrameworkDataSource {
    type Args = FrameworkLookup;
    type Output = FrameworkOutput;

    const TYPE_NAME: &'static str = "aws_backup_framework";

    fn schema() -> Schema {
        Schema::new(Self::TYPE_NAME)
            .attribute(Attribute::required("name", AttrType::String).validate(Validator::NotEmpty))
            .attribute(Attribute::computed("id", AttrType::String))
            .attribute(Attribute::computed("arn", AttrType::String))
            .attribute(Attribute::computed("description", AttrType::String))
            .attribute(Attribute::computed("control", AttrType::Set).block(Framework::control_schema()))
            .attribute(Attribute::computed("creation_time", AttrType::String))
            .attribute(Attribute::computed("deployment_status", AttrType::String))
            .attribute(Attribute::computed("status", AttrType::String))
            .attribute(Attribute::computed("tags", AttrType::Map))
    }

    async fn read(&self, client: &AwsClient, args: &FrameworkLookup) -> Result<FrameworkOutput> {
        Self::validate(args)?;

        let output = find_framework_by_name(client, &args.name)
            .await
            .map_err(|e| e.with_context("reading", &label(&args.name)))?;
        let arn = str_at(&output, "FrameworkArn").unwrap_or_default();
        let tags = list_tags(client, &arn).await?;

        let state = flatten_framework(&output, tags);
        Ok(FrameworkOutput {
            id: state.id,
            name: state.name,
            arn: state.arn,
            description: state.description,
            control: state.control,
            creation_time: state.creation_time,
            deployment_status: state.deployment_status,
            status: state.status,
            tags: state.tags,
        })
    }
}
