//! Per-service resource and data source handlers
//!
//! - [`backup`] - AWS Backup audit frameworks
//! - [`iam`] - IAM instance profiles
//! - [`opensearchserverless`] - OpenSearch Serverless access policies
//! - [`quicksight`] - QuickSight users
//! - [`rum`] - CloudWatch RUM metrics destinations

pub mod backup;
pub mod iam;
pub mod opensearchserverless;
pub mod quicksight;
pub mod rum;
