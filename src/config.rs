//! Configuration Management
//!
//! Handles persistent configuration storage for cloudrec and builds the
//! client handle from it.

use crate::aws::auth::{self, Credentials};
use crate::aws::http::RetryConfig;
use crate::aws::{AwsClient, Service};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Region to operate in
    #[serde(default)]
    pub region: Option<String>,
    /// Profile in the shared credentials file
    #[serde(default)]
    pub profile: Option<String>,
    /// Known account ID (skips the STS lookup)
    #[serde(default)]
    pub account_id: Option<String>,
    /// Per-service endpoint overrides, keyed by service (`backup`, `iam`, ...)
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// Maximum attempts per API call, including the first
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudrec").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file; missing or unreadable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing config {:?}", path))?;

        Ok(())
    }

    /// Get effective region (CLI > config > AWS provider chain > us-east-1)
    pub fn effective_region(&self, cli: Option<&str>, chain: Option<&str>) -> String {
        cli.or(self.region.as_deref())
            .or(chain)
            .unwrap_or(auth::DEFAULT_REGION)
            .to_string()
    }

    /// Retry policy with the configured attempt count
    pub fn retry_config(&self) -> RetryConfig {
        match self.max_retries {
            Some(max_attempts) => RetryConfig {
                max_attempts: max_attempts.max(1),
                ..RetryConfig::default()
            },
            None => RetryConfig::default(),
        }
    }

    /// Build a client for `region` with these settings applied
    pub fn build_client(&self, credentials: Credentials, region: &str) -> Result<AwsClient> {
        if !auth::validate_region(region) {
            anyhow::bail!("invalid region {:?}", region);
        }

        let mut client = AwsClient::with_retry(credentials, region, self.retry_config())?;

        for (key, endpoint) in &self.endpoints {
            let service = Service::from_config_key(key)
                .with_context(|| format!("unknown service {:?} in endpoints", key))?;
            client = client.with_endpoint(service, endpoint)?;
        }

        if let Some(account_id) = &self.account_id {
            client = client.with_account_id(account_id);
        }

        Ok(client)
    }

    /// Set region and save
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        self.region = Some(region.to_string());
        self.save()
    }
}
