use crate::collector::CollectorSettings;
use crate::error::AgentError;
use anyhow::Context;
use gwmon_common::id::MAX_SNOWFLAKE_ID;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Local services polled for metrics, in startup order.
    pub services: Vec<String>,
    #[serde(default = "default_collect_interval")]
    pub collect_interval_secs: u64,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_grpc_timeout")]
    pub grpc_timeout_secs: u64,
    /// Retry queue capacity: how many families of a failed sync are kept.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
    #[serde(default = "default_snowflake_id")]
    pub gateway_machine_id: i32,
    #[serde(default = "default_snowflake_id")]
    pub gateway_node_id: i32,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Cloud metrics controller address.
    #[serde(default = "default_cloud_endpoint")]
    pub cloud_endpoint: String,
    /// Enable TLS for addresses given without a scheme
    #[serde(default)]
    pub tls: bool,
    /// Local service name -> address.
    #[serde(default)]
    pub services: HashMap<String, String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cloud_endpoint: default_cloud_endpoint(),
            tls: false,
            services: HashMap::new(),
        }
    }
}

fn default_collect_interval() -> u64 {
    60
}

fn default_sync_interval() -> u64 {
    60
}

fn default_grpc_timeout() -> u64 {
    10
}

fn default_queue_length() -> usize {
    1000
}

fn default_snowflake_id() -> i32 {
    1
}

fn default_cloud_endpoint() -> String {
    "127.0.0.1:9090".to_string()
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        Self::load_layered(path, None)
    }

    /// Loads `path`, then replaces every top-level key that also appears in
    /// `override_path`. A missing override file is skipped.
    pub fn load_layered(path: &str, override_path: Option<&str>) -> anyhow::Result<Self> {
        let mut table = read_table(path)?;

        if let Some(override_path) = override_path {
            if Path::new(override_path).is_file() {
                let overrides = read_table(override_path)?;
                tracing::info!(
                    path = override_path,
                    keys = overrides.len(),
                    "Applying config overrides"
                );
                table.extend(overrides);
            } else {
                tracing::debug!(path = override_path, "No config override file");
            }
        }

        let config: Self = toml::Value::Table(table)
            .try_into()
            .with_context(|| format!("Invalid agent config in {path}"))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.collect_interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "collect_interval_secs must be positive".into(),
            ));
        }
        if self.sync_interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "sync_interval_secs must be positive".into(),
            ));
        }
        if self.grpc_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "grpc_timeout_secs must be positive".into(),
            ));
        }
        for (key, id) in [
            ("gateway_machine_id", self.gateway_machine_id),
            ("gateway_node_id", self.gateway_node_id),
        ] {
            if !(0..=MAX_SNOWFLAKE_ID).contains(&id) {
                return Err(AgentError::InvalidConfig(format!(
                    "{key} must be within 0..={MAX_SNOWFLAKE_ID}, got {id}"
                )));
            }
        }
        if self.registry.cloud_endpoint.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "registry.cloud_endpoint is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.as_str()) {
                return Err(AgentError::InvalidConfig(format!(
                    "service '{service}' is listed twice"
                )));
            }
            if !self.registry.services.contains_key(service) {
                return Err(AgentError::InvalidConfig(format!(
                    "service '{service}' has no address in registry.services"
                )));
            }
        }
        Ok(())
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            collect_interval: Duration::from_secs(self.collect_interval_secs),
            sync_interval: Duration::from_secs(self.sync_interval_secs),
            rpc_timeout: Duration::from_secs(self.grpc_timeout_secs),
            queue_length: self.queue_length,
        }
    }
}

impl RegistryConfig {
    /// Build the gRPC endpoint URI from an address and the tls flag.
    pub fn endpoint_uri(&self, addr: &str) -> String {
        let addr = addr.trim();
        if addr.contains("://") {
            return addr.to_string();
        }
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{addr}")
    }
}

fn read_table(path: &str) -> anyhow::Result<toml::Table> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {path}"))?;
    let table = content
        .parse::<toml::Table>()
        .with_context(|| format!("Failed to parse config file {path}"))?;
    Ok(table)
}
