//! Service discovery: maps a logical service name to a gRPC channel.

use crate::config::RegistryConfig;
use crate::error::{AgentError, Result};
use std::collections::HashMap;
use std::fmt;
use tonic::transport::{Channel, Endpoint};

/// Name under which the cloud metrics controller is resolved.
pub const CLOUD_METRICS_SERVICE: &str = "metricsd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A service running on this gateway.
    Local,
    /// A service hosted by the cloud controller.
    Cloud,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Local => write!(f, "local"),
            Scope::Cloud => write!(f, "cloud"),
        }
    }
}

/// Resolved channels, built once at startup.
///
/// Channels connect lazily and are cheap to clone, so every collection and
/// sync cycle may call [`ServiceRegistry::resolve_channel`] afresh.
#[derive(Clone)]
pub struct ServiceRegistry {
    channels: HashMap<(Scope, String), Channel>,
}

impl ServiceRegistry {
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut channels = HashMap::new();
        for (service, addr) in &config.services {
            let channel = lazy_channel(service, &config.endpoint_uri(addr))?;
            channels.insert((Scope::Local, service.clone()), channel);
        }
        let channel = lazy_channel(
            CLOUD_METRICS_SERVICE,
            &config.endpoint_uri(&config.cloud_endpoint),
        )?;
        channels.insert((Scope::Cloud, CLOUD_METRICS_SERVICE.to_string()), channel);

        tracing::debug!(count = channels.len(), "Service registry built");
        Ok(Self { channels })
    }

    pub fn resolve_channel(&self, service: &str, scope: Scope) -> Result<Channel> {
        self.channels
            .get(&(scope, service.to_string()))
            .cloned()
            .ok_or_else(|| AgentError::UnknownService(format!("{scope}/{service}")))
    }
}

fn lazy_channel(service: &str, uri: &str) -> Result<Channel> {
    let endpoint =
        Endpoint::from_shared(uri.to_string()).map_err(|source| AgentError::InvalidEndpoint {
            service: service.to_string(),
            endpoint: uri.to_string(),
            source,
        })?;
    Ok(endpoint.connect_lazy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_config() -> RegistryConfig {
        let mut config = RegistryConfig::default();
        config.services.insert("mme".into(), "127.0.0.1:50073".into());
        config
    }

    #[tokio::test]
    async fn resolves_local_and_cloud_channels() {
        let registry = ServiceRegistry::from_config(&registry_config()).unwrap();
        assert!(registry.resolve_channel("mme", Scope::Local).is_ok());
        assert!(registry
            .resolve_channel(CLOUD_METRICS_SERVICE, Scope::Cloud)
            .is_ok());
    }

    #[tokio::test]
    async fn scope_is_part_of_the_key() {
        let registry = ServiceRegistry::from_config(&registry_config()).unwrap();
        let err = registry.resolve_channel("mme", Scope::Cloud).unwrap_err();
        assert!(matches!(err, AgentError::UnknownService(ref s) if s == "cloud/mme"));
        assert!(registry
            .resolve_channel(CLOUD_METRICS_SERVICE, Scope::Local)
            .is_err());
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let mut config = registry_config();
        config.services.insert("broken".into(), "http://bad host:1".into());
        let err = ServiceRegistry::from_config(&config).err().unwrap();
        assert!(matches!(err, AgentError::InvalidEndpoint { ref service, .. } if service == "broken"));
    }
}
