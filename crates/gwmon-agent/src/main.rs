use anyhow::{Context, Result};
use gwmon_agent::collector::MetricsCollector;
use gwmon_agent::config::AgentConfig;
use gwmon_agent::registry::ServiceRegistry;
use gwmon_agent::rpc::{GrpcMetricsSink, GrpcMetricsSource};
use gwmon_common::id::SnowflakeIdentity;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gwmon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());
    let override_path = std::env::args().nth(2);

    let config = AgentConfig::load_layered(&config_path, override_path.as_deref())?;
    tracing::info!(
        services = config.services.len(),
        cloud = %config.registry.cloud_endpoint,
        "gwmon-agent starting"
    );

    let registry =
        ServiceRegistry::from_config(&config.registry).context("Failed to build service registry")?;
    let collector = MetricsCollector::new(
        config.collector_settings(),
        config.services.clone(),
        Arc::new(GrpcMetricsSource::new(registry.clone())),
        Arc::new(GrpcMetricsSink::new(registry)),
        Arc::new(SnowflakeIdentity::new(
            config.gateway_machine_id,
            config.gateway_node_id,
        )),
    );

    tokio::select! {
        _ = collector.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
