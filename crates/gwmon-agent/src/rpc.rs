//! RPC gateway clients for the two remote capabilities the agent uses: the
//! local `Service303.GetMetrics` endpoint and the cloud
//! `MetricsController.Collect` endpoint.

use crate::registry::{Scope, ServiceRegistry, CLOUD_METRICS_SERVICE};
use async_trait::async_trait;
use gwmon_common::proto::metrics_controller_client::MetricsControllerClient;
use gwmon_common::proto::service303_client::Service303Client;
use gwmon_common::proto::{MetricFamily, MetricsContainer, Void};
use std::future::Future;
use std::time::Duration;
use tonic::transport::Channel;
use tonic::{Request, Status};

/// Source of metric snapshots for a monitored local service.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetches the current families exposed by `service`, in service order.
    async fn get_metrics(
        &self,
        service: &str,
        timeout: Duration,
    ) -> Result<Vec<MetricFamily>, Status>;
}

/// Destination for synced batches.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn collect(&self, container: MetricsContainer, timeout: Duration) -> Result<(), Status>;
}

/// Runs `fut` under a client-side deadline. Expiry surfaces as
/// `DEADLINE_EXCEEDED`, the same code a server-side deadline would produce.
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Status::deadline_exceeded(format!(
            "no response within {}ms",
            timeout.as_millis()
        ))),
    }
}

pub struct GrpcMetricsSource {
    registry: ServiceRegistry,
}

impl GrpcMetricsSource {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    fn client(&self, service: &str) -> Result<Service303Client<Channel>, Status> {
        let channel = self
            .registry
            .resolve_channel(service, Scope::Local)
            .map_err(|e| Status::unavailable(e.to_string()))?;
        Ok(Service303Client::new(channel))
    }
}

#[async_trait]
impl MetricsSource for GrpcMetricsSource {
    async fn get_metrics(
        &self,
        service: &str,
        timeout: Duration,
    ) -> Result<Vec<MetricFamily>, Status> {
        let mut client = self.client(service)?;
        let mut request = Request::new(Void {});
        request.set_timeout(timeout);
        let container = client.get_metrics(request).await?.into_inner();
        Ok(container.family)
    }
}

pub struct GrpcMetricsSink {
    registry: ServiceRegistry,
}

impl GrpcMetricsSink {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MetricsSink for GrpcMetricsSink {
    async fn collect(&self, container: MetricsContainer, timeout: Duration) -> Result<(), Status> {
        let channel = self
            .registry
            .resolve_channel(CLOUD_METRICS_SERVICE, Scope::Cloud)
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let mut client = MetricsControllerClient::new(channel);
        let mut request = Request::new(container);
        request.set_timeout(timeout);
        client.collect(request).await?;
        Ok(())
    }
}
