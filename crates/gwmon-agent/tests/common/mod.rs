#![allow(dead_code)]

use async_trait::async_trait;
use gwmon_agent::collector::{CollectorSettings, MetricsCollector};
use gwmon_agent::rpc::{MetricsSink, MetricsSource};
use gwmon_common::id::StaticIdentity;
use gwmon_common::proto::{Gauge, Metric, MetricFamily, MetricsContainer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tonic::{Code, Status};

pub const GATEWAY_ID: &str = "gw-test";

#[derive(Clone)]
pub enum Behavior {
    /// Returns one gauge family named `<prefix><call index>`.
    Numbered(&'static str),
    Families(Vec<MetricFamily>),
    Fail(Code),
    Hang,
}

pub struct FakeSource {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<(String, Instant)>>,
    start: Instant,
}

impl FakeSource {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Arc<Self> {
        Arc::new(Self {
            behaviors: behaviors
                .iter()
                .map(|(name, b)| (name.to_string(), b.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
            start: Instant::now(),
        })
    }

    /// Seconds since creation at which `service` was called.
    pub fn call_times(&self, service: &str) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == service)
            .map(|(_, at)| (*at - self.start).as_secs())
            .collect()
    }
}

#[async_trait]
impl MetricsSource for FakeSource {
    async fn get_metrics(
        &self,
        service: &str,
        _timeout: Duration,
    ) -> Result<Vec<MetricFamily>, Status> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((service.to_string(), Instant::now()));
            calls.iter().filter(|(name, _)| name == service).count() - 1
        };
        match self.behaviors.get(service).cloned() {
            Some(Behavior::Numbered(prefix)) => {
                Ok(vec![gauge_family(&format!("{prefix}{index}"), 1.0)])
            }
            Some(Behavior::Families(families)) => Ok(families),
            Some(Behavior::Fail(code)) => Err(Status::new(code, "injected failure")),
            Some(Behavior::Hang) => std::future::pending().await,
            None => Err(Status::unavailable(format!("unknown service {service}"))),
        }
    }
}

pub struct RecordingSink {
    sent: Mutex<Vec<(u64, MetricsContainer)>>,
    failures_left: Mutex<usize>,
    delays: Vec<Duration>,
    start: Instant,
}

impl RecordingSink {
    pub fn new(failures: usize, delay: Duration) -> Arc<Self> {
        Self::with_delays(failures, &[delay])
    }

    /// Call `n` takes `delays[n]`; later calls reuse the last delay.
    /// Failures are handed out in completion order.
    pub fn with_delays(failures: usize, delays: &[Duration]) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(failures),
            delays: delays.to_vec(),
            start: Instant::now(),
        })
    }

    pub fn sent(&self) -> Vec<MetricsContainer> {
        self.sent.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<u64> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn collect(&self, container: MetricsContainer, _timeout: Duration) -> Result<(), Status> {
        let at = (Instant::now() - self.start).as_secs();
        let delay = {
            let mut sent = self.sent.lock().unwrap();
            let delay = self
                .delays
                .get(sent.len())
                .or(self.delays.last())
                .copied()
                .unwrap_or_default();
            sent.push((at, container));
            delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(Status::unavailable("controller unreachable"));
        }
        Ok(())
    }
}

pub fn gauge_family(name: &str, value: f64) -> MetricFamily {
    MetricFamily {
        name: name.to_string(),
        metric: vec![Metric {
            gauge: Some(Gauge { value }),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn settings(collect: u64, sync: u64, timeout: u64, queue_length: usize) -> CollectorSettings {
    CollectorSettings {
        collect_interval: Duration::from_secs(collect),
        sync_interval: Duration::from_secs(sync),
        rpc_timeout: Duration::from_secs(timeout),
        queue_length,
    }
}

pub fn spawn_collector(
    settings: CollectorSettings,
    services: &[&str],
    source: Arc<FakeSource>,
    sink: Arc<RecordingSink>,
) {
    let collector = MetricsCollector::new(
        settings,
        services.iter().map(|s| s.to_string()).collect(),
        source,
        sink,
        Arc::new(StaticIdentity(GATEWAY_ID.to_string())),
    );
    tokio::spawn(collector.run());
}

pub fn service_of(family: &MetricFamily) -> Option<&str> {
    family.metric.first().and_then(|m| m.label_value("service"))
}

pub fn outcome(family: &MetricFamily) -> Option<f64> {
    (family.name == "service_metrics_collected")
        .then(|| family.metric[0].gauge_value())
        .flatten()
}
