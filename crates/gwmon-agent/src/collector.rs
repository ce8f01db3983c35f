//! The collection and sync engine.
//!
//! A single control loop owns the [`SampleBuffer`] and drains an event queue.
//! Timers and RPC completions run on spawned tasks and only ever post events
//! back to the queue, so buffer mutation never leaves the control loop.
//!
//! Every periodic task reschedules itself as soon as it has dispatched its
//! RPC, whether or not the previous call has completed. With
//! `collect_interval < rpc_timeout` several calls to the same service can be
//! outstanding at once.

use crate::buffer::SampleBuffer;
use crate::rpc::{with_deadline, MetricsSink, MetricsSource};
use crate::synth::{self, SERVICE_LABEL};
use crate::task::{PeriodicTask, TaskKind};
use chrono::{DateTime, Utc};
use gwmon_common::id::GatewayIdentity;
use gwmon_common::proto::{MetricFamily, MetricsContainer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tonic::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSettings {
    pub collect_interval: Duration,
    pub sync_interval: Duration,
    pub rpc_timeout: Duration,
    /// Retry queue capacity.
    pub queue_length: usize,
}

#[derive(Debug)]
pub enum Event {
    /// Collection tick for one service.
    Collect(String),
    CollectDone {
        service: String,
        result: Result<Vec<MetricFamily>, Status>,
    },
    /// Cloud sync tick.
    Sync,
    SyncDone {
        pending: PendingSync,
        result: Result<(), Status>,
    },
}

/// Bookkeeping for a sync in flight: the batch size and the copy of its
/// newest entries that a failure installs as the retry queue.
#[derive(Debug)]
pub struct PendingSync {
    sent: usize,
    tail: Vec<MetricFamily>,
}

impl PendingSync {
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn tail(&self) -> &[MetricFamily] {
        &self.tail
    }
}

/// Buffer-side handling of collection and sync outcomes.
pub struct CollectorState {
    buffer: SampleBuffer,
    clock: fn() -> DateTime<Utc>,
}

impl CollectorState {
    pub fn new(queue_length: usize) -> Self {
        Self::with_clock(queue_length, Utc::now)
    }

    pub fn with_clock(queue_length: usize, clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            buffer: SampleBuffer::new(queue_length),
            clock,
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Appends the outcome of one collection pass for `service`.
    ///
    /// On success every returned family is labeled with the service, an
    /// uptime family follows a well-formed start-time family, and a success
    /// gauge closes the pass. On failure only the failure gauge is appended.
    pub fn record_collection(&mut self, service: &str, result: Result<Vec<MetricFamily>, Status>) {
        let now = (self.clock)();
        let families = match result {
            Ok(families) => families,
            Err(status) => {
                tracing::warn!(
                    service,
                    code = ?status.code(),
                    details = status.message(),
                    "Collect error"
                );
                self.buffer
                    .push(synth::collection_outcome(service, false, now));
                return;
            }
        };

        tracing::debug!(service, count = families.len(), "Collected metrics");
        for mut family in families {
            family.label_all(SERVICE_LABEL, service);
            let uptime = if synth::is_start_time_family(&family) {
                match synth::start_time_seconds(&family) {
                    Ok(start) => Some(synth::uptime(service, start, now)),
                    Err(e) => {
                        tracing::error!(
                            service,
                            family = %family.name,
                            error = %e,
                            "Could not parse start time metric"
                        );
                        None
                    }
                }
            } else {
                None
            };
            self.buffer.push(family);
            if let Some(uptime) = uptime {
                self.buffer.push(uptime);
            }
        }
        self.buffer
            .push(synth::collection_outcome(service, true, now));
    }

    /// Takes the outbound batch, or `None` if nothing new was collected.
    ///
    /// Only the entries that fit the retry queue are copied; the batch itself
    /// moves into the send.
    pub fn begin_sync(&mut self) -> Option<(Vec<MetricFamily>, PendingSync)> {
        let batch = self.buffer.rotate()?;
        let pending = PendingSync {
            sent: batch.len(),
            tail: self.buffer.retry_tail(&batch),
        };
        Some((batch, pending))
    }

    pub fn record_sync(&mut self, pending: PendingSync, result: Result<(), Status>) {
        match result {
            Ok(()) => tracing::debug!(count = pending.sent, "Metrics synced"),
            Err(status) => {
                let sent = pending.sent;
                self.buffer.restore_failed(pending.tail);
                let retained = self.buffer.retry_queue().len();
                tracing::error!(
                    code = ?status.code(),
                    details = status.message(),
                    sent,
                    retained,
                    dropped = sent - retained,
                    "Metrics upload error"
                );
            }
        }
    }
}

/// Polls local services and syncs the accumulated samples to the cloud.
pub struct MetricsCollector {
    settings: CollectorSettings,
    services: Vec<String>,
    source: Arc<dyn MetricsSource>,
    sink: Arc<dyn MetricsSink>,
    identity: Arc<dyn GatewayIdentity>,
    state: CollectorState,
    tasks: HashMap<TaskKind, PeriodicTask>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl MetricsCollector {
    pub fn new(
        settings: CollectorSettings,
        services: Vec<String>,
        source: Arc<dyn MetricsSource>,
        sink: Arc<dyn MetricsSink>,
        identity: Arc<dyn GatewayIdentity>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: CollectorState::new(settings.queue_length),
            settings,
            services,
            source,
            sink,
            identity,
            tasks: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Starts every collection task immediately and the sync task after one
    /// sync interval, then drives the control loop forever.
    pub async fn run(mut self) {
        tracing::info!(
            services = ?self.services,
            collect_interval_secs = self.settings.collect_interval.as_secs(),
            sync_interval_secs = self.settings.sync_interval.as_secs(),
            queue_length = self.settings.queue_length,
            "Starting collector"
        );

        self.schedule_after(self.settings.sync_interval, Event::Sync);
        for service in &self.services {
            // The loop holds its own sender, so the queue never closes.
            let _ = self.tx.send(Event::Collect(service.clone()));
        }

        while let Some(event) = self.rx.recv().await {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Collect(service) => self.collect(service),
            Event::CollectDone { service, result } => {
                self.state.record_collection(&service, result);
            }
            Event::Sync => self.sync(),
            Event::SyncDone { pending, result } => self.state.record_sync(pending, result),
        }
    }

    fn collect(&mut self, service: String) {
        let kind = TaskKind::Collect(service.clone());
        self.start_task(&kind);

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let timeout = self.settings.rpc_timeout;
        let name = service.clone();
        tokio::spawn(async move {
            let result = with_deadline(timeout, source.get_metrics(&name, timeout)).await;
            let _ = tx.send(Event::CollectDone {
                service: name,
                result,
            });
        });

        self.reschedule(&kind, Event::Collect(service));
    }

    fn sync(&mut self) {
        self.start_task(&TaskKind::Sync);

        if let Some((batch, pending)) = self.state.begin_sync() {
            let container = MetricsContainer {
                gateway_id: self.identity.current_identifier(),
                family: batch,
            };
            tracing::debug!(
                gateway_id = %container.gateway_id,
                count = container.family.len(),
                "Syncing metrics"
            );

            let sink = Arc::clone(&self.sink);
            let tx = self.tx.clone();
            let timeout = self.settings.rpc_timeout;
            tokio::spawn(async move {
                let result = with_deadline(timeout, sink.collect(container, timeout)).await;
                let _ = tx.send(Event::SyncDone { pending, result });
            });
        }

        self.reschedule(&TaskKind::Sync, Event::Sync);
    }

    fn task_mut(&mut self, kind: &TaskKind) -> &mut PeriodicTask {
        let interval = match kind {
            TaskKind::Collect(_) => self.settings.collect_interval,
            TaskKind::Sync => self.settings.sync_interval,
        };
        self.tasks
            .entry(kind.clone())
            .or_insert_with(|| PeriodicTask::new(kind.clone(), interval))
    }

    fn start_task(&mut self, kind: &TaskKind) {
        if let Err(e) = self.task_mut(kind).start() {
            tracing::warn!(error = %e, "Task started out of phase");
        }
    }

    /// Always arms the next run, even if the task was out of phase.
    fn reschedule(&mut self, kind: &TaskKind, next: Event) {
        let task = self.task_mut(kind);
        let delay = match task.finish().and_then(|()| task.rearm()) {
            Ok(delay) => delay,
            Err(e) => {
                tracing::warn!(error = %e, "Task rescheduled out of phase");
                task.interval()
            }
        };
        self.schedule_after(delay, next);
    }

    fn schedule_after(&self, delay: Duration, event: Event) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }
}
