use gwmon_common::proto::MetricFamily;

/// Families gathered since the last sync, plus the retained tail of the last
/// failed sync.
///
/// The current buffer is unbounded; the retry queue never holds more than
/// `retry_capacity` families once a sync attempt has resolved.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    current: Vec<MetricFamily>,
    retry: Vec<MetricFamily>,
    retry_capacity: usize,
}

impl SampleBuffer {
    pub fn new(retry_capacity: usize) -> Self {
        Self {
            current: Vec::new(),
            retry: Vec::new(),
            retry_capacity,
        }
    }

    pub fn push(&mut self, family: MetricFamily) {
        self.current.push(family);
    }

    /// Swaps out the outbound batch: retry entries first, then the current
    /// buffer. Both are left empty.
    ///
    /// Returns `None` without touching the retry queue when nothing was
    /// collected since the last rotation.
    pub fn rotate(&mut self) -> Option<Vec<MetricFamily>> {
        if self.current.is_empty() {
            return None;
        }
        let mut batch = std::mem::take(&mut self.retry);
        batch.append(&mut self.current);
        Some(batch)
    }

    /// Installs the newest `retry_capacity` entries of a failed batch as the
    /// retry queue, preserving their order. Returns how many were dropped.
    pub fn restore_failed(&mut self, mut batch: Vec<MetricFamily>) -> usize {
        let dropped = batch.len().saturating_sub(self.retry_capacity);
        batch.drain(..dropped);
        self.retry = batch;
        dropped
    }

    /// Copies the entries of `batch` that `restore_failed` would keep.
    pub fn retry_tail(&self, batch: &[MetricFamily]) -> Vec<MetricFamily> {
        batch[batch.len().saturating_sub(self.retry_capacity)..].to_vec()
    }

    pub fn current(&self) -> &[MetricFamily] {
        &self.current
    }

    pub fn retry_queue(&self) -> &[MetricFamily] {
        &self.retry
    }

    pub fn retry_capacity(&self) -> usize {
        self.retry_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
