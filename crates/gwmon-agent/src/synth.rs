//! Derived series computed by the agent itself from collection outcomes.

use chrono::{DateTime, Utc};
use gwmon_common::proto::{MetricFamily, MetricName};

/// Label attached to every sample collected from, or derived for, a service.
pub const SERVICE_LABEL: &str = "service";

/// The start-time family could not be turned into an uptime.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedStartTime {
    #[error("start time family has no samples")]
    NoSamples,
    #[error("start time sample has no gauge value")]
    NoGauge,
    #[error("start time value {0} is not a valid epoch")]
    InvalidValue(f64),
}

/// `service_metrics_collected{service}`: 1 after a successful collection,
/// 0 after a failed one.
pub fn collection_outcome(service: &str, succeeded: bool, now: DateTime<Utc>) -> MetricFamily {
    MetricFamily::single_gauge(
        MetricName::ServiceMetricsCollected.as_str_name(),
        if succeeded { 1.0 } else { 0.0 },
        now.timestamp_millis(),
        &[(SERVICE_LABEL, service)],
    )
}

/// `process_uptime_seconds{service}` from a validated start time: whole UTC
/// seconds at `now` minus the start time.
pub fn uptime(service: &str, start_time_secs: f64, now: DateTime<Utc>) -> MetricFamily {
    MetricFamily::single_gauge(
        MetricName::ProcessUptimeSeconds.as_str_name(),
        now.timestamp() as f64 - start_time_secs,
        now.timestamp_millis(),
        &[(SERVICE_LABEL, service)],
    )
}

pub fn is_start_time_family(family: &MetricFamily) -> bool {
    MetricName::ProcessStartTimeSeconds.matches(&family.name)
}

/// Reads the start time from the first sample of a start-time family.
pub fn start_time_seconds(family: &MetricFamily) -> Result<f64, MalformedStartTime> {
    let first = family.metric.first().ok_or(MalformedStartTime::NoSamples)?;
    let value = first.gauge_value().ok_or(MalformedStartTime::NoGauge)?;
    if !value.is_finite() || value == 0.0 {
        return Err(MalformedStartTime::InvalidValue(value));
    }
    Ok(value)
}
