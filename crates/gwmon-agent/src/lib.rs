//! Gateway-resident telemetry agent.
//!
//! Polls local services for metric snapshots over gRPC, buffers them, and
//! periodically syncs the batch to the cloud metrics controller. Failed
//! syncs keep a bounded tail of the batch for the next attempt; collection
//! outcomes and process uptime are reported as derived gauges.

pub mod buffer;
pub mod collector;
pub mod config;
pub mod error;
pub mod registry;
pub mod rpc;
pub mod synth;
pub mod task;
