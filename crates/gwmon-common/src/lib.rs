//! Shared wire schemas and primitives for the gwmon gateway agent.
//!
//! The protobuf messages follow the Prometheus client data model
//! ([`proto::MetricFamily`], [`proto::Metric`], [`proto::LabelPair`]) and are
//! exchanged with local services (`Service303`) and the cloud metrics
//! controller (`MetricsController`).

pub mod id;
pub mod types;

pub mod proto {
    #![allow(clippy::pedantic)]
    #![allow(clippy::missing_errors_doc)]
    #![allow(clippy::doc_markdown)]
    #![allow(clippy::default_trait_access)]
    tonic::include_proto!("gwmon");
}
