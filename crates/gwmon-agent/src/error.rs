/// Errors raised while wiring the agent's collaborators.
///
/// RPC failures are not represented here: they travel as [`tonic::Status`]
/// values and are absorbed by the collector.
///
/// # Examples
///
/// ```rust
/// use gwmon_agent::error::AgentError;
///
/// let err = AgentError::UnknownService("mme".to_string());
/// assert!(err.to_string().contains("mme"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// No address is registered for the requested service.
    #[error("Registry: unknown service '{0}'")]
    UnknownService(String),

    /// A registered address could not be turned into a gRPC endpoint.
    #[error("Registry: invalid endpoint '{endpoint}' for service '{service}': {source}")]
    InvalidEndpoint {
        service: String,
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// Configuration is missing a required field or contains an invalid value.
    #[error("Config: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, AgentError>;
