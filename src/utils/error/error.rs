//! Error types used throughout the router

use thiserror::Error;

/// Result type alias for the router
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the router
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The candidate list for a selection was empty
    #[error("No instances available: {0}")]
    NoInstancesAvailable(String),

    /// Instances exist but none passed the health filter
    #[error("No healthy instances: {0}")]
    NoHealthyInstances(String),

    /// Every remaining instance is guarded by an open circuit breaker
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// A reconfiguration was rejected and the previous state retained
    #[error("Reconfiguration failed: {0}")]
    Reconfiguration(String),

    /// Health check errors
    #[error("Health check error: {0}")]
    HealthCheck(String),

    /// Fallback strategy errors
    #[error("Fallback error: {0}")]
    Fallback(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether the error means the routing pipeline could not pick an instance
    pub fn is_routing_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::NoInstancesAvailable(_)
                | GatewayError::NoHealthyInstances(_)
                | GatewayError::CircuitOpen(_)
                | GatewayError::RateLimited(_)
        )
    }

    /// HTTP-equivalent status code for degraded responses
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RateLimited(_) => 429,
            GatewayError::NoInstancesAvailable(_)
            | GatewayError::NoHealthyInstances(_)
            | GatewayError::CircuitOpen(_) => 503,
            _ => 500,
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::NoInstancesAvailable(_) => "NO_INSTANCES_AVAILABLE",
            GatewayError::NoHealthyInstances(_) => "NO_HEALTHY_INSTANCES",
            GatewayError::CircuitOpen(_) => "CIRCUIT_OPEN",
            GatewayError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            GatewayError::Reconfiguration(_) => "RECONFIGURATION_FAILED",
            GatewayError::HealthCheck(_) => "HEALTH_CHECK_ERROR",
            GatewayError::Fallback(_) => "FALLBACK_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::Yaml(_) => "YAML_ERROR",
            GatewayError::Serialization(_) => "SERIALIZATION_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
