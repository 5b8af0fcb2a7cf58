//! Fallback strategy contract and the default strategy

use super::cache::CacheKey;
use crate::config::ServiceType;
use crate::utils::error::{GatewayError, Result};
use serde::Serialize;
use serde_json::{Value, json};

/// Message returned when a service is degraded
pub const DEGRADED_MESSAGE: &str = "Service is currently degraded, please try again later";

/// Available fallback strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FallbackStrategyKind {
    /// Fixed degraded payload
    #[default]
    Default,
    /// Most recent cached response
    Cache,
}

impl FallbackStrategyKind {
    /// Resolve a configured strategy name, `None` when unknown
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(FallbackStrategyKind::Default),
            "cache" => Some(FallbackStrategyKind::Cache),
            _ => None,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategyKind::Default => "default",
            FallbackStrategyKind::Cache => "cache",
        }
    }
}

/// Degraded response handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackResponse {
    /// HTTP-equivalent status code
    pub status: u16,
    /// Response body
    pub body: Value,
    /// Whether the body was served from the response cache
    pub from_cache: bool,
}

/// Produces a degraded response for a failed call
pub trait FallbackStrategy: Send + Sync {
    /// Build the degraded response for `service` after `cause`
    fn fallback(&self, service: ServiceType, cause: &GatewayError) -> Result<FallbackResponse>;

    /// Remember a successful response. Strategies without a cache ignore it.
    fn cache_response(&self, _key: CacheKey, _response: Value) {}

    /// Strategy implemented
    fn kind(&self) -> FallbackStrategyKind;
}

/// Standard 503 degraded body
pub fn degraded_payload(service: ServiceType, cause: &GatewayError, message: &str) -> FallbackResponse {
    FallbackResponse {
        status: 503,
        body: json!({
            "error": {
                "message": message,
                "type": "service_degraded",
                "code": cause.error_code(),
                "service": service.as_str(),
            }
        }),
        from_cache: false,
    }
}

/// Always answers with the fixed degraded payload
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFallbackStrategy;

impl FallbackStrategy for DefaultFallbackStrategy {
    fn fallback(&self, service: ServiceType, cause: &GatewayError) -> Result<FallbackResponse> {
        Ok(degraded_payload(service, cause, DEGRADED_MESSAGE))
    }

    fn kind(&self) -> FallbackStrategyKind {
        FallbackStrategyKind::Default
    }
}
