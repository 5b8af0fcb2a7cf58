//! Rate limiting types

use crate::config::ServiceType;
use std::fmt;

/// Rate limiting algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateLimitAlgorithm {
    /// Token bucket
    #[default]
    TokenBucket,
    /// Leaky bucket
    LeakyBucket,
    /// Sliding window over the last second
    SlidingWindow,
    /// Token bucket with a linear warm-up
    WarmUp,
}

impl RateLimitAlgorithm {
    /// Resolve a configured algorithm name, `None` when unknown
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "token-bucket" | "tokenbucket" => Some(RateLimitAlgorithm::TokenBucket),
            "leaky-bucket" | "leakybucket" => Some(RateLimitAlgorithm::LeakyBucket),
            "sliding-window" | "slidingwindow" => Some(RateLimitAlgorithm::SlidingWindow),
            "warm-up" | "warmup" => Some(RateLimitAlgorithm::WarmUp),
            _ => None,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitAlgorithm::TokenBucket => "token-bucket",
            RateLimitAlgorithm::LeakyBucket => "leaky-bucket",
            RateLimitAlgorithm::SlidingWindow => "sliding-window",
            RateLimitAlgorithm::WarmUp => "warm-up",
        }
    }
}

impl fmt::Display for RateLimitAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who shares a limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateLimitScope {
    /// One limiter for every caller of the service or instance
    #[default]
    Global,
    /// One limiter per client IP
    PerClientIp,
}

impl RateLimitScope {
    /// Resolve a configured scope name, `None` when unknown
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "global" | "service" | "instance" => Some(RateLimitScope::Global),
            "client-ip" | "per-client-ip" => Some(RateLimitScope::PerClientIp),
            _ => None,
        }
    }
}

/// A single acquisition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitContext {
    /// Permits requested, at least 1
    pub tokens: u64,
    /// Client identity for per-IP scoping
    pub client_ip: Option<String>,
    /// Service being called
    pub service_type: Option<ServiceType>,
}

impl RateLimitContext {
    /// Request `tokens` permits; zero is raised to one
    pub fn new(tokens: u64) -> Self {
        Self {
            tokens: tokens.max(1),
            client_ip: None,
            service_type: None,
        }
    }

    /// Attach the client IP
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    /// Attach the service type
    pub fn with_service(mut self, service: ServiceType) -> Self {
        self.service_type = Some(service);
        self
    }

    /// Permits requested, never below 1
    pub fn permits(&self) -> u64 {
        self.tokens.max(1)
    }
}

impl Default for RateLimitContext {
    fn default() -> Self {
        Self::new(1)
    }
}
