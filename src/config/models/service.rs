//! Logical services and their per-service configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical category of AI capability, routed independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceType {
    /// Chat completions
    Chat,
    /// Embeddings
    Embedding,
    /// Reranking
    Rerank,
    /// Text to speech
    Tts,
    /// Speech to text
    Stt,
    /// Image generation
    #[serde(alias = "img-gen", alias = "img_gen")]
    ImgGen,
    /// Image editing
    #[serde(alias = "img-edit", alias = "img_edit")]
    ImgEdit,
}

impl ServiceType {
    /// Every service type, in declaration order
    pub const ALL: [ServiceType; 7] = [
        ServiceType::Chat,
        ServiceType::Embedding,
        ServiceType::Rerank,
        ServiceType::Tts,
        ServiceType::Stt,
        ServiceType::ImgGen,
        ServiceType::ImgEdit,
    ];

    /// Configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Chat => "chat",
            ServiceType::Embedding => "embedding",
            ServiceType::Rerank => "rerank",
            ServiceType::Tts => "tts",
            ServiceType::Stt => "stt",
            ServiceType::ImgGen => "imgGen",
            ServiceType::ImgEdit => "imgEdit",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "chat" => Ok(ServiceType::Chat),
            "embedding" => Ok(ServiceType::Embedding),
            "rerank" => Ok(ServiceType::Rerank),
            "tts" => Ok(ServiceType::Tts),
            "stt" => Ok(ServiceType::Stt),
            "imggen" => Ok(ServiceType::ImgGen),
            "imgedit" => Ok(ServiceType::ImgEdit),
            _ => Err(format!("Unknown service type: {}", s)),
        }
    }
}

/// Configuration of one logical service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Backend instances
    #[serde(default)]
    pub instances: Vec<ModelInstance>,
    /// Load balancing override
    #[serde(default, alias = "loadBalance", skip_serializing_if = "Option::is_none")]
    pub load_balance: Option<LoadBalanceConfig>,
    /// Rate limiting override
    #[serde(default, alias = "rateLimit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
    /// Fallback override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackConfig>,
}

impl ServiceConfig {
    /// Service with the given instances and no overrides
    pub fn with_instances(instances: Vec<ModelInstance>) -> Self {
        Self {
            instances,
            ..Self::default()
        }
    }
}
