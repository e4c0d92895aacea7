//! Typed configuration model and loading.
//!
//! Configuration is read from an optional YAML/TOML file plus environment
//! overrides. Strategy and aggregation names stay plain strings here; they
//! are parsed into tagged variants at the ensemble-engine boundary, which is
//! the only place that interprets them.
//!
//! # Environment variables
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `TANDEM_CONFIG` | Path of the configuration file. |
//! | `LLM_API_KEY` | `llm.credential` |
//! | `SLM_API_KEY` | `credential` of every `slm.models` entry |
//! | `EMBEDDING_API_KEY` | `semantic_cache.credential` |
//! | `REDIS_URL` | `redis.url` |

use std::time::Duration;

use config::{Config as Loader, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ModelDescriptor;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub semantic_cache: SemanticCacheConfig,
    pub llm: LlmConfig,
    pub slm: SlmConfig,
    pub router: RouterConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whether to allow cross-origin requests from any origin.
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Key-value store selection. When `url` is absent the gateway runs on the
/// in-process memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

/// Cache retention settings, shared by both tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live of cache entries, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Semantic cache tier and its embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticCacheConfig {
    pub enabled: bool,
    /// Minimum cosine similarity for a near-match to count as a hit.
    pub similarity_threshold: f32,
    /// Base URL of an OpenAI-compatible embeddings API.
    pub endpoint: String,
    pub credential: String,
    /// Embedding model identifier.
    pub model: String,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            similarity_threshold: 0.85,
            endpoint: "https://api.openai.com/v1".to_string(),
            credential: String::new(),
            model: "text-embedding-ada-002".to_string(),
        }
    }
}

/// The cloud LLM path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub name: String,
    pub endpoint: String,
    pub credential: String,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            credential: String::new(),
            max_tokens: 1024,
        }
    }
}

impl LlmConfig {
    /// The LLM as a model descriptor (weight is irrelevant on this path).
    pub fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            name: self.name.clone(),
            endpoint: self.endpoint.clone(),
            credential: self.credential.clone(),
            weight: 1.0,
        }
    }
}

/// The SLM ensemble path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlmConfig {
    /// Ensemble members in dispatch order.
    pub models: Vec<ModelDescriptor>,
    /// `"parallel"`, `"series"`, or `"hybrid"`. Anything else (or absent)
    /// degrades to single-model inference on the first member.
    pub strategy: Option<String>,
    /// `"weighted"`, `"longest"`, or `"voting"`; unknown values fall back
    /// to weighted.
    pub aggregation_fn: String,
    /// Capacity of the engine admission gate.
    pub max_concurrent: usize,
    pub max_tokens: u32,
}

impl Default for SlmConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            strategy: None,
            aggregation_fn: "weighted".to_string(),
            max_concurrent: 4,
            max_tokens: 512,
        }
    }
}

/// Routing policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Complexity score above which a query goes to the LLM.
    pub complexity_threshold: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: 0.65,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `path` (or `$TANDEM_CONFIG`, or `./config.*`
    /// if present), apply environment overrides, and validate.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Loader::builder();

        let explicit = path
            .map(str::to_string)
            .or_else(|| std::env::var("TANDEM_CONFIG").ok());
        builder = match explicit {
            Some(p) => builder.add_source(File::with_name(&p)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // TANDEM_SLM__MAX_CONCURRENT=8 style overrides for scalar options.
        builder = builder.add_source(Environment::with_prefix("TANDEM").separator("__"));

        let loaded = builder
            .build()
            .map_err(|e| Error::Config(e.to_string()))?
            .try_deserialize::<GatewayConfig>()
            .map_err(|e| Error::Config(e.to_string()))?;

        let mut cfg = loaded;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply the credential/URL environment variables documented in the
    /// module header.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            if !key.is_empty() {
                self.llm.credential = key;
            }
        }
        if let Ok(key) = std::env::var("SLM_API_KEY") {
            if !key.is_empty() {
                for model in &mut self.slm.models {
                    model.credential = key.clone();
                }
            }
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            if !key.is_empty() {
                self.semantic_cache.credential = key;
            }
        }
        // The embedding service shares the LLM credential unless given its own.
        if self.semantic_cache.credential.is_empty() {
            self.semantic_cache.credential = self.llm.credential.clone();
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.is_empty() {
                self.redis.url = Some(url);
            }
        }
    }

    /// Startup validation: the LLM path must be fully configured and the
    /// ensemble must have at least one member.
    pub fn validate(&self) -> Result<()> {
        self.llm.descriptor().validate()?;
        if self.slm.models.is_empty() {
            return Err(Error::Config(
                "no models configured under slm.models".to_string(),
            ));
        }
        for model in &self.slm.models {
            model.validate()?;
        }
        if self.slm.max_concurrent == 0 {
            return Err(Error::Config(
                "slm.max_concurrent must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
