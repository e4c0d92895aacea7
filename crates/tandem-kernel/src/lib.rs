//! Tandem kernel - shared contracts for the hybrid inference gateway
//!
//! This crate holds everything the other Tandem crates agree on: the
//! request/response data model, the error taxonomy, the trait seams behind
//! which backends live (model providers, embedding services, the key-value
//! store, the cache tiers), and the typed configuration model.
//!
//! Concrete implementations (HTTP model clients, Redis store, the ensemble
//! engine, the pipeline) live in `tandem-foundation`; the HTTP surface lives
//! in `tandem-gateway`.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{
    EmbeddingProvider, KeyValueStore, ModelBackend, ResponseCache, SemanticResponseCache,
};
pub use types::{
    CachedEntry, InferenceRequest, InferenceResponse, ModelDescriptor, QueryMetrics,
    RoutingDecision, SemanticHit, MODEL_CLOUD_LLM, MODEL_EDGE_SLM,
};
