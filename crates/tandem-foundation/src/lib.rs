//! Tandem foundation - the request-processing core.
//!
//! This crate implements the pipeline the gateway exposes over HTTP:
//!
//! 1. Semantic near-match lookup ([`cache::SemanticCache`]), when enabled.
//! 2. Exact fingerprint lookup ([`cache::ExactCache`]).
//! 3. Query analysis and the LLM-vs-SLM decision ([`routing`]).
//! 4. Inference through either the cloud model client ([`model`]) or the
//!    SLM ensemble engine ([`ensemble`]).
//! 5. Write-back to the active cache tier.
//!
//! [`pipeline::InferencePipeline`] wires the steps together; everything
//! upstream of it is reached through the `tandem-kernel` trait seams.

pub mod cache;
pub mod ensemble;
pub mod model;
pub mod pipeline;
pub mod routing;
pub mod testing;

pub use ensemble::{Aggregation, SlmEngine, Strategy};
pub use pipeline::{InferencePipeline, PipelineError};
pub use routing::QueryRouter;
