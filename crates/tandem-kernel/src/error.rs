//! Gateway error taxonomy.
//!
//! One [`Error`] enum covers the whole request path. The variants mirror how
//! failures propagate through the pipeline: read-side store errors degrade to
//! cache misses, write-side store errors are logged, upstream failures abort
//! the request, and cancellation produces neither a response nor a cache
//! write.

use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the Tandem gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller sent a malformed or incomplete request. Surfaced as 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A model provider or embedding service failed. Fatal to the current
    /// inference; always carries the model name that produced it.
    #[error("upstream '{model}' failed: {message}")]
    Upstream { model: String, message: String },

    /// Cache store I/O failure. Treated as a miss on reads, logged on writes.
    #[error("store error: {0}")]
    Store(String),

    /// No ensemble member produced a usable response. The message joins the
    /// per-model failure details.
    #[error("all models failed to generate responses: {0}")]
    AllModelsFailed(String),

    /// The caller cancelled the request, or the engine was closed before the
    /// request was admitted.
    #[error("request cancelled")]
    Cancelled,

    /// A backend was asked for a capability it does not implement.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid or missing configuration, detected at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure inside the pipeline or cache layer.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::Upstream`] with the offending model attached.
    pub fn upstream(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Upstream {
            model: model.into(),
            message: message.to_string(),
        }
    }

    /// True for read-side failures the pipeline absorbs as cache misses.
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}
