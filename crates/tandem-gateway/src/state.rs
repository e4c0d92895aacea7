//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use tandem_foundation::InferencePipeline;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The wired request pipeline - the single entry point into the core.
    pub pipeline: Arc<InferencePipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<InferencePipeline>) -> Self {
        Self { pipeline }
    }
}
