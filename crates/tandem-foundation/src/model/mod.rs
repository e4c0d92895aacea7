//! HTTP clients for upstream model and embedding providers.

mod completion;
mod embedding;

pub use completion::CompletionClient;
pub use embedding::EmbeddingClient;
