//! Two-tier response caching.
//!
//! [`ExactCache`] answers repeat queries by fingerprint; [`SemanticCache`]
//! additionally answers paraphrased queries by embedding similarity. Both
//! tiers sit on a [`tandem_kernel::KeyValueStore`], with [`RedisStore`] for
//! production and [`MemoryStore`] for tests and single-node runs.

mod exact;
mod memory_store;
mod redis_store;
mod semantic;
pub mod similarity;

pub use exact::ExactCache;
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use semantic::SemanticCache;
