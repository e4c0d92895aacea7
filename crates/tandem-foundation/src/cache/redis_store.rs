//! Redis-backed key-value store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use tandem_kernel::{Error, KeyValueStore, Result};

/// [`KeyValueStore`] over a Redis connection manager.
///
/// The manager multiplexes one connection and reconnects on failure;
/// cloning it is cheap, so the store is shared freely across tasks.
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (`redis://[:password@]host:port[/db]`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(store_error)?;
        Ok(Self { manager })
    }
}

fn store_error(err: redis::RedisError) -> Error {
    Error::Store(err.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(store_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(store_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await.map_err(store_error)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        conn.keys(format!("{prefix}*")).await.map_err(store_error)
    }
}
