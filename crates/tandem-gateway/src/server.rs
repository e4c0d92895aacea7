//! Server bootstrap: component wiring, router assembly, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tandem_foundation::cache::{ExactCache, MemoryStore, RedisStore, SemanticCache};
use tandem_foundation::ensemble::SlmEngine;
use tandem_foundation::model::{CompletionClient, EmbeddingClient};
use tandem_foundation::routing::QueryRouter;
use tandem_foundation::InferencePipeline;
use tandem_kernel::config::GatewayConfig;
use tandem_kernel::{KeyValueStore, Result};

use crate::handlers::{health_router, inference_router};
use crate::state::AppState;

/// The HTTP server and its wired pipeline.
pub struct GatewayServer {
    host: String,
    port: u16,
    enable_cors: bool,
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Wire every component from configuration: store, caches, model
    /// clients, ensemble engine, router, pipeline.
    pub async fn from_config(config: &GatewayConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.redis.url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                info!("connected to Redis cache store");
                Arc::new(store)
            }
            None => {
                info!("no redis.url configured, using in-process cache store");
                Arc::new(MemoryStore::new())
            }
        };

        let router = QueryRouter::new(&config.router);

        let llm = Arc::new(CompletionClient::new(&config.llm.descriptor())?);
        info!(model = %config.llm.name, "LLM client ready");

        let slm = Arc::new(SlmEngine::from_config(&config.slm)?);
        info!(
            models = config.slm.models.len(),
            strategy = config.slm.strategy.as_deref().unwrap_or("single-model"),
            aggregation = %config.slm.aggregation_fn,
            "SLM engine ready"
        );

        let exact = Arc::new(ExactCache::new(store.clone(), config.cache.ttl()));

        let mut pipeline =
            InferencePipeline::new(router, llm, config.llm.max_tokens, slm, exact);

        if config.semantic_cache.enabled {
            match EmbeddingClient::new(&config.semantic_cache) {
                Ok(embedder) => {
                    let semantic = Arc::new(SemanticCache::new(
                        store,
                        Arc::new(embedder),
                        config.cache.ttl(),
                    ));
                    pipeline = pipeline.with_semantic_cache(
                        semantic,
                        config.semantic_cache.similarity_threshold,
                    );
                    info!(
                        threshold = config.semantic_cache.similarity_threshold,
                        "semantic cache enabled"
                    );
                }
                Err(err) => {
                    warn!(error = %err, "semantic cache unavailable, using exact cache only");
                }
            }
        }

        Ok(Self {
            host: config.server.host.clone(),
            port: config.server.port,
            enable_cors: config.server.enable_cors,
            state: Arc::new(AppState::new(Arc::new(pipeline))),
        })
    }

    /// Server around an already-wired pipeline, for tests.
    pub fn new(host: impl Into<String>, port: u16, state: Arc<AppState>) -> Self {
        Self {
            host: host.into(),
            port,
            enable_cors: true,
            state,
        }
    }

    /// Build the axum `Router` without starting the server.
    ///
    /// Useful for integration tests that drive the routes through
    /// `tower::ServiceExt` instead of a listener.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .merge(health_router())
            .merge(inference_router())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }

    /// Start the server and block until a shutdown signal arrives.
    pub async fn start(self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.socket_addr();
        info!("tandem gateway listening on http://{}", addr);

        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("tandem gateway stopped");
        Ok(())
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
