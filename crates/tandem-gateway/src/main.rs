//! Tandem gateway - entry point.
//!
//! Reads configuration from an optional file (first CLI argument, or
//! `$TANDEM_CONFIG`, or `./config.*`) plus environment overrides, then
//! starts the axum-based HTTP service.
//!
//! # Environment variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `TANDEM_CONFIG` | Path of the configuration file. |
//! | `LLM_API_KEY` | Credential for the cloud LLM. |
//! | `SLM_API_KEY` | Credential applied to every SLM ensemble member. |
//! | `EMBEDDING_API_KEY` | Credential for the embedding service. |
//! | `REDIS_URL` | Cache store address; in-process store when unset. |
//! | `RUST_LOG` | Tracing filter, e.g. `tandem_gateway=debug`. |

use tandem_gateway::GatewayServer;
use tandem_kernel::config::GatewayConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tandem_gateway=info,tandem_foundation=info")),
        )
        .init();

    let config_path = std::env::args().nth(1);
    let config = match GatewayConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    info!(
        port = config.server.port,
        complexity_threshold = config.router.complexity_threshold,
        semantic_cache = config.semantic_cache.enabled,
        "tandem gateway configuration loaded"
    );

    let server = match GatewayServer::from_config(&config).await {
        Ok(server) => server,
        Err(err) => {
            eprintln!("startup error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = server.start().await {
        eprintln!("gateway error: {err}");
        std::process::exit(1);
    }
}
