//! Tandem gateway - HTTP surface of the hybrid inference service.
//!
//! # Endpoints
//!
//! | Method | Path            | Description                               |
//! |--------|-----------------|-------------------------------------------|
//! | `POST` | `/v1/inference` | Run one query through the pipeline        |
//! | `GET`  | `/v1/health`    | Liveness probe                            |
//!
//! # Example
//!
//! ```rust,no_run
//! use tandem_gateway::server::GatewayServer;
//! use tandem_kernel::config::GatewayConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GatewayConfig::load(None).unwrap();
//!     let server = GatewayServer::from_config(&config).await.unwrap();
//!     server.start().await.unwrap();
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::GatewayServer;
pub use state::AppState;
