//! Mining economy daemon library
//!
//! Serves the economy engine over HTTP.
//!
//! # Architecture
//!
//! ```text
//! HTTP → API (axum) → Economy → StoreTx → PostgreSQL | MemoryStore
//! ```
//!
//! # Components
//!
//! - **Daemon**: Opens the store, serves the API, shuts down gracefully
//! - **API**: REST endpoints, one per player action
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use minerd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::from_config(config).await.expect("Failed to open store");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;

// Re-exports for convenience
pub use api::{create_router, ApiState};
pub use config::{ApiConfig, Config, CorsOrigins, DatabaseConfig, Environment};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
