//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together:
//! - Store (PostgreSQL or in-memory)
//! - Economy (one operation per player action)
//! - API Server (HTTP endpoints)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Open the store
//! 3. Start API server
//! 4. Graceful shutdown on SIGINT/SIGTERM

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use miner_engine::RewardGenerator;
use miner_store::{MemoryStore, Store};

use crate::api::{cors_layer, create_router, ApiState};
use crate::config::{Config, Environment};
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The mining economy daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Store
    store: Arc<dyn Store>,
    /// Case reward source
    rewards: RewardGenerator,
}

impl Daemon {
    /// Create a daemon over an in-memory store (for testing/development).
    pub fn new_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// Create a daemon over the given store.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            store,
            rewards: RewardGenerator::default(),
        }
    }

    /// Open the store the configuration asks for.
    pub async fn from_config(config: Config) -> DaemonResult<Self> {
        let store: Arc<dyn Store> = match config.database.url.as_deref() {
            #[cfg(feature = "postgres")]
            Some(url) => {
                let pg_config = miner_store::PgStoreConfig {
                    max_connections: config.database.max_connections,
                    acquire_timeout: config.database.acquire_timeout,
                    max_lifetime: config.database.max_lifetime,
                    lock_timeout: config.database.lock_timeout,
                    statement_timeout: config.database.statement_timeout,
                };
                let store = miner_store::PgStore::connect(url, pg_config).await?;
                info!(max_connections = config.database.max_connections, "Using PostgreSQL store");
                Arc::new(store)
            }
            #[cfg(not(feature = "postgres"))]
            Some(_) if config.environment == Environment::Production => {
                return Err(DaemonError::Config(
                    "DATABASE_URL is set but minerd was built without the postgres feature"
                        .to_string(),
                ));
            }
            #[cfg(not(feature = "postgres"))]
            Some(_) => {
                warn!("DATABASE_URL ignored: built without the postgres feature, using in-memory store");
                Arc::new(MemoryStore::new())
            }
            None => {
                if config.environment == Environment::Development {
                    warn!("No DATABASE_URL; state will not survive a restart");
                }
                info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(config, store))
    }

    /// Replace the reward source (deterministic tests).
    pub fn with_rewards(mut self, rewards: RewardGenerator) -> Self {
        self.rewards = rewards;
        self
    }

    /// Router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = Arc::new(ApiState::new(self.store.clone(), self.rewards.clone()));
        create_router(state).layer(cors_layer(&self.config.api.cors))
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT/SIGTERM).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting mining daemon"
        );

        let (api_addr, server) = self.start_api_server(shutdown_signal()).await?;
        info!(%api_addr, "API server started");

        server
            .await
            .map_err(|e| DaemonError::Server(std::io::Error::other(e)))?;

        info!("Shutdown complete");
        Ok(())
    }

    /// Start the API server in the background; it drains once `shutdown` resolves.
    async fn start_api_server<F>(&self, shutdown: F) -> DaemonResult<(SocketAddr, JoinHandle<()>)>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        let local_addr = listener.local_addr().map_err(|e| {
            DaemonError::Config(format!("Failed to get local address: {}", e))
        })?;
        let router = self.router();

        // Spawn the server task
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "API server error");
            }
        });

        Ok((local_addr, server))
    }

    async fn bind(&self) -> DaemonResult<TcpListener> {
        let addr = self.config.bind_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_without_database_uses_memory() {
        let daemon = Daemon::from_config(Config::test()).await.unwrap();

        let mut tx = daemon.store.begin().await.unwrap();
        let user = tx.users().get_or_create("1").await.unwrap();
        assert_eq!(user.balance, 0);
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_production_database_requires_postgres_feature() {
        let mut config = Config::test();
        config.environment = Environment::Production;
        config.database.url = Some("postgres://db/miner".to_string());

        let result = Daemon::from_config(config).await;
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[tokio::test]
    async fn test_daemon_api_server_start() {
        let daemon = Daemon::new_memory(Config::test());
        let (addr, _server) = daemon
            .start_api_server(std::future::pending())
            .await
            .unwrap();

        // Server should be running on a port
        assert!(addr.port() > 0);

        // Can make a health check request
        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success());

        let user: serde_json::Value = client
            .get(format!("http://{}/users/42", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(user["status"], "success");
        assert_eq!(user["user"]["identity"], "42");
    }

    #[tokio::test]
    async fn test_bind_failure_is_config_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = Config::test();
        config.api.port = taken.local_addr().unwrap().port();

        let daemon = Daemon::new_memory(config);
        let result = daemon.start_api_server(std::future::pending()).await;
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[tokio::test]
    async fn test_api_server_stops_on_shutdown() {
        let daemon = Daemon::new_memory(Config::test());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let (_addr, server) = daemon
            .start_api_server(async {
                let _ = stop_rx.await;
            })
            .await
            .unwrap();

        stop_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }
}
