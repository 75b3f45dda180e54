//! Mining economy daemon
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (in-memory store)
//! cargo run -p minerd
//!
//! # Start against PostgreSQL
//! DATABASE_URL=postgres://localhost/miner cargo run -p minerd --features postgres
//! ```
//!
//! # Environment Variables
//!
//! - `MINER_ENV`: Environment (test, development, production)
//! - `MINER_API_HOST`: API host (default: 0.0.0.0)
//! - `MINER_API_PORT`: API port (default: 8080)
//! - `MINER_CORS_ORIGINS`: Comma-separated origins (default: `*`, required in production)
//! - `MINER_LOG_FORMAT`: `json` for JSON log lines
//! - `DATABASE_URL`: PostgreSQL URL (required in production)
//! - `MINER_DB_*`: Pool size and timeouts, see `Config`

use minerd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry MINER_LOG_FORMAT
    let _ = dotenvy::dotenv();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("minerd=info,miner_engine=info,tower_http=info"));
    let json = std::env::var("MINER_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Mining economy daemon"
    );

    // Create and run daemon
    let daemon = Daemon::from_config(config).await?;
    daemon.run().await?;

    Ok(())
}
