//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Allowed CORS origins
    pub cors: CorsOrigins,
}

/// Which origins may call the API from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// Any origin (`*`)
    Any,
    /// Exact origins
    List(Vec<String>),
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; `None` selects the in-memory store
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
    /// Wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Wait for a row lock inside a transaction
    pub lock_timeout: Duration,
    /// Bound on a single statement
    pub statement_timeout: Duration,
    /// Recycle connections after this long
    pub max_lifetime: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory store)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Self::load_environment(&lookup)?;
        let api = Self::load_api_config(&lookup, environment)?;
        let database = Self::load_database_config(&lookup, environment)?;

        Ok(Self {
            api,
            database,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                cors: CorsOrigins::Any,
            },
            database: DatabaseConfig::default(),
            environment: Environment::Test,
        }
    }

    /// Address the API server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    fn load_environment(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<Environment> {
        let env_str = lookup("MINER_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid MINER_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config(
        lookup: &impl Fn(&str) -> Option<String>,
        environment: Environment,
    ) -> DaemonResult<ApiConfig> {
        let host = lookup("MINER_API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = Self::load_parsed(lookup, "MINER_API_PORT", 8080u16)?;

        let cors = match lookup("MINER_CORS_ORIGINS") {
            Some(raw) => CorsOrigins::parse(&raw),
            None if environment == Environment::Production => {
                return Err(DaemonError::Config(
                    "MINER_CORS_ORIGINS is required in production".to_string(),
                ));
            }
            None => CorsOrigins::Any,
        };

        Ok(ApiConfig { host, port, cors })
    }

    fn load_database_config(
        lookup: &impl Fn(&str) -> Option<String>,
        environment: Environment,
    ) -> DaemonResult<DatabaseConfig> {
        let url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if url.is_none() && environment == Environment::Production {
            return Err(DaemonError::Config(
                "DATABASE_URL is required in production".to_string(),
            ));
        }

        let defaults = DatabaseConfig::default();
        Ok(DatabaseConfig {
            url,
            max_connections: Self::load_parsed(
                lookup,
                "MINER_DB_MAX_CONNECTIONS",
                defaults.max_connections,
            )?,
            acquire_timeout: Self::load_millis(
                lookup,
                "MINER_DB_ACQUIRE_TIMEOUT_MS",
                defaults.acquire_timeout,
            )?,
            lock_timeout: Self::load_millis(lookup, "MINER_DB_LOCK_TIMEOUT_MS", defaults.lock_timeout)?,
            statement_timeout: Self::load_millis(
                lookup,
                "MINER_DB_STATEMENT_TIMEOUT_MS",
                defaults.statement_timeout,
            )?,
            max_lifetime: Duration::from_secs(Self::load_parsed(
                lookup,
                "MINER_DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime.as_secs(),
            )?),
        })
    }

    fn load_parsed<T: FromStr>(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: T,
    ) -> DaemonResult<T> {
        match lookup(key) {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn load_millis(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: Duration,
    ) -> DaemonResult<Duration> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        Self::load_parsed(lookup, key, default_ms).map(Duration::from_millis)
    }
}

impl CorsOrigins {
    /// Parse a comma-separated origin list; `*` alone means any origin.
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 25,
            acquire_timeout: Duration::from_millis(5_000),
            lock_timeout: Duration::from_millis(3_000),
            statement_timeout: Duration::from_millis(5_000),
            max_lifetime: Duration::from_secs(300),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors: CorsOrigins::Any,
            },
            database: DatabaseConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
