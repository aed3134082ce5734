//! Configuration management

use std::fmt;
use std::time::Duration;

use anyhow::{self, Context, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where import batches are persisted
#[derive(Clone, PartialEq)]
pub enum StoreBackend {
    /// In-process tables, nothing survives the run
    Memory,
    /// Hosted registry REST API
    Postgrest { base_url: String, api_key: String },
    /// Direct PostgreSQL connection
    Postgres { database_url: String },
}

impl fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("Memory"),
            StoreBackend::Postgrest { base_url, .. } => f
                .debug_struct("Postgrest")
                .field("base_url", base_url)
                .field("api_key", &"<redacted>")
                .finish(),
            StoreBackend::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"<redacted>")
                .finish(),
        }
    }
}

/// Store adapter configuration, passed to `create_store` at construction
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Request timeout for the REST backend
    pub timeout: Duration,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key -> value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_name = lookup("STORE_BACKEND").unwrap_or_else(|| "memory".to_string());

        let backend = match backend_name.trim().to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgrest" | "rest" => {
                let base_url = lookup("REGISTRY_API_URL")
                    .filter(|v| !v.is_empty())
                    .context("REGISTRY_API_URL must be set for the postgrest backend")?;
                let api_key = lookup("REGISTRY_API_KEY")
                    .filter(|v| !v.is_empty())
                    .context("REGISTRY_API_KEY must be set for the postgrest backend")?;
                StoreBackend::Postgrest { base_url, api_key }
            }
            "postgres" | "postgresql" => {
                let database_url = lookup("DATABASE_URL")
                    .filter(|v| !v.is_empty())
                    .context("DATABASE_URL must be set for the postgres backend")?;
                StoreBackend::Postgres { database_url }
            }
            other => anyhow::bail!(
                "Unknown STORE_BACKEND '{}' (expected memory, postgrest or postgres)",
                other
            ),
        };

        let timeout_secs = match lookup("STORE_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("STORE_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        if backend == StoreBackend::Memory {
            tracing::warn!("STORE_BACKEND is memory, imports will not be persisted");
        }

        Ok(Self {
            store: StoreConfig {
                backend,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}
