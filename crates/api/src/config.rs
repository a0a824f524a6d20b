//! Application configuration loaded from environment variables.

use std::path::PathBuf;

/// Largest accepted proof-of-transfer upload when `MAX_PROOF_BYTES` is unset.
pub const DEFAULT_MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `MAX_PROOF_BYTES`: proof upload limit (default: 5 MiB)
/// - `SEED_CATALOG`: JSON file of products loaded into the in-memory store
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub max_proof_bytes: usize,
    pub seed_catalog: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            max_proof_bytes: std::env::var("MAX_PROOF_BYTES")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_proof_bytes),
            seed_catalog: std::env::var("SEED_CATALOG")
                .ok()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request body limit: the proof plus room for the order JSON and its
    /// base64 expansion.
    pub fn body_limit(&self) -> usize {
        self.max_proof_bytes / 3 * 4 + 64 * 1024
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            max_proof_bytes: DEFAULT_MAX_PROOF_BYTES,
            seed_catalog: None,
        }
    }
}
