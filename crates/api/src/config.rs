//! Application configuration loaded from environment variables.

use std::time::Duration;

use session_store::SessionConfig;

/// Gateway configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8081`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `SESSION_TTL_SECS`: participant session lifetime (default: `60`)
/// - `SESSION_CAPACITY`: live sessions per participant (default: `100`)
/// - `CLUSTER_SIZE`: nodes in each in-process cluster (default: `3`)
/// - `EXECUTION_INTERVAL_SECS`: pause between executor dequeues (default: `5`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub session: SessionConfig,
    pub cluster_size: u32,
    pub execution_interval: Duration,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            session: SessionConfig {
                ttl: Duration::from_secs(env_or("SESSION_TTL_SECS", defaults.session.ttl.as_secs())),
                capacity: env_or("SESSION_CAPACITY", defaults.session.capacity),
            },
            cluster_size: env_or("CLUSTER_SIZE", defaults.cluster_size).max(1),
            execution_interval: Duration::from_secs(env_or(
                "EXECUTION_INTERVAL_SECS",
                defaults.execution_interval.as_secs(),
            )),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "info".to_string(),
            session: SessionConfig::default(),
            cluster_size: 3,
            execution_interval: cluster::executor::DEFAULT_EXECUTION_INTERVAL,
        }
    }
}
