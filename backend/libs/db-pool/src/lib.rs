//! Database connection pool management
//!
//! Builds the Postgres pool shared by the CineGraph services. Connections are
//! pre-pinged before they are handed out, so a connection the server dropped is
//! replaced at the pool layer instead of failing the caller's first query.

mod env_utils;
mod metrics;

use env_utils::parse_env_with_default;
pub use metrics::acquire_with_metrics;
use metrics::update_pool_metrics;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

/// Database connection pool configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections kept warm
    pub min_connections: u32,
    /// Timeout for the startup verification query
    pub connect_timeout_secs: u64,
    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout_secs: u64,
    /// Connection idle timeout
    pub idle_timeout_secs: u64,
    /// Connection maximum lifetime
    pub max_lifetime_secs: u64,
    /// Ping connections before handing them out
    pub pre_ping: bool,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("pre_ping", &self.pre_ping)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            pre_ping: true,
        }
    }
}

impl DbConfig {
    /// Pool sizing from `DB_*` variables, with an explicit connection URL
    pub fn with_url(service_name: &str, database_url: impl Into<String>) -> Self {
        let defaults = Self::default();

        Self {
            service_name: service_name.to_string(),
            database_url: database_url.into(),
            max_connections: parse_env_with_default(
                "DB_MAX_CONNECTIONS",
                defaults.max_connections,
            ),
            min_connections: parse_env_with_default(
                "DB_MIN_CONNECTIONS",
                defaults.min_connections,
            ),
            connect_timeout_secs: parse_env_with_default(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            acquire_timeout_secs: parse_env_with_default(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            ),
            idle_timeout_secs: parse_env_with_default(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout_secs,
            ),
            max_lifetime_secs: parse_env_with_default(
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime_secs,
            ),
            pre_ping: parse_env_with_default("DB_PRE_PING", defaults.pre_ping),
        }
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            max_connections = self.max_connections,
            min_connections = self.min_connections,
            acquire_timeout_secs = self.acquire_timeout_secs,
            idle_timeout_secs = self.idle_timeout_secs,
            max_lifetime_secs = self.max_lifetime_secs,
            pre_ping = self.pre_ping,
            "Database pool configuration"
        );
    }
}

/// Create a PostgreSQL connection pool with automatic metrics monitoring
pub async fn create_pool(config: DbConfig) -> Result<PgPool, sqlx::Error> {
    debug!(
        service = %config.service_name,
        max = config.max_connections,
        min = config.min_connections,
        "Creating database pool"
    );

    // min_connections above max makes sqlx refuse to build the pool
    let min_connections = config.min_connections.min(config.max_connections);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(config.pre_ping)
        .connect(&config.database_url)
        .await?;

    let verify_timeout = Duration::from_secs(config.connect_timeout_secs);
    match tokio::time::timeout(verify_timeout, sqlx::query("SELECT 1").execute(&pool)).await {
        Ok(Ok(_)) => {
            info!(
                service = %config.service_name,
                "Database pool created and verified successfully"
            );

            update_pool_metrics(&pool, &config.service_name);

            let pool_clone = pool.clone();
            let service = config.service_name.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    if pool_clone.is_closed() {
                        break;
                    }
                    update_pool_metrics(&pool_clone, &service);
                }
            });

            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(e)
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Database verification timeout",
            )))
        }
    }
}

/// Cheap liveness probe used by health endpoints
pub async fn ping(pool: &PgPool, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_pool_env() {
        for key in [
            "DB_MAX_CONNECTIONS",
            "DB_MIN_CONNECTIONS",
            "DB_CONNECT_TIMEOUT_SECS",
            "DB_ACQUIRE_TIMEOUT_SECS",
            "DB_IDLE_TIMEOUT_SECS",
            "DB_MAX_LIFETIME_SECS",
            "DB_PRE_PING",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 10);
        assert!(config.pre_ping);
    }

    #[test]
    #[serial_test::serial]
    fn test_with_url_uses_defaults() {
        clear_pool_env();

        let config = DbConfig::with_url("recs-service", "postgres://localhost/cinegraph");
        assert_eq!(config.service_name, "recs-service");
        assert_eq!(config.database_url, "postgres://localhost/cinegraph");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(config.pre_ping);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides() {
        clear_pool_env();
        std::env::set_var("DB_MAX_CONNECTIONS", "4");
        std::env::set_var("DB_PRE_PING", "false");

        let config = DbConfig::with_url("recs-service", "postgres://localhost/cinegraph");
        assert_eq!(config.max_connections, 4);
        assert!(!config.pre_ping);

        clear_pool_env();
    }

    #[test]
    fn test_debug_redacts_url() {
        let config = DbConfig::with_url("recs-service", "postgres://user:secret@db/cinegraph");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
