use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

pub const MAX_BATCH_SIZE: usize = 50_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app_env: String,

    // HTTP server
    pub http_host: String,
    pub http_port: u16,
    pub cors_allow_origins: String,

    // Feature store (PostgreSQL)
    pub database_url: String,

    // Recommendation pipeline
    pub recs_batch_size: usize,
    pub recs_default_k: usize,
    pub recs_max_k: usize,
    pub recs_request_timeout_secs: u64,

    // Metadata API
    pub tmdb_base_url: String,
    pub tmdb_read_token: Option<String>,
    pub tmdb_api_key: Option<String>,

    // Observability
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8000)?
            .set_default("cors_allow_origins", "http://localhost:3000")?
            .set_default("recs_batch_size", 2000)?
            .set_default("recs_default_k", 20)?
            .set_default("recs_max_k", 100)?
            .set_default("recs_request_timeout_secs", 30)?
            .set_default("tmdb_base_url", "https://api.themoviedb.org/3")?
            .set_default("log_format", "json")?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(anyhow!("HTTP port must be greater than 0"));
        }

        if self.database_url.trim().is_empty() {
            return Err(anyhow!("Database URL is required"));
        }

        if self.recs_batch_size == 0 || self.recs_batch_size > MAX_BATCH_SIZE {
            return Err(anyhow!(
                "Batch size must be between 1 and {}",
                MAX_BATCH_SIZE
            ));
        }

        if self.recs_max_k == 0 {
            return Err(anyhow!("Max k must be greater than 0"));
        }

        if self.recs_default_k == 0 || self.recs_default_k > self.recs_max_k {
            return Err(anyhow!(
                "Default k must be between 1 and max k ({})",
                self.recs_max_k
            ));
        }

        if self.recs_request_timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allow_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.recs_request_timeout_secs)
    }
}
