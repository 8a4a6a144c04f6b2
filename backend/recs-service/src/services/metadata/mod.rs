// ============================================
// Metadata API client (TMDB)
// ============================================
//
// Explicitly constructed in main and owned by the app state; the underlying
// connection pool is closed when the last handle is dropped.
//
// Auth: `Authorization: Bearer <read token>` when a read token is configured,
// otherwise `?api_key=`.

pub mod stats;

pub use stats::{film_count, FilmCount, FilmTitle};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client as HttpClient, StatusCode};
use resilience::{with_retry, ExternalCallConfig, RetryConfig, RetryDecision, RetryError, Retryable};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;

const DEFAULT_LANGUAGE: &str = "en-US";
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("client configuration: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned {status}")]
    Transient {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl Retryable for MetadataError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            MetadataError::Transport(_) => RetryDecision::Retry { after: None },
            MetadataError::Transient { retry_after, .. } => RetryDecision::Retry {
                after: *retry_after,
            },
            MetadataError::Config(_) | MetadataError::Status { .. } | MetadataError::Decode(_) => {
                RetryDecision::Abort
            }
        }
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        match &err {
            // a bad local setup, not an upstream failure
            MetadataError::Config(_) => AppError::Internal(err.to_string()),
            _ => AppError::MetadataApi(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenreList {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub popularity: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonSearchPage {
    #[serde(default)]
    pub results: Vec<PersonSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieCredit {
    pub id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub genre_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonMovieCredits {
    #[serde(default)]
    pub cast: Vec<MovieCredit>,
    #[serde(default)]
    pub crew: Vec<MovieCredit>,
}

#[derive(Debug, Clone)]
pub struct MetadataSettings {
    pub base_url: String,
    pub read_token: Option<String>,
    pub api_key: Option<String>,
    pub call: ExternalCallConfig,
}

impl From<&Config> for MetadataSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.tmdb_base_url.clone(),
            read_token: non_empty(config.tmdb_read_token.as_deref()),
            api_key: non_empty(config.tmdb_api_key.as_deref()),
            call: resilience::http_external_config(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct MetadataClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl MetadataClient {
    pub fn new(settings: MetadataSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let api_key = match settings.read_token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| MetadataError::Config(format!("invalid read token: {}", e)))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                None
            }
            None => settings.api_key,
        };

        let http = HttpClient::builder()
            .timeout(settings.call.request_timeout)
            .connect_timeout(settings.call.connect_timeout)
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .build()
            .map_err(|e| MetadataError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            retry: settings.call.retry,
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// `GET /genre/movie/list`
    pub async fn genre_movie_list(&self) -> Result<GenreList> {
        self.get_json("/genre/movie/list", &[("language", DEFAULT_LANGUAGE.to_string())])
            .await
    }

    /// `GET /search/person`, first page, adult results excluded
    pub async fn search_person(&self, query: &str) -> Result<PersonSearchPage> {
        self.get_json(
            "/search/person",
            &[
                ("query", query.to_string()),
                ("language", DEFAULT_LANGUAGE.to_string()),
                ("page", "1".to_string()),
                ("include_adult", "false".to_string()),
            ],
        )
        .await
    }

    /// `GET /person/{id}/movie_credits`
    pub async fn person_movie_credits(&self, person_id: i64) -> Result<PersonMovieCredits> {
        self.get_json(
            &format!("/person/{}/movie_credits", person_id),
            &[("language", DEFAULT_LANGUAGE.to_string())],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        with_retry(&self.retry, || self.attempt::<T>(&url, params))
            .await
            .map_err(RetryError::into_inner)
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<T> {
        let mut request = self.http.get(url).query(params);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;
        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Metadata API response");

        if is_transient(status) {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(MetadataError::Transient {
                status: status.as_u16(),
                retry_after,
            });
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MetadataError::Decode(e.to_string()))
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Delay-seconds form of `Retry-After`; HTTP-date values are ignored
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_retry_decisions() {
        assert_eq!(
            MetadataError::Transport("reset".into()).retry_decision(),
            RetryDecision::Retry { after: None }
        );
        assert_eq!(
            MetadataError::Transient {
                status: 429,
                retry_after: Some(Duration::from_secs(1))
            }
            .retry_decision(),
            RetryDecision::Retry {
                after: Some(Duration::from_secs(1))
            }
        );
        assert_eq!(
            MetadataError::Status {
                status: 401,
                body: String::new()
            }
            .retry_decision(),
            RetryDecision::Abort
        );
    }

    #[test]
    fn test_transient_statuses() {
        for code in [429, 500, 502, 503, 504] {
            assert!(is_transient(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 404, 501] {
            assert!(!is_transient(StatusCode::from_u16(code).unwrap()));
        }
    }

    #[test]
    fn test_settings_prefer_read_token() {
        let settings = MetadataSettings {
            base_url: "http://localhost/3/".to_string(),
            read_token: Some("token".to_string()),
            api_key: Some("key".to_string()),
            call: resilience::http_external_config(),
        };
        let client = MetadataClient::new(settings).unwrap();
        assert!(client.api_key.is_none());
        assert_eq!(client.base_url, "http://localhost/3");
    }

    #[test]
    fn test_bad_credentials_are_internal_errors() {
        use actix_web::ResponseError;

        let settings = MetadataSettings {
            base_url: "http://localhost/3".to_string(),
            read_token: Some("line\nbreak".to_string()),
            api_key: None,
            call: resilience::http_external_config(),
        };
        let err = MetadataClient::new(settings).err().expect("token must be rejected");
        assert!(matches!(err, MetadataError::Config(_)));

        let app_err = AppError::from(err);
        assert!(matches!(app_err, AppError::Internal(_)));
        assert_eq!(app_err.status_code(), actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

        let upstream = AppError::from(MetadataError::Status {
            status: 401,
            body: String::new(),
        });
        assert!(matches!(upstream, AppError::MetadataApi(_)));
    }
}
