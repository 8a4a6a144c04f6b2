/// Preset configurations for outbound calls
use crate::retry::RetryConfig;
use std::time::Duration;

/// Settings bundle for a third-party HTTP API
#[derive(Debug, Clone)]
pub struct ExternalCallConfig {
    /// Whole-request deadline
    pub request_timeout: Duration,
    /// TCP/TLS connect deadline
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

/// Third-party HTTP APIs (metadata providers)
///
/// - 15s per request, 5s to connect
/// - 3 retries, backoff 0.5s doubling, no jitter
pub fn http_external_config() -> ExternalCallConfig {
    ExternalCallConfig {
        request_timeout: Duration::from_secs(15),
        connect_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_external_config() {
        let config = http_external_config();
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(500));
    }
}
