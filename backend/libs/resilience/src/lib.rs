//! Resilience helpers for calls that leave the process
//!
//! - **Retry**: exponential backoff with jitter, driven by a per-error
//!   [`RetryDecision`] so callers can honor server-provided delays
//! - **Timeout**: time limits on async operations
//! - **Presets**: tuned settings for the kinds of calls the services make
//!
//! # Example
//!
//! ```rust,no_run
//! use resilience::{presets, with_retry, RetryDecision, Retryable};
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl std::fmt::Display for Flaky {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "flaky")
//!     }
//! }
//!
//! impl Retryable for Flaky {
//!     fn retry_decision(&self) -> RetryDecision {
//!         RetryDecision::Retry { after: None }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = presets::http_external_config();
//!     let result = with_retry(&config.retry, || async { Ok::<_, Flaky>(()) }).await;
//!     assert!(result.is_ok());
//! }
//! ```

pub mod presets;
pub mod retry;
pub mod timeout;

pub use presets::{http_external_config, ExternalCallConfig};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryError, Retryable};
pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
