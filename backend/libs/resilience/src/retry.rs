/// Retry policy with exponential backoff, jitter and server-provided delays
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Upper bound for any single wait, including server hints
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to computed backoff (±30%)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again; `after` overrides the computed backoff when the remote side
    /// said how long to wait
    Retry { after: Option<Duration> },
    /// The failure is permanent, surface it now
    Abort,
}

/// Errors that know whether they are worth retrying
pub trait Retryable {
    fn retry_decision(&self) -> RetryDecision;
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("{0}")]
    Aborted(E),
}

impl<E> RetryError<E> {
    /// The error from the final attempt
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(e) => e,
        }
    }
}

/// Execute an async operation, retrying per the error's [`RetryDecision`]
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt: u32 = 0;
    let mut backoff = config.initial_backoff;

    loop {
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        attempt += 1;

        let hint = match err.retry_decision() {
            RetryDecision::Abort => return Err(RetryError::Aborted(err)),
            RetryDecision::Retry { after } => after,
        };

        if attempt > config.max_retries {
            warn!(attempts = attempt, error = %err, "Max retries reached");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        let delay = match hint {
            Some(after) => after.min(config.max_backoff),
            None => jittered(backoff, config.jitter),
        };

        warn!(
            attempt,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after failure"
        );

        tokio::time::sleep(delay).await;

        backoff = next_backoff(backoff, config);
    }
}

fn next_backoff(current: Duration, config: &RetryConfig) -> Duration {
    let next_ms = current.as_millis() as f64 * config.backoff_multiplier;
    Duration::from_millis(next_ms.min(config.max_backoff.as_millis() as f64) as u64)
}

fn jittered(base: Duration, jitter: bool) -> Duration {
    if !jitter {
        return base;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
    Duration::from_millis((base.as_millis() as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Transient,
        TransientWithHint(Duration),
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for TestError {
        fn retry_decision(&self) -> RetryDecision {
            match self {
                TestError::Transient => RetryDecision::Retry { after: None },
                TestError::TransientWithHint(d) => RetryDecision::Retry { after: Some(*d) },
                TestError::Fatal => RetryDecision::Abort,
            }
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff: Duration::from_millis(5),
            jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&RetryConfig::default(), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TestError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(2), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(TestError::Transient) }
        })
        .await;

        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 3, .. })
        ));
        // Initial + 2 retries
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_abort_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(TestError::Fatal) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Aborted(TestError::Fatal))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_hint_overrides_backoff() {
        let config = RetryConfig {
            max_retries: 1,
            initial_backoff: Duration::from_secs(5),
            jitter: false,
            ..Default::default()
        };

        let start = std::time::Instant::now();
        let _ = with_retry(&config, || async {
            Err::<i32, _>(TestError::TransientWithHint(Duration::from_millis(20)))
        })
        .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        let start = std::time::Instant::now();
        let _ = with_retry(&config, || async { Err::<i32, _>(TestError::Transient) }).await;

        // 10ms + 20ms + 40ms
        assert!(start.elapsed() >= Duration::from_millis(70));
    }

    #[test]
    fn test_next_backoff_is_capped() {
        let config = RetryConfig {
            max_backoff: Duration::from_millis(300),
            ..Default::default()
        };
        assert_eq!(
            next_backoff(Duration::from_millis(200), &config),
            Duration::from_millis(300)
        );
    }
}
