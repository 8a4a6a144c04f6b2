// Integration tests combining retry, timeout and presets
use resilience::{
    http_external_config, with_retry, with_timeout, with_timeout_result, RetryConfig,
    RetryDecision, RetryError, Retryable, TimeoutError,
};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
enum CallError {
    Unavailable,
    RateLimited(Duration),
    Rejected,
    TimedOut,
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Retryable for CallError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            CallError::Unavailable | CallError::TimedOut => RetryDecision::Retry { after: None },
            CallError::RateLimited(after) => RetryDecision::Retry {
                after: Some(*after),
            },
            CallError::Rejected => RetryDecision::Abort,
        }
    }
}

fn quick(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff: Duration::from_millis(5),
        jitter: false,
        ..Default::default()
    }
}

// ==================== Retry + Timeout ====================

#[tokio::test]
async fn test_deadline_cuts_retry_loop_short() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let config = RetryConfig {
        max_retries: 10,
        initial_backoff: Duration::from_millis(40),
        backoff_multiplier: 1.0,
        jitter: false,
        ..Default::default()
    };

    let result = with_timeout(
        Duration::from_millis(100),
        with_retry(&config, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(CallError::Unavailable) }
        }),
    )
    .await;

    assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
    let attempts = counter.load(Ordering::SeqCst);
    assert!(attempts >= 2 && attempts < 10, "attempts {}", attempts);
}

#[tokio::test]
async fn test_per_attempt_timeout_is_retried() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let result = with_retry(&quick(3), move || {
        let attempt = counter_clone.fetch_add(1, Ordering::SeqCst);
        async move {
            let delay = if attempt == 0 {
                Duration::from_secs(1)
            } else {
                Duration::from_millis(1)
            };
            with_timeout_result(Duration::from_millis(20), async move {
                tokio::time::sleep(delay).await;
                Ok::<_, CallError>("genres")
            })
            .await
            .map_err(|e| match e {
                TimeoutError::Elapsed(_) => CallError::TimedOut,
                TimeoutError::Failed(inner) => inner,
            })
        }
    })
    .await;

    assert_eq!(result.unwrap(), "genres");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_hint_then_success() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let start = Instant::now();
    let result = with_retry(&quick(2), move || {
        let attempt = counter_clone.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Err(CallError::RateLimited(Duration::from_millis(60)))
            } else {
                Ok(attempt)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 1);
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_permanent_error_surfaces_unchanged() {
    let result = with_retry(&quick(5), || async { Err::<(), _>(CallError::Rejected) }).await;

    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::Aborted(CallError::Rejected)));
    assert_eq!(err.into_inner(), CallError::Rejected);
}

#[tokio::test]
async fn test_exhausted_reports_last_error() {
    let result = with_retry(&quick(1), || async { Err::<(), _>(CallError::Unavailable) }).await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("gave up after 2 attempts"));
    assert_eq!(err.into_inner(), CallError::Unavailable);
}

// ==================== Presets ====================

#[tokio::test]
async fn test_external_preset_attempt_budget() {
    let mut config = http_external_config();
    config.retry.initial_backoff = Duration::from_millis(1);

    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let _ = with_retry(&config.retry, move || {
        counter_clone.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(CallError::Unavailable) }
    })
    .await;

    // first call plus three retries
    assert_eq!(counter.load(Ordering::SeqCst), 4);
    assert!(!config.retry.jitter);
    assert!(config.connect_timeout < config.request_timeout);
}
