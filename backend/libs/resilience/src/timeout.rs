/// Deadlines for async operations
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E = std::convert::Infallible> {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error("{0}")]
    Failed(E),
}

/// Run a future under a deadline
///
/// When the deadline fires the future is dropped, which cancels whatever it
/// was awaiting and releases anything it owned.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}

/// Run a fallible future under a deadline, keeping the inner error type
pub async fn with_timeout_result<F, T, E>(
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::Failed(e)),
        Err(_) => Err(TimeoutError::Elapsed(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_elapsed_drops_future() {
        let guard = std::sync::Arc::new(());
        let held = guard.clone();

        let result = with_timeout(Duration::from_millis(10), async move {
            let _held = held;
            tokio::time::sleep(Duration::from_secs(1)).await;
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
        assert_eq!(std::sync::Arc::strong_count(&guard), 1);
    }

    #[tokio::test]
    async fn test_timeout_result_keeps_inner_error() {
        let result = with_timeout_result(Duration::from_secs(1), async {
            Err::<i32, _>("no seeds")
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Failed("no seeds"))));
    }
}
