//! Bounded exponential backoff around connector calls.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;

use crate::domain::errors::{ConnectorError, ConnectorResult};
use crate::domain::models::RetryConfig;

/// Run `op`, retrying `SourceUnavailable` up to `max_retries` times.
///
/// Other connector errors are returned after the first attempt.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> ConnectorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ConnectorResult<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
        .with_max_interval(Duration::from_millis(config.max_backoff_ms))
        .with_max_elapsed_time(None)
        .build();

    let max_retries = config.max_retries;
    let mut attempt = 0u32;

    backoff::future::retry_notify(
        policy,
        || {
            attempt += 1;
            let current = attempt;
            let fut = op();
            async move {
                fut.await.map_err(|e| {
                    if e.is_transient() && current <= max_retries {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |e: ConnectorError, wait: Duration| {
            tracing::warn!(what, error = %e, wait_ms = wait.as_millis() as u64, "connector call failed, retrying");
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ConnectorError::SourceUnavailable("blip".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: ConnectorResult<()> = with_retry(&fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ConnectorError::SourceUnavailable("down".into())) }
        })
        .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: ConnectorResult<()> = with_retry(&fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ConnectorError::NotFound("gone".into())) }
        })
        .await;
        assert!(matches!(result, Err(ConnectorError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
