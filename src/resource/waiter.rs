//! Polling waiters for eventually-consistent remote state

use crate::error::{ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Outcome of one status check
#[derive(Debug)]
pub enum Poll<T> {
    /// Target state reached
    Ready(T),
    /// Still transitioning; carries the observed state for logging
    Pending(String),
    /// Terminal failure state
    Failed(String),
}

/// Poll `check` every `interval` until it reports `Ready`, fails, or
/// `timeout` elapses.
pub async fn wait_until<T, F, Fut>(
    resource: &str,
    target: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match check().await? {
            Poll::Ready(value) => return Ok(value),
            Poll::Failed(state) => {
                return Err(ProviderError::UnexpectedState {
                    resource: resource.to_string(),
                    state,
                })
            }
            Poll::Pending(state) => {
                tracing::debug!("{} is {}, waiting for {}", resource, state, target);
            }
        }

        if Instant::now() + interval > deadline {
            return Err(ProviderError::Timeout {
                resource: resource.to_string(),
                target: target.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        sleep(interval).await;
    }
}

/// Wait until `exists` reports the object gone
pub async fn wait_for_deletion<F, Fut>(
    resource: &str,
    timeout: Duration,
    interval: Duration,
    mut exists: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    wait_until(resource, "deleted", timeout, interval, || {
        let fut = exists();
        async move {
            Ok(if fut.await? {
                Poll::Pending("present".to_string())
            } else {
                Poll::Ready(())
            })
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TICK: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_wait_until_ready() {
        let calls = AtomicU32::new(0);
        let value = wait_until("thing", "COMPLETED", Duration::from_secs(1), TICK, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(if n < 2 {
                    Poll::Pending("IN_PROGRESS".to_string())
                } else {
                    Poll::Ready(n)
                })
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_wait_until_failed_state() {
        let err = wait_until::<(), _, _>("thing", "COMPLETED", Duration::from_secs(1), TICK, || async {
            Ok(Poll::Failed("FAILED".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "thing reached unexpected state FAILED");
    }

    #[tokio::test]
    async fn test_wait_until_timeout() {
        let err = wait_until::<(), _, _>(
            "thing",
            "COMPLETED",
            Duration::from_millis(5),
            Duration::from_millis(2),
            || async { Ok(Poll::Pending("IN_PROGRESS".to_string())) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_deletion_propagates_errors() {
        let err = wait_for_deletion("thing", Duration::from_secs(1), TICK, || async {
            Err(ProviderError::decode("x", "bad"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));

        wait_for_deletion("thing", Duration::from_secs(1), TICK, || async { Ok(false) })
            .await
            .unwrap();
    }
}
