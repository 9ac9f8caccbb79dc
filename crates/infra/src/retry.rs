use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::EngineError;

/// Run `attempt` until it succeeds, fails terminally, or the policy is used up.
///
/// Each attempt must be a whole operation (its own transaction); only
/// [`EngineError::ConflictRetry`] triggers another one.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(err) if err.is_retryable() && tries < policy.max_attempts() => {
                warn!(operation, attempt = tries, error = %err, "conflict detected, retrying operation");
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(RetryPolicy::new(3), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EngineError::ConflictRetry("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(RetryPolicy::new(2), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::ConflictRetry("busy".into()))
        })
        .await;
        assert!(matches!(result, Err(EngineError::ConflictRetry(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_retry(RetryPolicy::new(5), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::InvalidInput("quantity".into()))
        })
        .await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
