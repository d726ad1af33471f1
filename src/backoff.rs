use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::ConnectError;
use crate::logging::{ErrorLogger, LogContext};

/// Exponential backoff bounded by a total wait
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Stop retrying once this much time has passed since the first attempt
    pub max_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::with_max_wait(Duration::from_secs(30))
    }
}

impl BackoffPolicy {
    /// 500ms doubling to 5s, giving up after `max_wait`
    pub fn with_max_wait(max_wait: Duration) -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            max_wait,
        }
    }

    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

/// Run `attempt` until it succeeds, the policy's wait budget is spent, or `cancel` fires.
///
/// `attempt` should both connect and health-check; whatever it returns on
/// success is handed back unchanged.
pub async fn connect_with_backoff<T, E, F, Fut>(
    target: &str,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, ConnectError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let last_error = match attempt().await {
            Ok(handle) => {
                ErrorLogger::log_connect_success(target, attempts, started.elapsed().as_millis() as u64);
                return Ok(handle);
            }
            Err(e) => e.to_string(),
        };

        let elapsed = started.elapsed();
        if elapsed >= policy.max_wait {
            LogContext::new("backoff", "connect")
                .with_attempt(attempts)
                .with_metadata("target", serde_json::json!(target))
                .with_duration_ms(elapsed.as_millis() as u64)
                .error(&format!("Giving up on {}: {}", target, last_error));

            return Err(ConnectError::Exhausted {
                target: target.to_string(),
                attempts,
                elapsed_ms: elapsed.as_millis() as u64,
                last_error,
            });
        }

        ErrorLogger::log_connect_attempt(target, attempts, delay, &last_error);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ConnectError::Cancelled { target: target.to_string() });
            }
            _ = sleep(delay) => {}
        }

        delay = policy.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_wait_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_wait: Duration::from_millis(max_wait_ms),
        }
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = BackoffPolicy::with_max_wait(Duration::from_secs(30));
        let mut delay = policy.initial_delay;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_millis());
            delay = policy.next_delay(delay);
        }
        assert_eq!(seen, vec![500, 1000, 2000, 4000, 5000, 5000]);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = calls.clone();
        let result = connect_with_backoff("test-db", &fast_policy(1_000), &cancel, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {} refused", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_carries_last_error() {
        let cancel = CancellationToken::new();
        let result: Result<(), ConnectError> =
            connect_with_backoff("test-db", &fast_policy(50), &cancel, || async {
                Err::<(), _>("connection refused")
            })
            .await;

        match result {
            Err(ConnectError::Exhausted { attempts, last_error, elapsed_ms, .. }) => {
                assert!(attempts >= 2);
                assert!(elapsed_ms >= 50);
                assert_eq!(last_error, "connection refused");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_wait_tries_once() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result: Result<(), ConnectError> =
            connect_with_backoff("test-db", &fast_policy(0), &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("down") }
            })
            .await;

        assert!(matches!(result, Err(ConnectError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_wait_returns_promptly() {
        let cancel = CancellationToken::new();
        let policy = BackoffPolicy {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
            max_wait: Duration::from_secs(60),
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<(), ConnectError> =
            connect_with_backoff("test-db", &policy, &cancel, || async { Err::<(), _>("down") }).await;

        assert!(matches!(result, Err(ConnectError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
