//! Bounded waits and retry for remote calls.
//!
//! libgit2 has no per-call timeout, so each network operation runs on a helper
//! thread and the caller stops waiting once the deadline passes. Read-only calls
//! are retried for transient failures; pushes never go through [`query`].

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::{PromoteError, Result};

/// Timeout and retry settings for remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound on a single attempt.
    pub timeout: Duration,

    /// Extra attempts after a transient failure (read-only calls only).
    pub retries: u32,

    /// Pause before a retry.
    pub retry_delay: Duration,
}

impl CallPolicy {
    /// 30s per attempt, one retry after 500ms.
    pub const DEFAULT: Self = Self {
        timeout: Duration::from_secs(30),
        retries: 1,
        retry_delay: Duration::from_millis(500),
    };

    pub fn new(timeout: Duration, retries: u32, retry_delay: Duration) -> Self {
        Self {
            timeout,
            retries,
            retry_delay,
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&RemoteConfig> for CallPolicy {
    fn from(config: &RemoteConfig) -> Self {
        Self::new(config.timeout(), config.retries, config.retry_delay())
    }
}

/// Run `operation` on a helper thread and wait at most `timeout` for its result.
///
/// A timed-out operation keeps running in the background until it finishes on
/// its own; its result is discarded.
pub fn with_deadline<T, F>(operation: &str, timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("git-promote-remote".to_string())
        .spawn(move || {
            // The receiver may be gone after a timeout.
            let _ = tx.send(f());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(PromoteError::Timeout {
            operation: operation.to_string(),
            millis: timeout.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(PromoteError::unreachable(format!(
            "{} ended without a result",
            operation
        ))),
    }
}

/// Call `attempt` until it succeeds, fails permanently, or retries run out.
pub fn with_retry<T, F>(operation: &str, policy: &CallPolicy, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut retries_left = policy.retries;
    loop {
        match attempt() {
            Err(err) if err.is_transient() && retries_left > 0 => {
                retries_left -= 1;
                warn!(operation, error = %err, "transient remote failure, retrying");
                thread::sleep(policy.retry_delay);
            }
            other => return other,
        }
    }
}

/// A read-only remote call: deadline per attempt plus retry on transient errors.
pub fn query<T, F>(operation: &str, policy: &CallPolicy, f: F) -> Result<T>
where
    T: Send + 'static,
    F: Fn() -> Result<T> + Clone + Send + 'static,
{
    debug!(operation, timeout_ms = policy.timeout.as_millis() as u64, "remote query");
    with_retry(operation, policy, || {
        with_deadline(operation, policy.timeout, f.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(retries: u32) -> CallPolicy {
        CallPolicy::new(Duration::from_millis(200), retries, Duration::from_millis(1))
    }

    #[test]
    fn test_deadline_returns_result() {
        let value = with_deadline("adding", Duration::from_secs(5), || Ok(2 + 2)).unwrap();
        assert_eq!(value, 4);
    }

    #[test]
    fn test_deadline_expires() {
        let err = with_deadline("sleeping", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .unwrap_err();
        match err {
            PromoteError::Timeout { operation, millis } => {
                assert_eq!(operation, "sleeping");
                assert_eq!(millis, 20);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_deadline_survives_panicking_operation() {
        let err = with_deadline::<(), _>("panicking", Duration::from_secs(5), || {
            panic!("boom")
        })
        .unwrap_err();
        assert!(matches!(err, PromoteError::RemoteUnreachable(_)));
    }

    #[test]
    fn test_single_retry_recovers_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = query("flaky", &fast_policy(1), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PromoteError::unreachable("connection reset"))
            } else {
                Ok("heads")
            }
        })
        .unwrap();
        assert_eq!(result, "heads");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let err = query::<(), _>("down", &fast_policy(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PromoteError::unreachable("no route to host"))
        })
        .unwrap_err();
        assert!(matches!(err, PromoteError::RemoteUnreachable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let err = query::<(), _>("missing", &fast_policy(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PromoteError::BranchNotFound("beta".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, PromoteError::BranchNotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RemoteConfig {
            timeout_secs: 7,
            retries: 2,
            retry_delay_ms: 10,
            ..RemoteConfig::default()
        };
        let policy = CallPolicy::from(&config);
        assert_eq!(policy.timeout, Duration::from_secs(7));
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.retry_delay, Duration::from_millis(10));
    }
}
