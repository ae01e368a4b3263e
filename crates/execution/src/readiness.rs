/// Bounded navigation-readiness wait: one awaitable, fixed poll cadence.
use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep};

/// Timeout and poll cadence for readiness waits.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("not ready after {waited_ms}ms")]
    TimedOut { waited_ms: u128 },
    #[error("readiness check failed: {0}")]
    Check(anyhow::Error),
}

/// Poll `check` until it reports ready, the timeout elapses, or the check
/// itself fails. Always probes at least once, even with a zero timeout.
pub async fn wait_until_ready<F, Fut>(policy: ReadinessPolicy, mut check: F) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let started = Instant::now();
    loop {
        match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => return Err(WaitError::Check(e)),
        }
        if started.elapsed() >= policy.timeout {
            return Err(WaitError::TimedOut {
                waited_ms: started.elapsed().as_millis(),
            });
        }
        sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast_policy() -> ReadinessPolicy {
        ReadinessPolicy {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn immediate_readiness_returns_without_sleeping() {
        let polls = AtomicUsize::new(0);
        wait_until_ready(fast_policy(), || {
            polls.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        })
        .await
        .unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_the_check_turns_ready() {
        let polls = AtomicUsize::new(0);
        wait_until_ready(fast_policy(), || {
            let ready = polls.fetch_add(1, Ordering::SeqCst) >= 3;
            async move { Ok(ready) }
        })
        .await
        .unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 4, "three not-ready probes, then the ready one");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_timeout() {
        let err = wait_until_ready(fast_policy(), || async { Ok(false) }).await.unwrap_err();
        let WaitError::TimedOut { waited_ms } = err else {
            panic!("expected a timeout, got {err:?}");
        };
        assert!(waited_ms >= 10_000, "waited {waited_ms}ms");
    }

    #[tokio::test]
    async fn check_failures_cut_the_wait_short() {
        let err = wait_until_ready(fast_policy(), || async { anyhow::bail!("page crashed") })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Check(_)));
        assert!(err.to_string().contains("page crashed"));
    }
}
