//! Completion polling
//!
//! Some mutations finish asynchronously on the remote side. `poll_until`
//! probes the remote object a bounded number of times until the probe
//! reports completion, sleeping between attempts.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded retry schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Number of probes before giving up
    pub max_attempts: u32,
    /// Sleep before the second probe
    pub interval: Duration,
    /// Factor applied to the sleep after every attempt; 1.0 keeps it fixed
    pub backoff: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(10),
            backoff: 1.0,
        }
    }
}

impl PollPolicy {
    /// Sleep between attempt `attempt` and the next one (attempts count from 1)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(attempt.saturating_sub(1) as i32);
        self.interval.mul_f64(factor)
    }
}

/// What a single probe observed
#[derive(Debug)]
pub enum Probe<T> {
    /// The condition holds
    Done(T),
    /// Not yet; carries a description of what was seen
    Pending(String),
}

#[derive(Error, Debug)]
pub enum PollError<E = fortisase_client::Error> {
    #[error("{what} after {attempts} attempts; last response: {last}")]
    Timeout {
        what: String,
        attempts: u32,
        last: String,
    },

    #[error("cancelled while waiting: {0}")]
    Cancelled(String),

    #[error("{0}")]
    Probe(E),
}

/// Probe until done, cancelled, out of attempts, or the probe fails.
///
/// `what` names the timeout condition in the error ("still exists",
/// "not finished").
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let mut last = String::new();

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled(what.to_string()));
        }

        match probe().await.map_err(PollError::Probe)? {
            Probe::Done(value) => {
                debug!("Condition met after {} attempt(s)", attempt);
                return Ok(value);
            }
            Probe::Pending(seen) => {
                debug!("Attempt {}/{}: {}", attempt, policy.max_attempts, seen);
                last = seen;
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(PollError::Cancelled(what.to_string()));
                }
                _ = tokio::time::sleep(policy.delay_after(attempt)) => {}
            }
        }
    }

    Err(PollError::Timeout {
        what: what.to_string(),
        attempts: policy.max_attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn counting_probe(
        done_on: u32,
        calls: Arc<AtomicU32>,
        stamps: Arc<Mutex<Vec<Instant>>>,
    ) -> impl FnMut() -> std::future::Ready<Result<Probe<u32>, String>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            stamps.lock().unwrap().push(Instant::now());
            std::future::ready(Ok(if n == done_on {
                Probe::Done(n)
            } else {
                Probe::Pending(format!("state=pending ({})", n))
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_on_nth_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let policy = PollPolicy::default();

        let result = poll_until(
            &policy,
            &CancellationToken::new(),
            "not finished",
            counting_probe(4, calls.clone(), stamps.clone()),
        )
        .await
        .unwrap();

        assert_eq!(result, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let stamps = stamps.lock().unwrap();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let err = poll_until(
            &PollPolicy::default(),
            &CancellationToken::new(),
            "still exists",
            counting_probe(u32::MAX, calls.clone(), stamps),
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 10);
        // nine sleeps between ten probes
        assert!(start.elapsed() >= Duration::from_secs(90));
        match err {
            PollError::Timeout { what, attempts, last } => {
                assert_eq!(what, "still exists");
                assert_eq!(attempts, 10);
                assert_eq!(last, "state=pending (10)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_aborts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_until::<(), _, _, _>(
            &PollPolicy::default(),
            &CancellationToken::new(),
            "not finished",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err("boom".to_string()))
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Probe(ref e) if e == "boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });

        let calls = Arc::new(AtomicU32::new(0));
        let err = poll_until(
            &PollPolicy::default(),
            &cancel,
            "not finished",
            counting_probe(u32::MAX, calls.clone(), Arc::new(Mutex::new(Vec::new()))),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Cancelled(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = PollPolicy {
            max_attempts: 5,
            interval: Duration::from_secs(2),
            backoff: 2.0,
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(PollPolicy::default().delay_after(7), Duration::from_secs(10));
    }
}
