//! Retry loop: run an operation until success, a fatal error, budget
//! exhaustion or cancellation.

use super::backoff::compute_wait;
use super::cancel::Cancellation;
use super::classify::{classify, Classify};
use super::error::{AttemptError, RetryError};
use super::policy::RetryPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;

/// Runs `operation` under `policy`, sleeping between retryable failures.
///
/// Jitter comes from a generator seeded for this call only.
pub async fn run<T, E, F, Fut>(
    cancel: &Cancellation,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    run_with(cancel, policy, &mut StdRng::from_entropy(), operation, |_, _| {}).await
}

/// Like [`run`], calling `notify(err, wait)` before each backoff wait.
pub async fn run_with_notify<T, E, F, Fut, N>(
    cancel: &Cancellation,
    policy: &RetryPolicy,
    operation: F,
    notify: N,
) -> Result<T, RetryError<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
    N: FnMut(&AttemptError<E>, Duration),
{
    run_with(cancel, policy, &mut StdRng::from_entropy(), operation, notify).await
}

/// The attempt loop, with the jitter source supplied by the caller.
///
/// `policy.max_attempts` counts total invocations; 0 is treated as 1. The
/// cancellation signal is only observed during backoff waits; an in-flight
/// operation is never interrupted.
pub async fn run_with<T, E, F, Fut, R, N>(
    cancel: &Cancellation,
    policy: &RetryPolicy,
    rng: &mut R,
    mut operation: F,
    mut notify: N,
) -> Result<T, RetryError<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
    R: Rng + ?Sized,
    N: FnMut(&AttemptError<E>, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };
        let attempts = attempt + 1;

        let kind = classify(&err);
        if !kind.is_retryable() {
            tracing::debug!(attempts, ?kind, "non-retryable failure");
            return Err(RetryError::NonRetryable { attempts, last: err });
        }
        if attempts >= max_attempts {
            tracing::debug!(attempts, ?kind, "retry budget exhausted");
            return Err(RetryError::Exhausted { attempts, last: err });
        }

        let wait = compute_wait(attempt, policy, rng);
        tracing::trace!(attempts, ?kind, wait_ms = wait.as_millis() as u64, "backing off");
        notify(&err, wait);

        tokio::select! {
            biased;
            cause = cancel.cancelled() => {
                tracing::debug!(attempts, %cause, "retry wait interrupted");
                return Err(RetryError::Cancelled { attempts, cause, last: err });
            }
            () = tokio::time::sleep(wait) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::cancel::CancelCause;
    use crate::retry::error::FailureReason;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> AttemptError<io::Error> {
        AttemptError::retryable(io::Error::other("temporary failure"))
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(50),
            growth_factor: 2.0,
            jitter_fraction: 0.1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_call() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(100),
            growth_factor: 1.5,
            jitter_fraction: 0.5,
        };
        let out = run(&Cancellation::new(), &policy, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                return Err(transient());
            }
            Ok(n)
        })
        .await;
        assert_eq!(out.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_kth_call_for_every_k() {
        for k in 1..=5u32 {
            let calls = AtomicU32::new(0);
            let out = run(&Cancellation::new(), &quick(5), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < k {
                    Err(transient())
                } else {
                    Ok(())
                }
            })
            .await;
            assert!(out.is_ok());
            assert_eq!(calls.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = run(&Cancellation::new(), &quick(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::retryable(io::Error::other("always fails")))
        })
        .await;
        let err = out.unwrap_err();
        assert_eq!(err.reason(), FailureReason::Exhausted);
        assert_eq!(err.attempts(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.last_error().to_string(), "always fails");
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_waits() {
        let calls = AtomicU32::new(0);
        let mut notified = 0;
        let out: Result<(), _> = run_with_notify(
            &Cancellation::new(),
            &quick(1),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            },
            |_, _| notified += 1,
        )
        .await;
        assert_eq!(out.unwrap_err().reason(), FailureReason::Exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notified, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_invokes_once() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = run(&Cancellation::new(), &quick(0), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;
        assert_eq!(out.unwrap_err().attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_stops_after_one_call() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = run(&Cancellation::new(), &quick(10), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::Failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "bad request",
            )))
        })
        .await;
        let err = out.unwrap_err();
        assert!(matches!(err, RetryError::NonRetryable { attempts: 1, .. }));
        assert_eq!(err.to_string(), "not retryable: bad request");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_without_marker() {
        let calls = AtomicU32::new(0);
        let out = run(&Cancellation::new(), &quick(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            match n {
                1 => Err(AttemptError::Failed(io::Error::from(io::ErrorKind::ConnectionRefused))),
                2 => Err(AttemptError::Failed(io::Error::from(io::ErrorKind::TimedOut))),
                _ => Ok("connected"),
            }
        })
        .await;
        assert_eq!(out.unwrap(), "connected");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_reported_cancellation_is_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), RetryError<io::Error>> = run(&Cancellation::new(), &quick(5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::Cancelled(CancelCause::Cancelled))
        })
        .await;
        assert_eq!(out.unwrap_err().reason(), FailureReason::NonRetryable);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_second_wait_stops_before_third_call() {
        let cancel = Cancellation::new();
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = run(&cancel, &quick(5), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 2 {
                cancel.cancel();
            }
            Err(transient())
        })
        .await;
        let err = out.unwrap_err();
        match err {
            RetryError::Cancelled {
                attempts,
                cause,
                ref last,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(cause, CancelCause::Cancelled);
                assert_eq!(last.to_string(), "temporary failure");
            }
            other => panic!("expected Cancelled, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_another_task_interrupts_long_wait() {
        let cancel = Cancellation::new();
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_wait: Duration::from_secs(60),
            max_wait: Duration::from_secs(60),
            growth_factor: 1.0,
            jitter_fraction: 0.0,
        };
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            })
        };
        let start = tokio::time::Instant::now();
        let out: Result<(), _> = run(&cancel, &policy, || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            }
        })
        .await;
        canceller.await.unwrap();
        assert_eq!(out.unwrap_err().reason(), FailureReason::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_deadline_exceeded() {
        let cancel = Cancellation::with_timeout(Duration::from_millis(25));
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_wait: Duration::from_millis(10),
            max_wait: Duration::from_secs(1),
            growth_factor: 2.0,
            jitter_fraction: 0.0,
        };
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = run(&cancel, &policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(transient())
        })
        .await;
        // waits of 10ms then 20ms: the deadline lands inside the second wait
        match out.unwrap_err() {
            RetryError::Cancelled { attempts, cause, .. } => {
                assert_eq!(cause, CancelCause::DeadlineExceeded);
                assert_eq!(attempts, 2);
            }
            other => panic!("expected Cancelled, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn notify_sees_each_retry_with_computed_wait() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_wait: Duration::from_millis(100),
            max_wait: Duration::from_millis(250),
            growth_factor: 2.0,
            jitter_fraction: 0.0,
        };
        let mut seen = Vec::new();
        let out: Result<(), _> = run_with_notify(
            &Cancellation::new(),
            &policy,
            || async { Err(transient()) },
            |err, wait| seen.push((err.to_string(), wait)),
        )
        .await;
        assert_eq!(out.unwrap_err().attempts(), 4);
        let waits: Vec<Duration> = seen.iter().map(|(_, w)| *w).collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(250)
            ]
        );
        assert!(seen.iter().all(|(msg, _)| msg == "temporary failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_rng_reproduces_jittered_waits() {
        let policy = RetryPolicy {
            jitter_fraction: 0.5,
            ..quick(6)
        };
        let mut first = Vec::new();
        let mut second = Vec::new();
        for seen in [&mut first, &mut second] {
            let mut rng = StdRng::seed_from_u64(2024);
            let _: Result<(), _> = run_with(
                &Cancellation::new(),
                &policy,
                &mut rng,
                || async { Err(transient()) },
                |_, wait| seen.push(wait),
            )
            .await;
        }
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn total_sleep_matches_backoff_sum() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_wait: Duration::from_millis(100),
            max_wait: Duration::from_secs(5),
            growth_factor: 2.0,
            jitter_fraction: 0.0,
        };
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = run(&Cancellation::new(), &policy, || async { Err(transient()) }).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "slept {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(710), "slept {:?}", elapsed);
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let policy = RetryPolicy {
            jitter_fraction: 0.2,
            ..quick(3)
        };
        let mut handles = Vec::new();
        for worker in 0..4u32 {
            handles.push(tokio::spawn(async move {
                let calls = AtomicU32::new(0);
                let out = run(&Cancellation::new(), &policy, || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= worker % 3 {
                        Err(transient())
                    } else {
                        Ok(n)
                    }
                })
                .await;
                (worker, out.map_err(|e| e.reason()))
            }));
        }
        for handle in handles {
            let (worker, out) = handle.await.unwrap();
            assert_eq!(out, Ok(worker % 3 + 1));
        }
    }
}
