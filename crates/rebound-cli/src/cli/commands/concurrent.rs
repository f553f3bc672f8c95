//! `rebound concurrent` – independent workers, each with its own retry loop
//! and its own jitter source.

use super::resolve_policy;
use anyhow::{Context, Result};
use rebound_core::config::ReboundConfig;
use rebound_core::retry::{self, AttemptError, Cancellation, RetryPolicy};
use std::io;
use std::time::Duration;

/// Policy used when no `--profile` is given: higher jitter so concurrent
/// workers drift apart.
fn worker_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_wait: Duration::from_millis(50),
        max_wait: Duration::from_millis(500),
        growth_factor: 2.0,
        jitter_fraction: 0.2,
    }
}

pub async fn run_concurrent(
    cfg: &ReboundConfig,
    profile: Option<&str>,
    cancel: &Cancellation,
    workers: usize,
) -> Result<()> {
    let policy = match profile {
        Some(_) => resolve_policy(cfg, profile, "default")?,
        None => worker_policy(),
    };

    let mut handles = Vec::with_capacity(workers);
    for id in 1..=workers {
        let cancel = cancel.child();
        handles.push(tokio::spawn(async move {
            let outcome = retry::run(&cancel, &policy, || async move {
                println!("  Worker {} attempting...", id);
                tokio::time::sleep(Duration::from_millis(10)).await;
                if rand::random::<bool>() {
                    return Err(AttemptError::retryable(io::Error::other(format!(
                        "worker {} failed",
                        id
                    ))));
                }
                Ok(())
            })
            .await;
            match outcome {
                Ok(()) => format!("Worker {} succeeded", id),
                Err(err) => format!("Worker {} failed after {} attempt(s)", id, err.attempts()),
            }
        }));
    }

    for handle in handles {
        let line = handle.await.context("worker task join")?;
        println!("  Result: {}", line);
    }
    Ok(())
}
