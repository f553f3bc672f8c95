//! `rebound simple` – an operation that fails twice, then succeeds.

use super::resolve_policy;
use anyhow::Result;
use rebound_core::config::ReboundConfig;
use rebound_core::retry::{self, AttemptError, Cancellation};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

pub async fn run_simple(cfg: &ReboundConfig, profile: Option<&str>, cancel: &Cancellation) -> Result<()> {
    let policy = resolve_policy(cfg, profile, "default")?;
    let attempts = AtomicU32::new(0);

    let outcome = retry::run_with_notify(
        cancel,
        &policy,
        || async {
            let current = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  Attempt {}...", current);
            if current < 3 {
                return Err(AttemptError::retryable(io::Error::other("simulated failure")));
            }
            println!("  Success!");
            Ok(())
        },
        |err, wait| println!("  {} (retrying in {:?})", err, wait),
    )
    .await;

    if let Err(err) = outcome {
        println!("  Failed after {} attempt(s): {}", err.attempts(), err);
    }
    Ok(())
}
