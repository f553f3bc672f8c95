//! `rebound presets` – fast vs slow policies, and notifications from an
//! always-failing call.

use super::resolve_policy;
use anyhow::Result;
use rebound_core::config::ReboundConfig;
use rebound_core::retry::{self, AttemptError, Cancellation};
use std::io;

pub async fn run_presets(cfg: &ReboundConfig, profile: Option<&str>, cancel: &Cancellation) -> Result<()> {
    let fast = cfg.policy_named("fast")?;
    let slow = cfg.policy_named("slow")?;
    println!("  Fast retry config: {:?}", fast);
    println!("  Slow retry config: {:?}", slow);

    let policy = resolve_policy(cfg, profile, "slow")?;
    let outcome: Result<(), _> = retry::run_with_notify(
        cancel,
        &policy,
        || async {
            println!("  Attempting external API call...");
            Err(AttemptError::retryable(io::Error::from(io::ErrorKind::TimedOut)))
        },
        |err, wait| println!("  Retry notification: {}, waiting {:?}", err, wait),
    )
    .await;

    if let Err(err) = outcome {
        println!("  Final error ({:?}): {}", err.reason(), err);
    }
    Ok(())
}
