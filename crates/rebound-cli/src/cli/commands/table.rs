//! `rebound table` – print the backoff curve of a profile.

use super::resolve_policy;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rebound_core::config::ReboundConfig;
use rebound_core::retry::{compute_wait, exponential_wait, RetryPolicy};
use std::time::Duration;

/// One row per attempt index: (index, clamped wait, one jittered sample).
pub(crate) fn backoff_rows(policy: &RetryPolicy, attempts: u32, seed: u64) -> Vec<(u32, Duration, Duration)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..attempts)
        .map(|i| (i, exponential_wait(i, policy), compute_wait(i, policy, &mut rng)))
        .collect()
}

pub fn run_table(cfg: &ReboundConfig, profile: Option<&str>, attempts: u32) -> Result<()> {
    let policy = resolve_policy(cfg, profile, "default")?;
    println!(
        "max_attempts={} initial={:?} max={:?} growth={} jitter={}",
        policy.max_attempts, policy.initial_wait, policy.max_wait, policy.growth_factor, policy.jitter_fraction
    );
    println!("  {:>7}  {:>12}  {:>12}", "Attempt", "Wait", "Jittered");
    println!("  {}  {}  {}", "-------", "------------", "------------");
    for (i, wait, jittered) in backoff_rows(&policy, attempts, rand::random()) {
        println!("  {:>7}  {:>12}  {:>12}", i, format!("{:?}", wait), format!("{:?}", jittered));
    }
    Ok(())
}
