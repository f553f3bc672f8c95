//! CLI command handlers. Each demo is in its own file.

mod concurrent;
mod http;
mod orders;
mod presets;
mod simple;
mod table;

pub use concurrent::run_concurrent;
pub use http::run_http;
pub use orders::run_orders;
pub use presets::run_presets;
pub use simple::run_simple;
pub use table::run_table;

use anyhow::Result;
use rebound_core::config::ReboundConfig;
use rebound_core::retry::RetryPolicy;

/// Policy chosen with `--profile`, or the command's own default profile.
fn resolve_policy(cfg: &ReboundConfig, profile: Option<&str>, fallback: &str) -> Result<RetryPolicy> {
    let name = profile.unwrap_or(fallback);
    let policy = cfg.policy_named(name)?;
    tracing::debug!(profile = name, ?policy, "resolved retry policy");
    Ok(policy)
}
