use crate::retry::{PolicyError, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry policy parameters as written in config.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Wait before the second attempt, in milliseconds.
    pub initial_wait_ms: u64,
    /// Ceiling on the wait, in milliseconds.
    pub max_wait_ms: u64,
    /// Multiplier applied after each failed attempt (>= 1.0).
    pub growth_factor: f64,
    /// Fraction of the wait randomized around zero, within [0, 1].
    pub jitter_fraction: f64,
}

impl From<&RetryPolicy> for PolicyConfig {
    fn from(p: &RetryPolicy) -> Self {
        Self {
            max_attempts: p.max_attempts,
            initial_wait_ms: u64::try_from(p.initial_wait.as_millis()).unwrap_or(u64::MAX),
            max_wait_ms: u64::try_from(p.max_wait.as_millis()).unwrap_or(u64::MAX),
            growth_factor: p.growth_factor,
            jitter_fraction: p.jitter_fraction,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::from(&RetryPolicy::default())
    }
}

impl PolicyConfig {
    /// Build and validate the runtime policy.
    pub fn to_policy(&self) -> Result<RetryPolicy, PolicyError> {
        let policy = RetryPolicy {
            max_attempts: self.max_attempts,
            initial_wait: Duration::from_millis(self.initial_wait_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
            growth_factor: self.growth_factor,
            jitter_fraction: self.jitter_fraction,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Settings for the retrying HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request transfer timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Global configuration loaded from `~/.config/rebound/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReboundConfig {
    /// Optional override of the `default` policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
    /// Named policies (`[profiles.<name>]`); these shadow the built-in `fast`/`slow`.
    #[serde(default)]
    pub profiles: BTreeMap<String, PolicyConfig>,
    #[serde(default)]
    pub http: HttpConfig,
}

impl ReboundConfig {
    /// Resolve a policy by name: `default`, `fast`, `slow`, or any `[profiles.*]` entry.
    pub fn policy_named(&self, name: &str) -> Result<RetryPolicy> {
        if let Some(p) = self.profiles.get(name) {
            return p
                .to_policy()
                .with_context(|| format!("invalid retry profile '{}'", name));
        }
        match name {
            "default" => match &self.policy {
                Some(p) => p.to_policy().context("invalid [policy] section"),
                None => Ok(RetryPolicy::default()),
            },
            "fast" => Ok(RetryPolicy::fast()),
            "slow" => Ok(RetryPolicy::slow()),
            other => anyhow::bail!("unknown retry profile '{}'", other),
        }
    }

    /// Names accepted by [`policy_named`](Self::policy_named), built-ins first.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["default", "fast", "slow"].iter().map(|s| s.to_string()).collect();
        for name in self.profiles.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rebound")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ReboundConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<ReboundConfig> {
    if !path.exists() {
        let default_cfg = ReboundConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: ReboundConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
