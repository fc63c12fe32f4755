use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::invariants::LivenessPolicy;
use crate::{Error, Result};

/// Upper bound for `session_ttl_hours` (ten years).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 3660;
/// Upper bound for `stale_pending_days` (a century).
pub const MAX_STALE_PENDING_DAYS: i64 = 36_600;

/// Runtime limits and verification settings.
///
/// Missing keys in the TOML file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of live tasks in the store.
    pub max_tasks: usize,
    pub session_ttl_hours: i64,
    /// Pending tasks older than this are reported by diagnostics.
    pub stale_pending_days: i64,
    /// Also require `updated_at <= clock` when verifying timestamps.
    pub enforce_clock_bound: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tasks: 1000,
            session_ttl_hours: 24,
            stale_pending_days: 7,
            enforce_clock_bound: true,
        }
    }
}

impl Config {
    pub fn taskflow_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskflow"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::taskflow_dir()?.join("taskflow.toml"))
    }

    /// Load `~/.taskflow/taskflow.toml`, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading config");
        if !path.exists() {
            tracing::debug!("config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        tracing::debug!(
            max_tasks = config.max_tasks,
            session_ttl_hours = config.session_ttl_hours,
            stale_pending_days = config.stale_pending_days,
            enforce_clock_bound = config.enforce_clock_bound,
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tasks == 0 {
            return Err(Error::Validation("max_tasks must be at least 1".to_string()));
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(Error::Validation(format!(
                "session_ttl_hours must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            )));
        }
        if !(0..=MAX_STALE_PENDING_DAYS).contains(&self.stale_pending_days) {
            return Err(Error::Validation(format!(
                "stale_pending_days must be between 0 and {}",
                MAX_STALE_PENDING_DAYS
            )));
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.session_ttl_hours)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "session_ttl_hours out of range: {}",
                    self.session_ttl_hours
                ))
            })
    }

    pub fn liveness_policy(&self) -> Result<LivenessPolicy> {
        let stale_pending = chrono::Duration::try_days(self.stale_pending_days)
            .filter(|age| *age >= chrono::Duration::zero())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "stale_pending_days out of range: {}",
                    self.stale_pending_days
                ))
            })?;
        Ok(LivenessPolicy { stale_pending })
    }
}
