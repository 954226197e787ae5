//! Background sweep cadence

use serde::{Deserialize, Serialize};

use crate::{parse_env, validate_duration_ms, ConfigResult};

/// How often expired state is evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Interval between rate-limit counter sweeps, in milliseconds
    pub rate_limit_interval_ms: u64,

    /// Interval between lockout record sweeps, in milliseconds
    pub lockout_interval_ms: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            rate_limit_interval_ms: 60 * 1000,
            lockout_interval_ms: 60 * 60 * 1000,
        }
    }
}

impl SweepSettings {
    /// Load sweep intervals from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            rate_limit_interval_ms: parse_env(
                "RATE_LIMIT_SWEEP_INTERVAL_MS",
                defaults.rate_limit_interval_ms,
            )?,
            lockout_interval_ms: parse_env(
                "LOCKOUT_SWEEP_INTERVAL_MS",
                defaults.lockout_interval_ms,
            )?,
        })
    }

    /// Intervals must be non-zero and at most a year
    pub fn validate(&self) -> ConfigResult<()> {
        validate_duration_ms("RATE_LIMIT_SWEEP_INTERVAL_MS", self.rate_limit_interval_ms)?;
        validate_duration_ms("LOCKOUT_SWEEP_INTERVAL_MS", self.lockout_interval_ms)
    }
}
