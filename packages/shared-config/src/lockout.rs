//! Account lockout settings

use serde::{Deserialize, Serialize};

use crate::{parse_env, validate_duration_ms, ConfigError, ConfigResult};

/// Thresholds for the account lockout state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutSettings {
    /// Failures within the attempt window that lock the account
    pub max_attempts: u32,

    /// Lock length in milliseconds
    pub lockout_duration_ms: u64,

    /// Window in milliseconds, measured from the first failure
    pub attempt_window_ms: u64,

    /// Failure count from which remaining attempts are reported
    pub warn_after: u32,

    /// Records untouched for this long are swept, in milliseconds
    pub stale_after_ms: u64,
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration_ms: 30 * 60 * 1000,
            attempt_window_ms: 15 * 60 * 1000,
            warn_after: 3,
            stale_after_ms: 24 * 60 * 60 * 1000,
        }
    }
}

impl LockoutSettings {
    /// Load lockout settings from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: parse_env("LOCKOUT_MAX_ATTEMPTS", defaults.max_attempts)?,
            lockout_duration_ms: parse_env("LOCKOUT_DURATION_MS", defaults.lockout_duration_ms)?,
            attempt_window_ms: parse_env("LOCKOUT_ATTEMPT_WINDOW_MS", defaults.attempt_window_ms)?,
            warn_after: parse_env("LOCKOUT_WARN_AFTER", defaults.warn_after)?,
            stale_after_ms: parse_env("LOCKOUT_STALE_AFTER_MS", defaults.stale_after_ms)?,
        })
    }

    /// Validate thresholds
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "LOCKOUT_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.warn_after > self.max_attempts {
            return Err(ConfigError::ValidationError(format!(
                "LOCKOUT_WARN_AFTER ({}) cannot exceed LOCKOUT_MAX_ATTEMPTS ({})",
                self.warn_after, self.max_attempts
            )));
        }
        validate_duration_ms("LOCKOUT_DURATION_MS", self.lockout_duration_ms)?;
        validate_duration_ms("LOCKOUT_ATTEMPT_WINDOW_MS", self.attempt_window_ms)?;
        validate_duration_ms("LOCKOUT_STALE_AFTER_MS", self.stale_after_ms)
    }
}
