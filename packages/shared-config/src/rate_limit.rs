//! Rate limit bucket settings

use serde::{Deserialize, Serialize};

use crate::{get_env_or_default, parse_env, validate_duration_ms, ConfigError, ConfigResult};

/// Window and ceiling for one rate-limit bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSettings {
    /// Window length in milliseconds
    pub window_ms: u64,

    /// Maximum events admitted per window
    pub max: u32,

    /// User-facing message returned on rejection
    pub message: String,
}

impl BucketSettings {
    /// Create bucket settings
    pub fn new(window_ms: u64, max: u32, message: impl Into<String>) -> Self {
        Self {
            window_ms,
            max,
            message: message.into(),
        }
    }

    /// Load a bucket from `{prefix}_WINDOW_MS`, `{prefix}_MAX` and
    /// `{prefix}_MESSAGE`, falling back to `default`
    pub fn from_env(prefix: &str, default: Self) -> ConfigResult<Self> {
        Ok(Self {
            window_ms: parse_env(&format!("{}_WINDOW_MS", prefix), default.window_ms)?,
            max: parse_env(&format!("{}_MAX", prefix), default.max)?,
            message: get_env_or_default(&format!("{}_MESSAGE", prefix), &default.message),
        })
    }

    fn validate(&self, name: &str) -> ConfigResult<()> {
        validate_duration_ms(&format!("rate limit bucket '{}' window", name), self.window_ms)?;
        if self.max == 0 {
            return Err(ConfigError::ValidationError(format!(
                "rate limit bucket '{}' must admit at least one event",
                name
            )));
        }
        Ok(())
    }
}

/// Settings for the three built-in buckets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Authentication attempts, keyed by client IP and caller id
    pub auth: BucketSettings,

    /// Password reset requests, keyed by the target account
    pub password_reset: BucketSettings,

    /// Registrations, keyed by client IP
    pub registration: BucketSettings,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            auth: BucketSettings::new(
                15 * 60 * 1000,
                5,
                "Too many authentication attempts. Please try again later.",
            ),
            password_reset: BucketSettings::new(
                60 * 60 * 1000,
                3,
                "Too many password reset requests. Please try again later.",
            ),
            registration: BucketSettings::new(
                60 * 60 * 1000,
                10,
                "Too many registration attempts. Please try again later.",
            ),
        }
    }
}

impl RateLimitSettings {
    /// Load bucket settings from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            auth: BucketSettings::from_env("RATE_LIMIT_AUTH", defaults.auth)?,
            password_reset: BucketSettings::from_env(
                "RATE_LIMIT_PASSWORD_RESET",
                defaults.password_reset,
            )?,
            registration: BucketSettings::from_env(
                "RATE_LIMIT_REGISTRATION",
                defaults.registration,
            )?,
        })
    }

    /// Validate every bucket
    pub fn validate(&self) -> ConfigResult<()> {
        self.auth.validate("auth")?;
        self.password_reset.validate("passwordReset")?;
        self.registration.validate("registration")
    }
}
