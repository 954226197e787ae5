//! Shared configuration types for Turnstile guards
//!
//! This crate provides the typed settings consumed by the rate limiter,
//! the account lockout guard, the input sanitizer and the background
//! sweepers. Every settings type can be loaded from environment variables
//! or built from its `Default`, which carries the recommended production
//! values.

mod error;
mod lockout;
mod rate_limit;
mod sanitizer;
mod sweep;

pub use error::{ConfigError, ConfigResult};
pub use lockout::LockoutSettings;
pub use rate_limit::{BucketSettings, RateLimitSettings};
pub use sanitizer::InputValidationSettings;
pub use sweep::SweepSettings;

use std::env;

use serde::{Deserialize, Serialize};

/// Upper bound for every configured duration: one year, in milliseconds
pub const MAX_DURATION_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Settings shared by every guard in a process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Per-bucket rate limits
    pub rate_limit: RateLimitSettings,

    /// Account lockout thresholds
    pub lockout: LockoutSettings,

    /// Input validation rules
    pub input_validation: InputValidationSettings,

    /// Background sweep cadence
    pub sweep: SweepSettings,

    /// Trust `X-Forwarded-For` / `X-Real-IP` when deriving the client address
    pub trust_proxy_headers: bool,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl GuardSettings {
    /// Load all guard settings from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let settings = Self {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            rate_limit: RateLimitSettings::from_env()?,
            lockout: LockoutSettings::from_env()?,
            input_validation: InputValidationSettings::from_env()?,
            sweep: SweepSettings::from_env()?,
            trust_proxy_headers: parse_env("TRUST_PROXY_HEADERS", false)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every nested settings block
    pub fn validate(&self) -> ConfigResult<()> {
        self.rate_limit.validate()?;
        self.lockout.validate()?;
        self.input_validation.validate()?;
        self.sweep.validate()
    }
}

/// Reject a duration setting that is zero or longer than [`MAX_DURATION_MS`]
pub fn validate_duration_ms(name: &str, value: u64) -> ConfigResult<()> {
    if value == 0 || value > MAX_DURATION_MS {
        return Err(ConfigError::ValidationError(format!(
            "{} must be between 1 and {} milliseconds, got {}",
            name, MAX_DURATION_MS, value
        )));
    }
    Ok(())
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

/// Helper function to read a comma-separated list, dropping blank items
pub fn parse_list_env(name: &str) -> Vec<String> {
    env::var(name)
        .map(|value| {
            value
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "prod".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "stage".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "anything".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(format!("{}", Environment::Production), "production");
        assert_eq!(format!("{}", Environment::Staging), "staging");
        assert_eq!(format!("{}", Environment::Development), "development");
    }

    #[test]
    fn test_parse_env_invalid_value() {
        temp_env::with_var("TURNSTILE_TEST_NUMBER", Some("five"), || {
            let result: ConfigResult<u32> = parse_env("TURNSTILE_TEST_NUMBER", 1);
            assert!(matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "TURNSTILE_TEST_NUMBER"));
        });
    }

    #[test]
    fn test_parse_env_default_when_unset() {
        temp_env::with_var_unset("TURNSTILE_TEST_UNSET", || {
            assert_eq!(parse_env("TURNSTILE_TEST_UNSET", 42u64).unwrap(), 42);
        });
    }

    #[test]
    fn test_parse_list_env() {
        temp_env::with_var("TURNSTILE_TEST_LIST", Some(" a, b ,,c "), || {
            assert_eq!(parse_list_env("TURNSTILE_TEST_LIST"), vec!["a", "b", "c"]);
        });
        temp_env::with_var_unset("TURNSTILE_TEST_LIST", || {
            assert!(parse_list_env("TURNSTILE_TEST_LIST").is_empty());
        });
    }

    #[test]
    fn test_guard_settings_from_env_defaults() {
        temp_env::with_vars_unset(
            [
                "ENVIRONMENT",
                "LOCKOUT_MAX_ATTEMPTS",
                "RATE_LIMIT_AUTH_MAX",
                "TRUST_PROXY_HEADERS",
            ],
            || {
                let settings = GuardSettings::from_env().unwrap();
                assert_eq!(settings.environment, Environment::Development);
                assert_eq!(settings.lockout.max_attempts, 5);
                assert_eq!(settings.rate_limit.auth.max, 5);
                assert!(!settings.trust_proxy_headers);
            },
        );
    }

    #[test]
    fn test_validate_duration_bounds() {
        assert!(validate_duration_ms("WINDOW_MS", 1).is_ok());
        assert!(validate_duration_ms("WINDOW_MS", MAX_DURATION_MS).is_ok());
        assert!(validate_duration_ms("WINDOW_MS", 0).is_err());
        assert!(matches!(
            validate_duration_ms("WINDOW_MS", MAX_DURATION_MS + 1),
            Err(ConfigError::ValidationError(msg)) if msg.starts_with("WINDOW_MS")
        ));
    }

    #[test]
    fn test_guard_settings_rejects_overflowing_window() {
        temp_env::with_var("RATE_LIMIT_AUTH_WINDOW_MS", Some(u64::MAX.to_string()), || {
            assert!(matches!(
                GuardSettings::from_env(),
                Err(ConfigError::ValidationError(_))
            ));
        });
    }

    #[test]
    fn test_guard_settings_rejects_invalid_combination() {
        temp_env::with_vars(
            [
                ("LOCKOUT_MAX_ATTEMPTS", Some("2")),
                ("LOCKOUT_WARN_AFTER", Some("3")),
            ],
            || {
                let result = GuardSettings::from_env();
                assert!(matches!(result, Err(ConfigError::ValidationError(_))));
            },
        );
    }
}
