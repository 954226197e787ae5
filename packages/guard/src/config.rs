//! Guard configuration

use std::env;

use anyhow::{bail, Context, Result};
use turnstile_shared_config::{Environment, GuardSettings};

/// Minimum pepper length accepted in production
const MIN_PEPPER_LENGTH: usize = 16;

/// Guard configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Bucket, lockout, sanitizer and sweep settings
    pub settings: GuardSettings,

    /// Secret mixed into every identifier hash (optional)
    pub hash_pepper: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("hash_pepper", &self.hash_pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Load `.env` if present, then read the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables
    ///
    /// `IDENTIFIER_HASH_PEPPER` is optional. Without it, hashed keys for
    /// low-entropy identifiers such as IPv4 addresses can be reversed by
    /// enumeration, so production logs a warning when it is missing.
    pub fn from_env() -> Result<Self> {
        let settings = GuardSettings::from_env().context("Failed to load guard settings")?;
        let hash_pepper = Self::load_hash_pepper(settings.environment)?;

        Ok(Self {
            settings,
            hash_pepper,
        })
    }

    fn load_hash_pepper(environment: Environment) -> Result<Option<String>> {
        match env::var("IDENTIFIER_HASH_PEPPER") {
            Ok(pepper) if !pepper.is_empty() => {
                if environment.is_production() && pepper.len() < MIN_PEPPER_LENGTH {
                    bail!(
                        "IDENTIFIER_HASH_PEPPER must be at least {} characters in production (got {})",
                        MIN_PEPPER_LENGTH,
                        pepper.len()
                    );
                }
                Ok(Some(pepper))
            }
            _ => {
                if environment.is_production() {
                    tracing::warn!(
                        "IDENTIFIER_HASH_PEPPER not set, identifier hashes are unkeyed. \
                         Set a secret pepper in production."
                    );
                }
                Ok(None)
            }
        }
    }

    pub fn environment(&self) -> Environment {
        self.settings.environment
    }

    pub fn is_production(&self) -> bool {
        self.settings.environment.is_production()
    }
}
