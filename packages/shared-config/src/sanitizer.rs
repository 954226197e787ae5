//! Input validation settings

use serde::{Deserialize, Serialize};

use crate::{parse_env, parse_list_env, ConfigError, ConfigResult};

/// Rules for scanning externally supplied variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValidationSettings {
    /// Whether variables are scanned at all
    pub enabled: bool,

    /// Operation names that bypass scanning
    pub skip_operations: Vec<String>,

    /// Top-level variable names that bypass scanning
    pub skip_fields: Vec<String>,

    /// Log rejected payload paths at warn level
    pub log_errors: bool,

    /// Deepest nesting accepted before the payload is rejected
    pub max_depth: usize,
}

impl Default for InputValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_operations: Vec::new(),
            skip_fields: Vec::new(),
            log_errors: false,
            max_depth: 64,
        }
    }
}

impl InputValidationSettings {
    /// Load input validation settings from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: parse_env("INPUT_VALIDATION_ENABLED", defaults.enabled)?,
            skip_operations: parse_list_env("INPUT_VALIDATION_SKIP_OPERATIONS"),
            skip_fields: parse_list_env("INPUT_VALIDATION_SKIP_FIELDS"),
            log_errors: parse_env("INPUT_VALIDATION_LOG_ERRORS", defaults.log_errors)?,
            max_depth: parse_env("INPUT_VALIDATION_MAX_DEPTH", defaults.max_depth)?,
        })
    }

    /// Validate settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "INPUT_VALIDATION_MAX_DEPTH must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
