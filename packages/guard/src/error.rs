//! Guard failure taxonomy
//!
//! Every guard decision that stops a request is a [`GuardError`] variant
//! carrying the metadata a collaborator needs to render it: a retry delay,
//! a lock expiry, the remaining attempts or the offending payload path.
//! Rejections are recoverable from the guard's point of view; the caller
//! decides whether to abort. `Store`, `Serialization` and `Internal` are the
//! only unexpected failures.
//!
//! Errors render either as an HTTP response (via Axum's `IntoResponse`) or
//! as an `async_graphql::Error` with extensions (via `ErrorExtensions`).

use async_graphql::ErrorExtensions;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Guard rejections and internal failures
#[derive(Error, Debug)]
pub enum GuardError {
    // ========== Rejections ==========
    /// Too many events in the bucket's current window
    #[error("{message}")]
    RateLimitExceeded {
        bucket: String,
        retry_after_secs: u64,
        message: String,
    },

    /// The identifier is locked after repeated failures
    #[error("Account is locked. Please try again in {remaining_minutes} minutes.")]
    AccountLocked {
        locked_until: DateTime<Utc>,
        remaining_minutes: i64,
    },

    /// Credentials did not verify; past the warning threshold the remaining
    /// attempts before lockout are included
    #[error("{}", invalid_credentials_message(.remaining_attempts))]
    InvalidCredentials { remaining_attempts: Option<u32> },

    /// A payload string matched a dangerous content signature
    #[error("Potentially dangerous content detected in {path}")]
    DangerousInput { path: String, signature: String },

    /// Neither a username nor an email was supplied
    #[error("username or email is required")]
    MissingIdentifier,

    // ========== Internal ==========
    /// Counter store failure
    #[error("counter store error: {0}")]
    Store(#[from] StoreError),

    /// Variables could not be converted for scanning
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected failure, including credential verifier errors
    #[error("internal error: {0}")]
    Internal(String),
}

fn invalid_credentials_message(remaining_attempts: &Option<u32>) -> String {
    match remaining_attempts {
        Some(remaining) => format!(
            "Invalid credentials. {} attempts remaining before account lockout.",
            remaining
        ),
        None => "Invalid credentials".to_string(),
    }
}

impl GuardError {
    /// HTTP status for REST collaborators
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::AccountLocked { .. } => StatusCode::LOCKED,
            Self::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            Self::DangerousInput { .. } | Self::MissingIdentifier => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::AccountLocked { .. } => "ACCOUNT_LOCKED",
            Self::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            Self::DangerousInput { .. } => "DANGEROUS_INPUT",
            Self::MissingIdentifier => "USERNAME_OR_EMAIL_REQUIRED",
            Self::Store(_) => "STORE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this is a guard decision rather than an internal failure
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Store(_) | Self::Serialization(_) | Self::Internal(_)
        )
    }

    /// Machine-readable metadata for the rejection
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::RateLimitExceeded {
                bucket,
                retry_after_secs,
                ..
            } => Some(json!({ "bucket": bucket, "retryAfter": retry_after_secs })),
            Self::AccountLocked {
                locked_until,
                remaining_minutes,
            } => Some(json!({
                "lockedUntil": locked_until.to_rfc3339(),
                "remainingMinutes": remaining_minutes,
            })),
            Self::InvalidCredentials {
                remaining_attempts: Some(remaining),
            } => Some(json!({ "remainingAttempts": remaining })),
            Self::DangerousInput { path, signature } => {
                Some(json!({ "path": path, "signature": signature }))
            }
            _ => None,
        }
    }

    /// Log the error with severity based on its kind
    pub fn log(&self) {
        if self.is_rejection() {
            tracing::debug!(error = %self, code = self.error_code(), "Guard rejected request");
        } else {
            tracing::error!(error = %self, code = self.error_code(), "Guard failure");
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
            details: self.details(),
        };

        if let Self::RateLimitExceeded {
            retry_after_secs, ..
        } = &self
        {
            return (
                status,
                [("Retry-After", retry_after_secs.to_string())],
                Json(body),
            )
                .into_response();
        }

        (status, Json(body)).into_response()
    }
}

impl ErrorExtensions for GuardError {
    fn extend(&self) -> async_graphql::Error {
        let message = if self.is_rejection() {
            self.to_string()
        } else {
            // Internal details stay in the logs
            "An unexpected error occurred".to_string()
        };

        async_graphql::Error::new(message).extend_with(|_, e| {
            e.set("code", self.error_code());
            match self {
                Self::RateLimitExceeded {
                    retry_after_secs, ..
                } => e.set("retryAfter", *retry_after_secs),
                Self::AccountLocked {
                    locked_until,
                    remaining_minutes,
                } => {
                    e.set("lockedUntil", locked_until.timestamp_millis());
                    e.set("remainingMinutes", *remaining_minutes);
                }
                Self::InvalidCredentials {
                    remaining_attempts: Some(remaining),
                } => e.set("remainingAttempts", *remaining),
                Self::DangerousInput { path, signature } => {
                    e.set("path", path.as_str());
                    e.set("signature", signature.as_str());
                }
                _ => {}
            }
        })
    }
}

/// Result type alias for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

impl From<anyhow::Error> for GuardError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<GuardError>() {
            Ok(guard_err) => guard_err,
            Err(err) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GuardError::RateLimitExceeded {
                bucket: "auth".to_string(),
                retry_after_secs: 60,
                message: "slow down".to_string(),
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GuardError::AccountLocked {
                locked_until: Utc::now(),
                remaining_minutes: 30,
            }
            .status_code(),
            StatusCode::LOCKED
        );
        assert_eq!(
            GuardError::InvalidCredentials {
                remaining_attempts: None
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GuardError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_credentials_messages() {
        let plain = GuardError::InvalidCredentials {
            remaining_attempts: None,
        };
        assert_eq!(plain.to_string(), "Invalid credentials");

        let warned = GuardError::InvalidCredentials {
            remaining_attempts: Some(2),
        };
        assert_eq!(
            warned.to_string(),
            "Invalid credentials. 2 attempts remaining before account lockout."
        );
    }

    #[test]
    fn test_rejection_classification() {
        assert!(GuardError::MissingIdentifier.is_rejection());
        assert!(GuardError::DangerousInput {
            path: "variables.name".to_string(),
            signature: "script-tag".to_string(),
        }
        .is_rejection());
        assert!(!GuardError::Internal("boom".to_string()).is_rejection());
    }

    #[test]
    fn test_graphql_extensions_for_rate_limit() {
        let err = GuardError::RateLimitExceeded {
            bucket: "auth".to_string(),
            retry_after_secs: 42,
            message: "Too many authentication attempts. Please try again later.".to_string(),
        }
        .extend();

        assert_eq!(
            err.message,
            "Too many authentication attempts. Please try again later."
        );
        let extensions = err.extensions.expect("extensions set");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("RATE_LIMIT_EXCEEDED"))
        );
        assert_eq!(
            extensions.get("retryAfter"),
            Some(&async_graphql::Value::from(42u64))
        );
    }

    #[test]
    fn test_graphql_extensions_hide_internal_details() {
        let err = GuardError::Internal("db password leaked".to_string()).extend();
        assert_eq!(err.message, "An unexpected error occurred");
    }

    #[test]
    fn test_details_for_dangerous_input() {
        let err = GuardError::DangerousInput {
            path: "variables.input.bio".to_string(),
            signature: "script-tag".to_string(),
        };
        assert_eq!(
            err.details(),
            Some(json!({ "path": "variables.input.bio", "signature": "script-tag" }))
        );
    }
}
