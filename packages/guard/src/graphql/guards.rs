//! Field guards
//!
//! ```ignore
//! #[Object]
//! impl AccountMutation {
//!     #[graphql(guard = "RateLimitGuard::registration()")]
//!     async fn create_user(&self, ctx: &Context<'_>, input: NewUser) -> Result<User> {
//!         // ...
//!     }
//! }
//! ```

use async_graphql::{Context, ErrorExtensions, Guard};
use serde_json::{json, Value};
use tracing::debug;

use crate::context::RequestContext;
use crate::lockout::AccountLockoutGuard;
use crate::rate_limit::{RateLimiter, AUTH_BUCKET, PASSWORD_RESET_BUCKET, REGISTRATION_BUCKET};

/// Counts the field call against a rate-limit bucket
///
/// The limiter and the caller's [`RequestContext`] are read from context
/// data. Without a limiter the guard lets every call through.
pub struct RateLimitGuard {
    bucket: String,
    args: Option<Value>,
}

impl RateLimitGuard {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            args: None,
        }
    }

    pub fn auth() -> Self {
        Self::new(AUTH_BUCKET)
    }

    pub fn registration() -> Self {
        Self::new(REGISTRATION_BUCKET)
    }

    /// Password reset bucket keyed on `target`
    pub fn password_reset(target: &str) -> Self {
        Self::new(PASSWORD_RESET_BUCKET).with_args(json!({ "email": target }))
    }

    /// Arguments used for key derivation, replacing the request's own
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }
}

impl Guard for RateLimitGuard {
    async fn check(&self, ctx: &Context<'_>) -> async_graphql::Result<()> {
        let Some(limiter) = ctx.data_opt::<RateLimiter>() else {
            debug!(bucket = %self.bucket, "Rate limiter not configured, skipping check");
            return Ok(());
        };

        let mut request = ctx.data_opt::<RequestContext>().cloned().unwrap_or_default();
        if let Some(args) = &self.args {
            request.args = args.clone();
        }

        limiter
            .enforce(&self.bucket, &request)
            .map(|_| ())
            .map_err(|e| {
                e.log();
                e.extend()
            })
    }
}

/// Rejects calls for a locked identifier
pub struct LockoutGuard {
    identifier: String,
}

impl LockoutGuard {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl Guard for LockoutGuard {
    async fn check(&self, ctx: &Context<'_>) -> async_graphql::Result<()> {
        let Some(lockout) = ctx.data_opt::<AccountLockoutGuard>() else {
            debug!("Lockout guard not configured, skipping check");
            return Ok(());
        };

        lockout.check_lockout(&self.identifier).map_err(|e| {
            e.log();
            e.extend()
        })
    }
}
