//! Guarded authentication flows
//!
//! [`LoginProtection`] strings the rate limiter and the lockout guard around
//! a caller-supplied credential check in the order the guards require:
//! throttle, refuse locked identifiers, verify, then record the outcome.

use std::future::Future;

use serde_json::json;
use tracing::{debug, instrument};

use crate::context::RequestContext;
use crate::error::{GuardError, GuardResult};
use crate::lockout::AccountLockoutGuard;
use crate::rate_limit::{RateLimiter, AUTH_BUCKET, PASSWORD_RESET_BUCKET, REGISTRATION_BUCKET};

/// Rate limiting and lockout for login, password reset and registration
#[derive(Clone)]
pub struct LoginProtection {
    limiter: RateLimiter,
    lockout: AccountLockoutGuard,
}

impl LoginProtection {
    pub fn new(limiter: RateLimiter, lockout: AccountLockoutGuard) -> Self {
        Self { limiter, lockout }
    }

    /// Run `verify` for `identifier` behind the auth bucket and the lockout
    ///
    /// `verify` resolves to `Ok(None)` for bad credentials. It is never
    /// called while the identifier is locked. Errors from `verify` are
    /// returned as [`GuardError::Internal`] and do not count as failures.
    #[instrument(skip_all)]
    pub async fn authenticate<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        identifier: &str,
        verify: F,
    ) -> GuardResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<T>>>,
    {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(GuardError::MissingIdentifier);
        }

        self.limiter.enforce(AUTH_BUCKET, ctx)?;
        self.lockout.check_lockout(identifier)?;

        match verify().await? {
            Some(verified) => {
                self.lockout.clear(identifier);
                debug!("Login succeeded");
                Ok(verified)
            }
            None => Err(self.lockout.record_failure(identifier).into_error()),
        }
    }

    /// Throttle password reset requests for `target`, returning the
    /// requests left in the window
    ///
    /// Counts against the target account regardless of which address the
    /// request came from.
    pub fn password_reset(&self, ctx: &RequestContext, target: &str) -> GuardResult<u32> {
        let target = target.trim();
        if target.is_empty() {
            return Err(GuardError::MissingIdentifier);
        }

        let ctx = ctx.clone().with_args(json!({ "email": target }));
        self.limiter.enforce(PASSWORD_RESET_BUCKET, &ctx)
    }

    /// Throttle registrations from the caller's address
    pub fn registration(&self, ctx: &RequestContext) -> GuardResult<u32> {
        self.limiter.enforce(REGISTRATION_BUCKET, ctx)
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn lockout(&self) -> &AccountLockoutGuard {
        &self.lockout
    }
}
