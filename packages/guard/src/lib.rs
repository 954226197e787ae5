//! Abuse prevention for authentication surfaces
//!
//! Turnstile sits in front of login, password reset and registration
//! handlers. It provides:
//!
//! - [`RateLimiter`] - fixed-window throttling per named bucket
//! - [`AccountLockoutGuard`] - escalating lockout after repeated failures
//! - [`InputSanitizer`] - denylist screening of untrusted variables
//! - [`LoginProtection`] - the three above wired around a credential check
//!
//! All state lives in memory, keyed by SHA-256 hashes of the identifiers,
//! and is evicted by background sweepers owned by [`Turnstile`].
//!
//! # Example
//!
//! ```rust,no_run
//! use turnstile_guard::{Config, RequestContext, Turnstile};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let guard = Turnstile::from_config(&config);
//! let sweepers = guard.spawn_sweepers();
//!
//! let ctx = RequestContext::new().with_client_ip("203.0.113.7");
//! let user = guard
//!     .login()
//!     .authenticate(&ctx, "alice@example.com", || async { Ok(Some("user-1")) })
//!     .await?;
//!
//! sweepers.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod graphql;
pub mod hasher;
pub mod lockout;
pub mod login;
pub mod middleware;
pub mod rate_limit;
pub mod sanitizer;
pub mod service;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use context::{extract_client_ip, RequestContext};
pub use error::{ErrorResponse, GuardError, GuardResult};
pub use hasher::{HashedKey, IdentifierHasher};
pub use lockout::{AccountLockoutGuard, FailureOutcome, LockoutState, LoginAttemptRecord};
pub use login::LoginProtection;
pub use rate_limit::{
    KeyDerivation, RateLimitBucket, RateLimitDecision, RateLimiter, AUTH_BUCKET,
    PASSWORD_RESET_BUCKET, REGISTRATION_BUCKET,
};
pub use sanitizer::{InputSanitizer, SignatureSet};
pub use service::Turnstile;
pub use store::{CounterEntry, CounterStore, InMemoryCounterStore, StoreError};
pub use sweeper::SweeperHandle;
pub use turnstile_shared_config::GuardSettings;
