//! Fixed-window rate limiting
//!
//! Each named bucket has its own window, ceiling and key derivation. A call
//! derives the caller's key, hashes it, and atomically bumps the counter for
//! `(bucket, key)`; it is rejected once the count exceeds the ceiling.
//!
//! Windows are fixed, not sliding: the counter resets at `reset_at` rather
//! than continuously. A burst straddling a window boundary can therefore
//! admit up to `2 × max` events. This is accepted in exchange for O(1)
//! memory per key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use turnstile_shared_config::{BucketSettings, RateLimitSettings};

use crate::clock::{duration_from_millis, Clock};
use crate::context::RequestContext;
use crate::error::{GuardError, GuardResult};
use crate::hasher::{HashedKey, IdentifierHasher, UNKNOWN_IDENTIFIER};
use crate::store::{CounterStore, StoreError};

/// Authentication attempts
pub const AUTH_BUCKET: &str = "auth";
/// Password reset requests
pub const PASSWORD_RESET_BUCKET: &str = "passwordReset";
/// Account registrations
pub const REGISTRATION_BUCKET: &str = "registration";

const ANONYMOUS_USER: &str = "anonymous";
const DEFAULT_MESSAGE: &str = "Too many requests, please try again later.";

/// How a bucket turns a request into the identifier it counts against
#[derive(Clone)]
pub enum KeyDerivation {
    /// `"{ip}-{user}"`, falling back to `unknown` and `anonymous`
    ClientAndUser,
    /// Client IP only
    ClientIp,
    /// First non-blank string argument among `fields`. Keys on the account
    /// being targeted rather than on the caller, so rotating IPs does not
    /// reset the limit.
    TargetIdentifier { fields: Vec<String> },
    /// Caller-supplied derivation; the result is still hashed
    Custom(Arc<dyn Fn(&RequestContext) -> String + Send + Sync>),
}

impl KeyDerivation {
    /// Target identifier read from the `email` then `username` arguments
    pub fn target_identifier() -> Self {
        Self::TargetIdentifier {
            fields: vec!["email".to_string(), "username".to_string()],
        }
    }

    /// Derive and hash the key for `ctx`
    pub fn derive(&self, ctx: &RequestContext, hasher: &IdentifierHasher) -> HashedKey {
        let ip = ctx.client_ip.as_deref().unwrap_or(UNKNOWN_IDENTIFIER);
        match self {
            Self::ClientAndUser => {
                let user = ctx.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
                hasher.hash(&format!("{}-{}", ip, user))
            }
            Self::ClientIp => hasher.hash(ip),
            Self::TargetIdentifier { fields } => {
                hasher.hash(ctx.string_arg(fields).unwrap_or(UNKNOWN_IDENTIFIER))
            }
            Self::Custom(derive) => hasher.hash(&derive(ctx)),
        }
    }
}

impl fmt::Debug for KeyDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientAndUser => f.write_str("ClientAndUser"),
            Self::ClientIp => f.write_str("ClientIp"),
            Self::TargetIdentifier { fields } => f
                .debug_struct("TargetIdentifier")
                .field("fields", fields)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Configuration of one rate-limit namespace
#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    pub name: String,
    pub window: Duration,
    pub max: u32,
    pub message: String,
    pub key: KeyDerivation,
}

impl RateLimitBucket {
    /// Bucket keyed by client and caller with the generic message
    pub fn new(name: impl Into<String>, window_ms: u64, max: u32) -> Self {
        Self {
            name: name.into(),
            window: duration_from_millis(window_ms),
            max,
            message: DEFAULT_MESSAGE.to_string(),
            key: KeyDerivation::ClientAndUser,
        }
    }

    /// Bucket from loaded settings
    pub fn from_settings(
        name: impl Into<String>,
        settings: &BucketSettings,
        key: KeyDerivation,
    ) -> Self {
        Self::new(name, settings.window_ms, settings.max)
            .with_message(settings.message.clone())
            .with_key(key)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_key(mut self, key: KeyDerivation) -> Self {
        self.key = key;
        self
    }

    /// Authentication attempts: 15 minutes / 5 by default, keyed by IP and caller
    pub fn auth(settings: &RateLimitSettings) -> Self {
        Self::from_settings(AUTH_BUCKET, &settings.auth, KeyDerivation::ClientAndUser)
    }

    /// Password resets: 1 hour / 3 by default, keyed by the target account
    pub fn password_reset(settings: &RateLimitSettings) -> Self {
        Self::from_settings(
            PASSWORD_RESET_BUCKET,
            &settings.password_reset,
            KeyDerivation::target_identifier(),
        )
    }

    /// Registrations: 1 hour / 10 by default, keyed by IP
    pub fn registration(settings: &RateLimitSettings) -> Self {
        Self::from_settings(
            REGISTRATION_BUCKET,
            &settings.registration,
            KeyDerivation::ClientIp,
        )
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The event was counted and admitted
    Allowed {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    /// The bucket is exhausted until `reset_at`
    Limited {
        retry_after_secs: u64,
        reset_at: DateTime<Utc>,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Rate limiter over a shared counter store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    buckets: Arc<HashMap<String, RateLimitBucket>>,
    hasher: IdentifierHasher,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter with no buckets
    pub fn new(store: Arc<dyn CounterStore>, hasher: IdentifierHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            buckets: Arc::new(HashMap::new()),
            hasher,
            clock,
        }
    }

    /// Create a limiter with the auth, password-reset and registration buckets
    pub fn with_defaults(
        settings: &RateLimitSettings,
        store: Arc<dyn CounterStore>,
        hasher: IdentifierHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(store, hasher, clock)
            .with_bucket(RateLimitBucket::auth(settings))
            .with_bucket(RateLimitBucket::password_reset(settings))
            .with_bucket(RateLimitBucket::registration(settings))
    }

    /// Add or replace a bucket
    pub fn with_bucket(mut self, bucket: RateLimitBucket) -> Self {
        Arc::make_mut(&mut self.buckets).insert(bucket.name.clone(), bucket);
        self
    }

    /// Look up a bucket by name
    pub fn bucket(&self, name: &str) -> Option<&RateLimitBucket> {
        self.buckets.get(name)
    }

    /// Count one event against `bucket` and decide whether it is admitted
    pub fn check(&self, bucket: &str, ctx: &RequestContext) -> GuardResult<RateLimitDecision> {
        let config = self
            .buckets
            .get(bucket)
            .ok_or_else(|| GuardError::Internal(format!("unknown rate limit bucket '{}'", bucket)))?;

        let key = config.key.derive(ctx, &self.hasher);
        let now = self.clock.now();
        let entry = self
            .store
            .increment_or_create(&config.name, &key, now, config.window)?;

        if entry.count > config.max {
            let retry_after_secs = retry_after_secs(entry.reset_at, now);
            warn!(
                bucket = %config.name,
                key = %key.short(),
                count = entry.count,
                retry_after = retry_after_secs,
                "Rate limit exceeded"
            );
            return Ok(RateLimitDecision::Limited {
                retry_after_secs,
                reset_at: entry.reset_at,
            });
        }

        let remaining = config.max - entry.count;
        debug!(
            bucket = %config.name,
            key = %key.short(),
            remaining = remaining,
            "Rate limit check passed"
        );
        Ok(RateLimitDecision::Allowed {
            remaining,
            reset_at: entry.reset_at,
        })
    }

    /// Like [`check`](Self::check), but a limited call becomes
    /// [`GuardError::RateLimitExceeded`] carrying the bucket's message
    pub fn enforce(&self, bucket: &str, ctx: &RequestContext) -> GuardResult<u32> {
        match self.check(bucket, ctx)? {
            RateLimitDecision::Allowed { remaining, .. } => Ok(remaining),
            RateLimitDecision::Limited {
                retry_after_secs, ..
            } => Err(self.rejection(bucket, retry_after_secs)),
        }
    }

    /// The error reported for a limited call to `bucket`
    pub fn rejection(&self, bucket: &str, retry_after_secs: u64) -> GuardError {
        let message = self
            .bucket(bucket)
            .map(|b| b.message.clone())
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        GuardError::RateLimitExceeded {
            bucket: bucket.to_string(),
            retry_after_secs,
            message,
        }
    }

    /// Evict counters whose window has closed
    pub fn sweep(&self) -> Result<usize, StoreError> {
        self.store.sweep(self.clock.now(), Duration::zero())
    }

    /// Number of live or not-yet-swept counters
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// Whole seconds until `reset_at`, rounded up
fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}
