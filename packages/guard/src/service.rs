//! The guard aggregate
//!
//! [`Turnstile`] owns the counter store, the lockout records and the
//! sanitizer for one process. Construct it at startup, hand clones to
//! request handlers, and stop its sweepers on shutdown. Separate instances
//! share nothing, so tests can run isolated guards side by side.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;
use turnstile_shared_config::GuardSettings;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::hasher::IdentifierHasher;
use crate::lockout::AccountLockoutGuard;
use crate::login::LoginProtection;
use crate::rate_limit::RateLimiter;
use crate::sanitizer::InputSanitizer;
use crate::store::{CounterStore, InMemoryCounterStore};
use crate::sweeper::{spawn_sweeper, SweepStats, SweeperHandle};

#[derive(Clone)]
pub struct Turnstile {
    settings: GuardSettings,
    limiter: RateLimiter,
    lockout: AccountLockoutGuard,
    sanitizer: InputSanitizer,
}

impl Turnstile {
    /// Build every guard over a fresh in-memory counter store
    ///
    /// `settings` are used as given; run [`GuardSettings::validate`] first
    /// when they did not come from [`GuardSettings::from_env`]. Durations
    /// past the representable range saturate rather than panic.
    pub fn new(settings: GuardSettings, hasher: IdentifierHasher, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(settings, Arc::new(InMemoryCounterStore::new()), hasher, clock)
    }

    /// Build every guard over an existing counter store
    pub fn with_store(
        settings: GuardSettings,
        store: Arc<dyn CounterStore>,
        hasher: IdentifierHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter =
            RateLimiter::with_defaults(&settings.rate_limit, store, hasher.clone(), clock.clone());
        let lockout = AccountLockoutGuard::new(settings.lockout, hasher, clock);
        let sanitizer = InputSanitizer::new(settings.input_validation.clone());

        Self {
            settings,
            limiter,
            lockout,
            sanitizer,
        }
    }

    /// Build from loaded configuration with the wall clock
    pub fn from_config(config: &Config) -> Self {
        let hasher = match &config.hash_pepper {
            Some(pepper) => IdentifierHasher::with_pepper(pepper),
            None => IdentifierHasher::new(),
        };
        Self::new(config.settings.clone(), hasher, Arc::new(SystemClock))
    }

    /// Replace the sanitizer, e.g. to add a custom validator
    pub fn with_sanitizer(mut self, sanitizer: InputSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Replace the rate limiter, e.g. to add buckets
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn lockout(&self) -> &AccountLockoutGuard {
        &self.lockout
    }

    pub fn sanitizer(&self) -> &InputSanitizer {
        &self.sanitizer
    }

    /// Login, password reset and registration protection over these guards
    pub fn login(&self) -> LoginProtection {
        LoginProtection::new(self.limiter.clone(), self.lockout.clone())
    }

    /// Start the counter and lockout sweepers on the current runtime
    pub fn spawn_sweepers(&self) -> SweeperHandle {
        let token = CancellationToken::new();
        let sweep = &self.settings.sweep;

        let limiter = self.limiter.clone();
        let counters = spawn_sweeper(
            "rate-limit",
            Duration::from_millis(sweep.rate_limit_interval_ms),
            token.clone(),
            move || {
                let removed = limiter.sweep()?;
                Ok(SweepStats {
                    removed,
                    remaining: limiter.tracked_keys(),
                })
            },
        );

        let lockout = self.lockout.clone();
        let records = spawn_sweeper(
            "lockout",
            Duration::from_millis(sweep.lockout_interval_ms),
            token.clone(),
            move || {
                Ok(SweepStats {
                    removed: lockout.sweep(),
                    remaining: lockout.tracked_records(),
                })
            },
        );

        info!(environment = %self.settings.environment, "Guard sweepers spawned");
        SweeperHandle::new(token, vec![counters, records])
    }
}
