//! Per-identifier account lockout
//!
//! Failures for one identifier move it through four states:
//!
//! - **Clean**: no record
//! - **Warning**: fewer than `warn_after` failures in the attempt window
//! - **Alert**: from `warn_after` up to the threshold; every failure reports
//!   how many attempts remain
//! - **Locked**: threshold reached; `locked_until = now + lockout_duration`
//!
//! A success clears the record. A record whose attempt window has elapsed is
//! treated as Clean, unless its lock is still running. A failure recorded
//! after the attempt window starts a fresh count, even over a running lock.
//!
//! [`AccountLockoutGuard::check_lockout`] must run before credentials are
//! verified, so a locked caller never triggers verification work.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use turnstile_shared_config::LockoutSettings;

use crate::clock::{duration_from_millis, saturating_add, Clock};
use crate::error::{GuardError, GuardResult};
use crate::hasher::IdentifierHasher;
use crate::store::{Expiring, KeyedStore, StoreKey};

const NAMESPACE: &str = "lockout";

/// Failure history for one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginAttemptRecord {
    pub count: u32,
    pub first_attempt: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginAttemptRecord {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 1,
            first_attempt: now,
            last_attempt: now,
            locked_until: None,
        }
    }

    /// Active lock expiry, if the lock is still running at `now`
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.active_lock(now).is_some()
    }

    fn window_elapsed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.first_attempt > window
    }
}

impl Expiring for LoginAttemptRecord {
    fn is_stale(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now - self.last_attempt > horizon && !self.is_locked(now)
    }
}

/// What a recorded failure means for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the warning threshold
    Counted { attempts: u32 },
    /// In the Alert range; the caller should be told what is left
    AttemptsRemaining { remaining: u32 },
    /// This failure locked the identifier
    Locked {
        locked_until: DateTime<Utc>,
        remaining_minutes: i64,
    },
}

impl FailureOutcome {
    /// The rejection to hand back for a failed login
    ///
    /// A lock supersedes the invalid-credentials result.
    pub fn into_error(self) -> GuardError {
        match self {
            Self::Counted { .. } => GuardError::InvalidCredentials {
                remaining_attempts: None,
            },
            Self::AttemptsRemaining { remaining } => GuardError::InvalidCredentials {
                remaining_attempts: Some(remaining),
            },
            Self::Locked {
                locked_until,
                remaining_minutes,
            } => GuardError::AccountLocked {
                locked_until,
                remaining_minutes,
            },
        }
    }
}

/// Observable lockout state of one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Clean,
    Warning { failures: u32 },
    Alert { failures: u32, remaining: u32 },
    Locked { locked_until: DateTime<Utc> },
}

/// Tracks credential failures and locks identifiers that keep failing
#[derive(Clone)]
pub struct AccountLockoutGuard {
    records: Arc<KeyedStore<LoginAttemptRecord>>,
    settings: LockoutSettings,
    hasher: IdentifierHasher,
    clock: Arc<dyn Clock>,
}

impl AccountLockoutGuard {
    pub fn new(settings: LockoutSettings, hasher: IdentifierHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(KeyedStore::new()),
            settings,
            hasher,
            clock,
        }
    }

    pub fn settings(&self) -> &LockoutSettings {
        &self.settings
    }

    fn store_key(&self, identifier: &str) -> StoreKey {
        StoreKey::new(NAMESPACE, self.hasher.hash(identifier))
    }

    fn attempt_window(&self) -> Duration {
        duration_from_millis(self.settings.attempt_window_ms)
    }

    /// Reject if `identifier` is locked; forget its record once the attempt
    /// window has passed
    pub fn check_lockout(&self, identifier: &str) -> GuardResult<()> {
        let key = self.store_key(identifier);
        let now = self.clock.now();
        let window = self.attempt_window();

        self.records.mutate(key.clone(), |slot| {
            let Some(record) = *slot else {
                return Ok(());
            };

            if let Some(locked_until) = record.active_lock(now) {
                let remaining_minutes = remaining_minutes(locked_until, now);
                debug!(
                    key = %key.key().short(),
                    remaining_minutes = remaining_minutes,
                    "Rejected login for locked account"
                );
                return Err(GuardError::AccountLocked {
                    locked_until,
                    remaining_minutes,
                });
            }

            if record.window_elapsed(now, window) {
                *slot = None;
                debug!(key = %key.key().short(), "Attempt window elapsed, record reset");
            }
            Ok(())
        })
    }

    /// Count a failed verification for `identifier`
    ///
    /// The window alone decides between incrementing and starting over.
    pub fn record_failure(&self, identifier: &str) -> FailureOutcome {
        let key = self.store_key(identifier);
        let now = self.clock.now();
        let window = self.attempt_window();
        let max_attempts = self.settings.max_attempts;
        let lockout_duration = duration_from_millis(self.settings.lockout_duration_ms);

        let record = self.records.mutate(key.clone(), |slot| {
            let mut record = match *slot {
                Some(existing) if !existing.window_elapsed(now, window) => {
                    LoginAttemptRecord {
                        count: existing.count.saturating_add(1),
                        last_attempt: now,
                        ..existing
                    }
                }
                _ => LoginAttemptRecord::fresh(now),
            };

            if record.count >= max_attempts {
                record.locked_until = Some(saturating_add(now, lockout_duration));
            }
            *slot = Some(record);
            record
        });

        if let Some(locked_until) = record.active_lock(now) {
            warn!(
                key = %key.key().short(),
                failures = record.count,
                locked_until = %locked_until,
                "Account locked after repeated failed logins"
            );
            return FailureOutcome::Locked {
                locked_until,
                remaining_minutes: remaining_minutes(locked_until, now),
            };
        }

        debug!(key = %key.key().short(), failures = record.count, "Recorded failed login");
        if record.count >= self.settings.warn_after {
            FailureOutcome::AttemptsRemaining {
                remaining: max_attempts.saturating_sub(record.count),
            }
        } else {
            FailureOutcome::Counted {
                attempts: record.count,
            }
        }
    }

    /// Forget every failure for `identifier`
    pub fn clear(&self, identifier: &str) {
        let key = self.store_key(identifier);
        if self.records.remove(&key).is_some() {
            debug!(key = %key.key().short(), "Cleared login attempts");
        }
    }

    /// Current state of `identifier`, without side effects
    pub fn state(&self, identifier: &str) -> LockoutState {
        let now = self.clock.now();
        let Some(record) = self.records.get(&self.store_key(identifier)) else {
            return LockoutState::Clean;
        };

        if let Some(locked_until) = record.active_lock(now) {
            return LockoutState::Locked { locked_until };
        }
        if record.window_elapsed(now, self.attempt_window()) {
            return LockoutState::Clean;
        }
        if record.count >= self.settings.warn_after {
            LockoutState::Alert {
                failures: record.count,
                remaining: self.settings.max_attempts.saturating_sub(record.count),
            }
        } else {
            LockoutState::Warning {
                failures: record.count,
            }
        }
    }

    /// Drop records untouched for longer than the staleness horizon
    pub fn sweep(&self) -> usize {
        let horizon = duration_from_millis(self.settings.stale_after_ms);
        self.records.sweep_stale(self.clock.now(), horizon)
    }

    pub fn tracked_records(&self) -> usize {
        self.records.len()
    }
}

/// Whole minutes until `locked_until`, rounded up
fn remaining_minutes(locked_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (locked_until - now).num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}
