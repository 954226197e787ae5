//! Common test utilities for guard integration tests

#![allow(dead_code)]

use std::sync::Arc;

use turnstile_guard::{GuardSettings, IdentifierHasher, ManualClock, RequestContext, Turnstile};

/// A guard over default settings driven by a manual clock
pub fn guard() -> (Turnstile, ManualClock) {
    guard_with(GuardSettings::default())
}

/// A guard over `settings` driven by a manual clock
pub fn guard_with(settings: GuardSettings) -> (Turnstile, ManualClock) {
    let clock = ManualClock::default();
    let guard = Turnstile::new(settings, IdentifierHasher::new(), Arc::new(clock.clone()));
    (guard, clock)
}

/// Settings whose auth bucket never gets in the way of lockout tests
pub fn lenient_auth_settings() -> GuardSettings {
    let mut settings = GuardSettings::default();
    settings.rate_limit.auth.max = 1_000;
    settings
}

/// A caller at `ip`
pub fn caller(ip: &str) -> RequestContext {
    RequestContext::new().with_client_ip(ip)
}
