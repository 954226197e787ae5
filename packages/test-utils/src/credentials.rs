//! Mock credential store for login flow tests
//!
//! Lock poisoning is recovered with `unwrap_or_else(|e| e.into_inner())` so a
//! panicking test does not cascade into unrelated ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory user directory keyed by lower-cased identifier
///
/// Clones share the same users and the same verification counter, so a
/// clone can be moved into a verifier closure while the test keeps the
/// original for assertions.
#[derive(Clone, Default)]
pub struct MockCredentialStore {
    users: Arc<RwLock<HashMap<String, MockUser>>>,
    verify_count: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct MockUser {
    id: String,
    password: String,
}

impl MockCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, returning the store for chaining
    pub fn with_user(self, identifier: &str, password: &str) -> Self {
        self.insert(identifier, password);
        self
    }

    /// Add or replace a user; the user id is derived from the identifier
    pub fn insert(&self, identifier: &str, password: &str) {
        let key = identifier.trim().to_lowercase();
        let user = MockUser {
            id: format!("user-{}", key),
            password: password.to_string(),
        };
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(key, user);
    }

    /// Verify a password, returning the user id on success
    ///
    /// Unknown identifiers and wrong passwords both return `None`.
    pub fn verify(&self, identifier: &str, password: &str) -> Option<String> {
        self.verify_count.fetch_add(1, Ordering::SeqCst);

        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users
            .get(&identifier.trim().to_lowercase())
            .filter(|user| user.password == password)
            .map(|user| user.id.clone())
    }

    /// Number of verification calls made so far
    pub fn verify_count(&self) -> usize {
        self.verify_count.load(Ordering::SeqCst)
    }
}
