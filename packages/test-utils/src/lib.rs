//! Shared test utilities for Turnstile workspace
//!
//! This crate provides fixtures and mock collaborators for exercising the
//! guards without a real user repository or transport.
//!
//! # Contents
//!
//! - [`MockCredentialStore`] - In-memory stand-in for the user repository
//!   that counts how often credentials were verified
//! - [`payloads`] - Dangerous and benign input corpora plus builders for
//!   nested variable payloads
//!
//! # Example
//!
//! ```rust
//! use turnstile_test_utils::MockCredentialStore;
//!
//! let store = MockCredentialStore::new().with_user("alice@example.com", "hunter2");
//!
//! assert!(store.verify("Alice@Example.com", "hunter2").is_some());
//! assert_eq!(store.verify_count(), 1);
//! ```

mod credentials;
pub mod payloads;

pub use credentials::MockCredentialStore;
