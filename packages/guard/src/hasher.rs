//! Identifier hashing
//!
//! Every stateful guard stores counters under a [`HashedKey`] rather than the
//! raw email, username or IP address. Keys are SHA-256 digests of the
//! normalised identifier (trimmed, lower-cased). Blank identifiers hash to the
//! `unknown` sentinel, so all callers without a usable identifier share one
//! counter instead of bypassing it.
//!
//! An optional pepper is mixed in ahead of the identifier. Without one, keys
//! derived from IPv4 addresses can be reversed by enumerating the address
//! space.

use std::fmt;

use sha2::{Digest, Sha256};

/// Identifier substituted for blank input
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Irreversible, fixed-width storage key (64 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashedKey(String);

impl HashedKey {
    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log fields
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for HashedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps caller identifiers to [`HashedKey`]s
#[derive(Clone, Default)]
pub struct IdentifierHasher {
    pepper: Option<Vec<u8>>,
}

impl fmt::Debug for IdentifierHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierHasher")
            .field("peppered", &self.pepper.is_some())
            .finish()
    }
}

impl IdentifierHasher {
    /// Create a hasher without a pepper
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hasher that mixes `pepper` into every digest
    pub fn with_pepper(pepper: impl AsRef<[u8]>) -> Self {
        Self {
            pepper: Some(pepper.as_ref().to_vec()),
        }
    }

    /// Hash an identifier after trimming and lower-casing it
    pub fn hash(&self, identifier: &str) -> HashedKey {
        let normalized = normalize(identifier);

        let mut hasher = Sha256::new();
        if let Some(pepper) = &self.pepper {
            hasher.update(pepper);
            hasher.update([0u8]);
        }
        hasher.update(normalized.as_bytes());
        HashedKey(format!("{:x}", hasher.finalize()))
    }
}

fn normalize(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        UNKNOWN_IDENTIFIER.to_string()
    } else {
        trimmed.to_lowercase()
    }
}
