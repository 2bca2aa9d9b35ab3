//! Cached per-type credential tokens
//!
//! The API issues short-lived tokens that authorize write and login
//! operations. Tokens are session-scoped: login and logout invalidate the
//! whole cache. Staleness is not detected here; a caller that receives a
//! token-related API error clears the token explicitly and retries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token type required for write operations.
pub const TOKEN_CSRF: &str = "csrf";

/// Token type consumed by the password login flow.
pub const TOKEN_LOGIN: &str = "login";

/// Per-type cache of opaque token strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCache {
    tokens: HashMap<String, String>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token of the given type, if any.
    pub fn get(&self, token_type: &str) -> Option<&str> {
        self.tokens.get(token_type).map(String::as_str)
    }

    pub fn insert(&mut self, token_type: impl Into<String>, value: impl Into<String>) {
        self.tokens.insert(token_type.into(), value.into());
    }

    /// Removes the cached token of the given type.
    pub fn clear(&mut self, token_type: &str) {
        self.tokens.remove(token_type);
    }

    /// Removes every cached token.
    pub fn clear_all(&mut self) {
        self.tokens.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}
