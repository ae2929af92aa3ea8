//! In-process token cache.
//!
//! Tokens are keyed by app ID (JWTs) or installation ID (installation
//! tokens). Expired entries are never handed out; they are dropped on read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use super::{GitHubAppId, InstallationId, InstallationToken, JsonWebToken, TokenCache};
use crate::error::CacheError;

trait Expiring: Clone {
    fn is_expired(&self) -> bool;
}

impl Expiring for JsonWebToken {
    fn is_expired(&self) -> bool {
        JsonWebToken::is_expired(self)
    }
}

impl Expiring for InstallationToken {
    fn is_expired(&self) -> bool {
        InstallationToken::is_expired(self)
    }
}

struct TokenSlot<K, T> {
    entries: RwLock<HashMap<K, T>>,
}

impl<K: Eq + Hash + Copy, T: Expiring> TokenSlot<K, T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: K) -> Result<Option<T>, CacheError> {
        let mut entries = self.entries.write().map_err(|e| CacheError::OperationFailed {
            message: format!("Failed to acquire write lock: {}", e),
        })?;

        match entries.get(&key) {
            Some(token) if token.is_expired() => {
                entries.remove(&key);
                Ok(None)
            }
            Some(token) => Ok(Some(token.clone())),
            None => Ok(None),
        }
    }

    fn put(&self, key: K, token: T) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|e| CacheError::OperationFailed {
            message: format!("Failed to acquire write lock: {}", e),
        })?;
        entries.insert(key, token);
        Ok(())
    }

    fn remove(&self, key: K) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|e| CacheError::OperationFailed {
            message: format!("Failed to acquire write lock: {}", e),
        })?;
        entries.remove(&key);
        Ok(())
    }

    fn retain_valid(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, token| !token.is_expired());
        }
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

/// In-memory token cache.
///
/// Thread-safe; one instance is shared by every request that authenticates
/// as the same GitHub App.
pub struct InMemoryTokenCache {
    jwts: TokenSlot<GitHubAppId, JsonWebToken>,
    installation_tokens: TokenSlot<InstallationId, InstallationToken>,
}

impl InMemoryTokenCache {
    /// Create a new in-memory token cache.
    pub fn new() -> Self {
        Self {
            jwts: TokenSlot::new(),
            installation_tokens: TokenSlot::new(),
        }
    }

    /// Number of installation tokens currently held, expired or not.
    pub fn installation_token_count(&self) -> usize {
        self.installation_tokens.len()
    }
}

impl Default for InMemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get_jwt(&self, app_id: GitHubAppId) -> Result<Option<JsonWebToken>, CacheError> {
        self.jwts.get(app_id)
    }

    async fn store_jwt(&self, jwt: JsonWebToken) -> Result<(), CacheError> {
        self.jwts.put(jwt.app_id(), jwt)
    }

    async fn get_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<Option<InstallationToken>, CacheError> {
        self.installation_tokens.get(installation_id)
    }

    async fn store_installation_token(&self, token: InstallationToken) -> Result<(), CacheError> {
        self.installation_tokens.put(token.installation_id(), token)
    }

    async fn invalidate_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<(), CacheError> {
        self.installation_tokens.remove(installation_id)
    }

    fn cleanup_expired_tokens(&self) {
        self.jwts.retain_valid();
        self.installation_tokens.retain_valid();
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
