//! Idempotency ledger for GitHub mutations.
//!
//! Both ingress flows mutate GitHub at most once per logical key. The first
//! caller atomically claims the key with [`DedupStore::set_if_absent`]; any
//! later caller sees the claim and skips the mutation. If the mutation fails
//! the claim is released so a retry can succeed.
//!
//! Store errors always propagate. A store that cannot answer is never treated
//! as "not a duplicate".

use async_trait::async_trait;
use github_checks_sdk::{CheckConclusion, CheckRunStatus};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::Timestamp;

// ============================================================================
// Store Trait
// ============================================================================

/// Key-value store with per-key expiry.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Read a key, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, DedupStoreError>;

    /// Write a key unconditionally.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DedupStoreError>;

    /// Write a key only if it is absent.
    ///
    /// Returns `true` when this call wrote the key.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, DedupStoreError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), DedupStoreError>;
}

// ============================================================================
// Keys
// ============================================================================

/// A dedup ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    /// Key for one check-run update: `check:{id}:{status}:{conclusion|none}`.
    pub fn check_run_update(
        check_run_id: u64,
        status: CheckRunStatus,
        conclusion: Option<CheckConclusion>,
    ) -> Self {
        let conclusion = conclusion.map(|c| c.as_str()).unwrap_or("none");
        Self(format!("check:{}:{}:{}", check_run_id, status, conclusion))
    }

    /// Key for check-run creation on a commit: `checks-created:{sha}`.
    pub fn checks_created(head_sha: &str) -> Self {
        Self(format!("checks-created:{}", head_sha))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Claim Helper
// ============================================================================

/// Outcome of [`perform_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claimed<T> {
    /// This caller claimed the key and the operation succeeded.
    Performed(T),
    /// The key was already claimed; the operation did not run.
    Duplicate,
}

/// Failure of [`perform_once`].
#[derive(Debug, thiserror::Error)]
pub enum ClaimError<E> {
    /// The store could not be consulted; the operation did not run.
    #[error("Dedup store error: {0}")]
    Store(#[source] DedupStoreError),

    /// The operation ran and failed; the claim was released.
    #[error("Operation failed: {0}")]
    Operation(E),
}

/// Run `operation` at most once per `key` within `ttl`.
///
/// The key is claimed before the operation runs. On operation failure the
/// claim is released (best effort) and the operation error is returned.
pub async fn perform_once<T, E, F, Fut>(
    store: &dyn DedupStore,
    key: &DedupKey,
    ttl: Duration,
    operation: F,
) -> Result<Claimed<T>, ClaimError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let claimed_at = Timestamp::now().to_rfc3339();
    let claimed = store
        .set_if_absent(key.as_str(), &claimed_at, ttl)
        .await
        .map_err(ClaimError::Store)?;

    if !claimed {
        debug!(key = %key, "Dedup key already claimed, skipping");
        return Ok(Claimed::Duplicate);
    }

    match operation().await {
        Ok(value) => Ok(Claimed::Performed(value)),
        Err(e) => {
            if let Err(release_error) = store.delete(key.as_str()).await {
                warn!(
                    key = %key,
                    error = %release_error,
                    "Failed to release dedup claim after operation failure"
                );
            }
            Err(ClaimError::Operation(e))
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors from a dedup store backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DedupStoreError {
    #[error("Dedup store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Dedup store request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Dedup store rejected command: {message}")]
    CommandRejected { message: String },

    #[error("Invalid dedup store response: {message}")]
    InvalidResponse { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DedupStoreError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            DedupStoreError::Unavailable { .. } | DedupStoreError::Internal { .. } => true,
            DedupStoreError::RequestFailed { status, .. } => *status >= 500 || *status == 429,
            DedupStoreError::CommandRejected { .. } | DedupStoreError::InvalidResponse { .. } => {
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
