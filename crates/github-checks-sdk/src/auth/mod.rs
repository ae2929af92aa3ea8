//! GitHub App authentication types and interfaces.
//!
//! This module provides the authentication building blocks for a GitHub App:
//! - ID types (GitHubAppId, InstallationId)
//! - Token types (JsonWebToken, InstallationToken)
//! - Key material (PrivateKey) and JWT claims
//! - The `AuthenticationProvider` and `TokenCache` seams
//!
//! Authenticating as an App is two-legged: a short-lived RS256 JWT proves the
//! app identity, and is exchanged for an installation-scoped access token
//! that is used for all repository operations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AuthError, CacheError, ValidationError};

pub mod cache;
pub mod jwt;
pub mod tokens;

pub use cache::InMemoryTokenCache;
pub use jwt::{JwtGenerator, RS256JwtGenerator};
pub use tokens::{AuthConfig, GitHubAppAuth};

// ============================================================================
// Core ID Types
// ============================================================================

/// GitHub App identifier assigned during app registration.
///
/// # Examples
///
/// ```
/// use github_checks_sdk::auth::GitHubAppId;
///
/// let app_id = GitHubAppId::new(123456);
/// assert_eq!(app_id.as_u64(), 123456);
/// assert_eq!(app_id.to_string(), "123456");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitHubAppId(u64);

impl GitHubAppId {
    /// Create a new GitHub App ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GitHubAppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GitHubAppId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "github_app_id".to_string(),
                message: "must be a positive integer".to_string(),
            })?;
        Ok(Self::new(id))
    }
}

/// GitHub App installation identifier for a specific account.
///
/// When a GitHub App is installed on an organization or user account, GitHub
/// assigns an installation ID. Installation tokens are requested per ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(u64);

impl InstallationId {
    /// Create a new installation ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstallationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstallationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "installation_id".to_string(),
                message: "must be a positive integer".to_string(),
            })?;
        Ok(Self::new(id))
    }
}

// ============================================================================
// Token Types
// ============================================================================

/// JWT token for GitHub App authentication.
///
/// App JWTs have a maximum lifetime of 10 minutes and are only used to call
/// app-level endpoints and to obtain installation tokens.
///
/// The token string is never exposed in Debug output.
///
/// # Examples
///
/// ```
/// use github_checks_sdk::auth::{JsonWebToken, GitHubAppId};
/// use chrono::{Utc, Duration};
///
/// let app_id = GitHubAppId::new(123);
/// let expires_at = Utc::now() + Duration::minutes(10);
/// let jwt = JsonWebToken::new("encoded.jwt.token".to_string(), app_id, expires_at);
///
/// assert!(!jwt.is_expired());
/// assert_eq!(jwt.app_id(), app_id);
/// ```
#[derive(Clone)]
pub struct JsonWebToken {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    app_id: GitHubAppId,
}

impl JsonWebToken {
    /// Create a new JWT token.
    pub fn new(token: String, app_id: GitHubAppId, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            issued_at: Utc::now(),
            expires_at,
            app_id,
        }
    }

    /// Get the token string for use in the `Authorization: Bearer` header.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the GitHub App ID this token represents.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    /// Get when this token was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get when this token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is currently expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token will expire within `margin`.
    pub fn expires_soon(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl std::fmt::Debug for JsonWebToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonWebToken")
            .field("app_id", &self.app_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Installation-scoped access token for GitHub API operations.
///
/// Installation tokens are valid for one hour. The token string is never
/// exposed in Debug output.
#[derive(Clone)]
pub struct InstallationToken {
    token: String,
    installation_id: InstallationId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    /// Create a new installation token.
    pub fn new(token: String, installation_id: InstallationId, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            installation_id,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    /// Get the token string for use in the `Authorization: Bearer` header.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the installation ID this token is for.
    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    /// Get when this token was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get when this token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is currently expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token will expire within `margin`.
    pub fn expires_soon(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("installation_id", &self.installation_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Key Material
// ============================================================================

/// Private key for JWT signing.
///
/// Holds PEM-encoded RSA key material. The key data is never exposed in
/// Debug output.
#[derive(Clone)]
pub struct PrivateKey {
    key_data: Vec<u8>,
    algorithm: KeyAlgorithm,
}

impl PrivateKey {
    /// Get the key data.
    pub fn key_data(&self) -> &[u8] {
        &self.key_data
    }

    /// Get the signing algorithm.
    pub fn algorithm(&self) -> &KeyAlgorithm {
        &self.algorithm
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("key_data", &"<REDACTED>")
            .finish()
    }
}

/// Key algorithm for JWT signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    RS256,
}

/// JWT claims structure for GitHub App authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Issuer (GitHub App ID)
    pub iss: GitHubAppId,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp, max 10 minutes in the future)
    pub exp: i64,
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// Source of the tokens used to authenticate GitHub API requests.
#[async_trait::async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Get an app-level JWT.
    async fn app_token(&self) -> Result<JsonWebToken, AuthError>;

    /// Get an installation token, reusing a cached one while it is fresh.
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError>;

    /// Get a new installation token, bypassing any cache.
    async fn refresh_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError>;
}

/// Interface for caching authentication tokens.
#[async_trait::async_trait]
pub trait TokenCache: Send + Sync {
    /// Get cached JWT token.
    async fn get_jwt(&self, app_id: GitHubAppId) -> Result<Option<JsonWebToken>, CacheError>;

    /// Store JWT token in cache.
    async fn store_jwt(&self, jwt: JsonWebToken) -> Result<(), CacheError>;

    /// Get cached installation token.
    async fn get_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<Option<InstallationToken>, CacheError>;

    /// Store installation token in cache.
    async fn store_installation_token(&self, token: InstallationToken) -> Result<(), CacheError>;

    /// Invalidate installation token.
    async fn invalidate_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<(), CacheError>;

    /// Drop expired tokens.
    fn cleanup_expired_tokens(&self);
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
