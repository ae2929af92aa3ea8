//! Error types for GitHub Checks SDK operations.
//!
//! This module defines the error types used throughout the SDK, with
//! classification for retry decisions and enough context for debugging.

use thiserror::Error;

use crate::auth::InstallationId;

/// Authentication-related errors with retry classification.
///
/// Covers failures while producing app JWTs and exchanging them for
/// installation access tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid private key format or data (non-retryable).
    #[error("Invalid private key: {message}")]
    InvalidPrivateKey { message: String },

    /// JWT generation failed (non-retryable).
    #[error("JWT generation failed: {message}")]
    JwtGenerationFailed { message: String },

    /// Installation not found or access denied (non-retryable).
    #[error("Installation {installation_id} not found or access denied")]
    InstallationNotFound { installation_id: InstallationId },

    /// GitHub refused to exchange the JWT for an installation token.
    #[error("Installation token exchange for {installation_id} failed: {status} - {message}")]
    TokenExchangeFailed {
        installation_id: InstallationId,
        status: u16,
        message: String,
    },

    /// Token cache operation failed.
    #[error("Token cache error: {0}")]
    CacheError(#[from] CacheError),

    /// Network connectivity or transport error.
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl AuthError {
    /// Check if this error represents a transient condition that may succeed if retried.
    ///
    /// Transient errors include network failures, server errors (5xx), rate
    /// limiting (429) and cache failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidPrivateKey { .. } => false,
            Self::JwtGenerationFailed { .. } => false,
            Self::InstallationNotFound { .. } => false,
            Self::TokenExchangeFailed { status, .. } => *status >= 500 || *status == 429,
            Self::CacheError(_) => true,
            Self::NetworkError(_) => true,
        }
    }
}

/// Errors during token caching operations.
///
/// Cache errors are non-fatal; callers fall back to requesting a fresh token.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A cache operation failed for a specific reason.
    #[error("Cache operation failed: {message}")]
    OperationFailed { message: String },
}

/// Errors during GitHub API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP error response from GitHub API.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Authentication to GitHub API failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Authorization check failed (insufficient permissions).
    #[error("Authorization failed")]
    AuthorizationFailed,

    /// The requested resource was not found.
    #[error("Resource not found")]
    NotFound,

    /// Obtaining a JWT or installation token failed before the request was sent.
    #[error("Token generation failed: {message}")]
    TokenGenerationFailed { message: String },

    /// The installation lookup succeeded but carried no installation id.
    #[error("Missing installation ID")]
    MissingInstallationId,

    /// No check run with the requested name exists on the commit.
    #[error("Check run '{name}' not found for sha {sha}")]
    CheckRunNotFound { name: String, sha: String },

    /// The client could not be constructed from its configuration.
    #[error("Client configuration error: {message}")]
    Configuration { message: String },

    /// Failed to parse JSON response from GitHub API.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error (network, TLS, etc.).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    /// Check if this error represents a transient condition that may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::AuthenticationFailed => false,
            Self::AuthorizationFailed => false,
            Self::NotFound => false,
            Self::TokenGenerationFailed { .. } => true,
            Self::MissingInstallationId => false,
            Self::CheckRunNotFound { .. } => false,
            Self::Configuration { .. } => false,
            Self::JsonError(_) => false,
            Self::HttpClientError(_) => true,
        }
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing.
    #[error("Required field missing: {field}")]
    Required { field: String },

    /// A field has an invalid format.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    /// A webhook signature header is malformed.
    #[error("Invalid signature format: {message}")]
    InvalidSignatureFormat { message: String },

    /// The HMAC could not be computed.
    #[error("HMAC computation failed: {message}")]
    HmacError { message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
