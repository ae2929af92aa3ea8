//! # GitHub Checks SDK
//!
//! GitHub App integration for the check gateway.
//!
//! This SDK provides:
//! - GitHub App authentication with JWT and cached installation tokens
//! - App-level and installation-scoped API clients
//! - Checks API operations (list, create, update check runs)
//! - Webhook signature validation
//!
//! # Examples
//!
//! ## Working with Tokens
//!
//! ```rust
//! use github_checks_sdk::auth::{JsonWebToken, GitHubAppId};
//! use chrono::{Utc, Duration};
//!
//! let app_id = GitHubAppId::new(123);
//! let expires_at = Utc::now() + Duration::minutes(10);
//! let jwt = JsonWebToken::new("token".to_string(), app_id, expires_at);
//!
//! if jwt.expires_soon(Duration::minutes(5)) {
//!     println!("Token expires soon, should refresh");
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod webhook;

pub use error::{ApiError, AuthError, CacheError, ValidationError};

pub use auth::{
    AuthConfig, AuthenticationProvider, GitHubAppAuth, GitHubAppId, InstallationId,
    InstallationToken, JsonWebToken, PrivateKey,
};
pub use client::{
    CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus, ClientConfig,
    CreateCheckRunRequest, GitHubClient, InstallationClient, UpdateCheckRunRequest,
};
pub use webhook::SignatureValidator;
