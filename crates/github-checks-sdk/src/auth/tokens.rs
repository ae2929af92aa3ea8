//! GitHub App token management and `AuthenticationProvider` implementation.
//!
//! `GitHubAppAuth` signs app JWTs and exchanges them for installation access
//! tokens at `POST /app/installations/{id}/access_tokens`. Both kinds of
//! token are cached and reissued a little before GitHub would expire them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    AuthenticationProvider, GitHubAppId, InMemoryTokenCache, InstallationId, InstallationToken,
    JsonWebToken, JwtGenerator, PrivateKey, RS256JwtGenerator, TokenCache,
};
use crate::error::AuthError;

/// Configuration for authentication behavior.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT refresh margin (reissue if the cached JWT expires in this window)
    pub jwt_refresh_margin: Duration,

    /// Installation token refresh margin (re-exchange inside this window)
    pub token_refresh_margin: Duration,

    /// GitHub API endpoint (for GitHub Enterprise support)
    pub github_api_url: String,

    /// User agent for GitHub API requests
    pub user_agent: String,

    /// Timeout for the token exchange request
    pub timeout: std::time::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_refresh_margin: Duration::minutes(2),
            token_refresh_margin: Duration::minutes(5),
            github_api_url: "https://api.github.com".to_string(),
            user_agent: "check-gateway".to_string(),
            timeout: std::time::Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// GitHub App authentication provider.
///
/// One instance exists per GitHub App. It is cheap to share behind an `Arc`
/// and safe to call concurrently; two concurrent misses for the same
/// installation may both perform an exchange, and the later one wins the
/// cache slot.
pub struct GitHubAppAuth {
    app_id: GitHubAppId,
    jwt_generator: Arc<dyn JwtGenerator>,
    token_cache: Arc<dyn TokenCache>,
    http_client: reqwest::Client,
    config: AuthConfig,
}

impl GitHubAppAuth {
    /// Create a provider that signs with `private_key` and caches in memory.
    pub fn new(
        app_id: GitHubAppId,
        private_key: PrivateKey,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        Self::with_components(
            app_id,
            Arc::new(RS256JwtGenerator::new(private_key)),
            Arc::new(InMemoryTokenCache::new()),
            config,
        )
    }

    /// Create a provider from explicit collaborators.
    pub fn with_components(
        app_id: GitHubAppId,
        jwt_generator: Arc<dyn JwtGenerator>,
        token_cache: Arc<dyn TokenCache>,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            app_id,
            jwt_generator,
            token_cache,
            http_client,
            config,
        })
    }

    /// Get the GitHub App ID this provider authenticates as.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    /// Get configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn exchange_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let jwt = self.app_token().await?;

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.config.github_api_url.trim_end_matches('/'),
            installation_id
        );

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AuthError::InstallationNotFound { installation_id });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(AuthError::TokenExchangeFailed {
                installation_id,
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Invalid token response: {}", e)))?;

        info!(
            installation_id = %installation_id,
            expires_at = %body.expires_at,
            "Obtained installation access token"
        );

        Ok(InstallationToken::new(
            body.token,
            installation_id,
            body.expires_at,
        ))
    }
}

#[async_trait]
impl AuthenticationProvider for GitHubAppAuth {
    #[instrument(skip(self), fields(app_id = %self.app_id))]
    async fn app_token(&self) -> Result<JsonWebToken, AuthError> {
        match self.token_cache.get_jwt(self.app_id).await {
            Ok(Some(jwt)) if !jwt.expires_soon(self.config.jwt_refresh_margin) => {
                return Ok(jwt);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "JWT cache read failed; generating a new token"),
        }

        let jwt = self.jwt_generator.generate_jwt(self.app_id).await?;
        if let Err(e) = self.token_cache.store_jwt(jwt.clone()).await {
            warn!(error = %e, "Failed to cache JWT");
        }

        debug!(expires_at = %jwt.expires_at(), "Generated app JWT");
        Ok(jwt)
    }

    #[instrument(skip(self), fields(app_id = %self.app_id, installation_id = %installation_id))]
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        match self.token_cache.get_installation_token(installation_id).await {
            Ok(Some(token)) if !token.expires_soon(self.config.token_refresh_margin) => {
                debug!("Using cached installation token");
                return Ok(token);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Token cache read failed; exchanging a new token"),
        }

        self.refresh_installation_token(installation_id).await
    }

    async fn refresh_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let token = self.exchange_installation_token(installation_id).await?;

        if let Err(e) = self
            .token_cache
            .store_installation_token(token.clone())
            .await
        {
            warn!(error = %e, installation_id = %installation_id, "Failed to cache installation token");
        }

        Ok(token)
    }
}

impl std::fmt::Debug for GitHubAppAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAppAuth")
            .field("app_id", &self.app_id)
            .field("github_api_url", &self.config.github_api_url)
            .finish()
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
