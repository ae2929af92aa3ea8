//! GitHub API client for authenticated operations.
//!
//! `GitHubClient` performs app-level calls authenticated with the App JWT.
//! `InstallationClient` performs repository calls authenticated with an
//! installation token. The Checks API lives on the installation client.

mod check_run;
mod installation;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::auth::{AuthenticationProvider, GitHubAppId, InstallationId};
use crate::error::ApiError;

pub use check_run::{
    find_check_run_by_name, CheckConclusion, CheckRun, CheckRunOutput, CheckRunStatus,
    CreateCheckRunRequest, UpdateCheckRunRequest,
};
pub use installation::InstallationClient;

/// Configuration for GitHub API client behavior.
///
/// # Examples
///
/// ```
/// use github_checks_sdk::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_github_api_url("https://github.example.com/api/v3");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// GitHub API base URL
    pub github_api_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "check-gateway/0.1.0".to_string(),
            timeout: Duration::from_secs(30),
            github_api_url: "https://api.github.com".to_string(),
        }
    }
}

impl ClientConfig {
    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the GitHub API base URL.
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Account that owns an installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationAccount {
    pub login: String,
}

/// Installation of the App on a repository's owner account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub id: InstallationId,
    pub app_id: Option<GitHubAppId>,
    pub account: Option<InstallationAccount>,
}

#[derive(Debug, Deserialize)]
struct InstallationResponse {
    id: Option<InstallationId>,
    app_id: Option<GitHubAppId>,
    account: Option<InstallationAccount>,
}

/// GitHub API client for app-level operations.
///
/// # Examples
///
/// ```no_run
/// # use github_checks_sdk::client::{GitHubClient, ClientConfig};
/// # use github_checks_sdk::auth::AuthenticationProvider;
/// # async fn example(auth: impl AuthenticationProvider + 'static) -> Result<(), Box<dyn std::error::Error>> {
/// let client = GitHubClient::builder(auth)
///     .config(ClientConfig::default())
///     .build()?;
///
/// let installation = client.get_repo_installation("octocat", "hello-world").await?;
/// let checks = client.installation_by_id(installation.id).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GitHubClient {
    auth: Arc<dyn AuthenticationProvider>,
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl GitHubClient {
    /// Create a new builder for constructing a GitHub client.
    pub fn builder(auth: impl AuthenticationProvider + 'static) -> GitHubClientBuilder {
        GitHubClientBuilder::new(Arc::new(auth))
    }

    /// Create a builder around an already shared authentication provider.
    pub fn builder_with_shared_auth(auth: Arc<dyn AuthenticationProvider>) -> GitHubClientBuilder {
        GitHubClientBuilder::new(auth)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the authentication provider.
    pub fn auth_provider(&self) -> &dyn AuthenticationProvider {
        self.auth.as_ref()
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.github_api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Look up the App installation that covers a repository.
    ///
    /// Authenticated with the App JWT.
    ///
    /// # Errors
    ///
    /// - `ApiError::MissingInstallationId` if GitHub answers without an id
    /// - `ApiError::NotFound` if the App is not installed on the repository
    /// - `ApiError::TokenGenerationFailed` if the JWT cannot be produced
    #[instrument(skip(self), fields(owner = %owner, repo = %repo))]
    pub async fn get_repo_installation(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Installation, ApiError> {
        let jwt = self
            .auth
            .app_token()
            .await
            .map_err(|e| ApiError::TokenGenerationFailed {
                message: format!("Failed to generate JWT: {}", e),
            })?;

        let url = self.api_url(&format!("repos/{}/{}/installation", owner, repo));

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let response = error_for_status(response).await?;
        let body = response.json::<InstallationResponse>().await?;

        let id = body.id.ok_or(ApiError::MissingInstallationId)?;
        debug!(installation_id = %id, "Resolved repository installation");

        Ok(Installation {
            id,
            app_id: body.app_id,
            account: body.account,
        })
    }

    /// Create an installation-scoped client.
    ///
    /// An installation token is obtained up front, so an installation the App
    /// cannot act for is reported here rather than on the first API call.
    #[instrument(skip(self), fields(installation_id = %installation_id))]
    pub async fn installation_by_id(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationClient, ApiError> {
        self.auth
            .installation_token(installation_id)
            .await
            .map_err(|e| ApiError::TokenGenerationFailed {
                message: format!("Failed to get installation token: {}", e),
            })?;

        Ok(InstallationClient::new(self.clone(), installation_id))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing `GitHubClient` instances.
pub struct GitHubClientBuilder {
    auth: Arc<dyn AuthenticationProvider>,
    config: ClientConfig,
}

impl GitHubClientBuilder {
    fn new(auth: Arc<dyn AuthenticationProvider>) -> Self {
        Self {
            auth,
            config: ClientConfig::default(),
        }
    }

    /// Set the client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GitHubClient, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(self.config.user_agent.clone())
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(GitHubClient {
            auth: self.auth,
            http_client,
            config: self.config,
        })
    }
}

/// Convert a non-success response into the matching `ApiError`.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 => Err(ApiError::AuthenticationFailed),
        403 => Err(ApiError::AuthorizationFailed),
        404 => Err(ApiError::NotFound),
        code => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            Err(ApiError::HttpError {
                status: code,
                message,
            })
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
