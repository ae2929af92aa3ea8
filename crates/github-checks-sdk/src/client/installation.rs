//! Installation-scoped access to the GitHub API.
//!
//! An `InstallationClient` is bound to one installation ID and authenticates
//! every request with that installation's token (not the App JWT).

use serde::Serialize;

use crate::{
    auth::InstallationId,
    client::{error_for_status, GitHubClient},
    error::ApiError,
};

/// Installation-scoped GitHub API client.
///
/// Shares the HTTP client and authentication provider of the parent
/// `GitHubClient`, so tokens are served from the same cache.
#[derive(Debug, Clone)]
pub struct InstallationClient {
    client: GitHubClient,
    installation_id: InstallationId,
}

impl InstallationClient {
    pub(crate) fn new(client: GitHubClient, installation_id: InstallationId) -> Self {
        Self {
            client,
            installation_id,
        }
    }

    /// Get the installation ID this client is bound to.
    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    async fn authorized(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self
            .client
            .auth_provider()
            .installation_token(self.installation_id)
            .await
            .map_err(|e| ApiError::TokenGenerationFailed {
                message: format!("Failed to get installation token: {}", e),
            })?;

        Ok(self
            .client
            .http_client()
            .request(method, self.client.api_url(path))
            .header("Authorization", format!("Bearer {}", token.token()))
            .header("Accept", "application/vnd.github+json"))
    }

    /// Make an authenticated GET request.
    ///
    /// Non-success statuses are converted to `ApiError`.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let response = self.authorized(reqwest::Method::GET, path).await?.send().await?;
        error_for_status(response).await
    }

    /// Make an authenticated POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .authorized(reqwest::Method::POST, path)
            .await?
            .json(body)
            .send()
            .await?;
        error_for_status(response).await
    }

    /// Make an authenticated PATCH request with a JSON body.
    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .authorized(reqwest::Method::PATCH, path)
            .await?
            .json(body)
            .send()
            .await?;
        error_for_status(response).await
    }
}
