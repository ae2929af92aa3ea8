//! GitHub App clients built from the configured credentials.
//!
//! One client exists per App. The webhook route holds an [`OwnerRegistry`]
//! keyed by lower-cased owner login; the report route holds a single
//! [`ReportBinding`] for the repository it updates.

use check_gateway_core::ConfigError;
use github_checks_sdk::{
    AuthConfig, ClientConfig, GitHubAppAuth, GitHubAppId, GitHubClient, InstallationId, PrivateKey,
    SignatureValidator,
};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::{
    config::GitHubSettings,
    secrets::{OwnerCredentials, ReportCredentials, RepositoryRef},
};

/// Build an App-level client.
///
/// `key_name` names the variable the PEM came from, for error messages.
pub fn build_client(
    app_id: GitHubAppId,
    private_key_pem: &str,
    key_name: &str,
    settings: &GitHubSettings,
) -> Result<GitHubClient, ConfigError> {
    let private_key = PrivateKey::from_pem(private_key_pem).map_err(|e| ConfigError::Invalid {
        key: key_name.to_string(),
        message: e.to_string(),
    })?;

    let auth_config = AuthConfig {
        github_api_url: settings.api_url.clone(),
        user_agent: settings.user_agent.clone(),
        timeout: settings.timeout(),
        ..AuthConfig::default()
    };
    let auth = GitHubAppAuth::new(app_id, private_key, auth_config).map_err(|e| {
        ConfigError::Invalid {
            key: key_name.to_string(),
            message: e.to_string(),
        }
    })?;

    GitHubClient::builder(auth)
        .config(
            ClientConfig::default()
                .with_github_api_url(settings.api_url.clone())
                .with_user_agent(settings.user_agent.clone())
                .with_timeout(settings.timeout()),
        )
        .build()
        .map_err(|e| ConfigError::Invalid {
            key: "github".to_string(),
            message: e.to_string(),
        })
}

/// Everything the webhook route needs for one repository owner.
pub struct OwnerBinding {
    login: String,
    validator: SignatureValidator,
    allowed_repository: Option<String>,
    installation_id: Option<InstallationId>,
    client: GitHubClient,
}

impl OwnerBinding {
    pub fn from_credentials(
        credentials: &OwnerCredentials,
        settings: &GitHubSettings,
    ) -> Result<Self, ConfigError> {
        let key_name = format!(
            "GITHUB_PRIVATE_KEY_{}",
            crate::secrets::owner_env_suffix(&credentials.login)
        );
        let client = build_client(
            credentials.app_id,
            &credentials.private_key_pem,
            &key_name,
            settings,
        )?;

        Ok(Self {
            login: credentials.login.clone(),
            validator: SignatureValidator::new(credentials.webhook_secret.clone()),
            allowed_repository: credentials.repository.clone(),
            installation_id: credentials.installation_id,
            client,
        })
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub fn installation_id(&self) -> Option<InstallationId> {
        self.installation_id
    }

    /// Whether checks may be created on `repository` for this owner.
    pub fn allows_repository(&self, repository: &str) -> bool {
        self.allowed_repository
            .as_deref()
            .is_none_or(|allowed| allowed.eq_ignore_ascii_case(repository))
    }

    /// Verify a delivery signature against this owner's webhook secret.
    ///
    /// Malformed signatures count as a mismatch.
    pub fn verifies(&self, body: &[u8], signature: &str) -> bool {
        self.validator.validate(body, signature).unwrap_or(false)
    }
}

impl std::fmt::Debug for OwnerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerBinding")
            .field("login", &self.login)
            .field("allowed_repository", &self.allowed_repository)
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

/// Supported owners, looked up case-insensitively.
#[derive(Debug, Default)]
pub struct OwnerRegistry {
    owners: HashMap<String, OwnerBinding>,
}

impl OwnerRegistry {
    pub fn from_credentials(
        credentials: &[OwnerCredentials],
        settings: &GitHubSettings,
    ) -> Result<Self, ConfigError> {
        let mut owners = HashMap::new();
        for owner in credentials {
            let binding = OwnerBinding::from_credentials(owner, settings)?;
            let key = binding.login.to_lowercase();
            if owners.insert(key, binding).is_some() {
                return Err(ConfigError::Invalid {
                    key: "supported_owners".to_string(),
                    message: format!("owner '{}' is configured more than once", owner.login),
                });
            }
        }

        info!(owners = owners.len(), "Loaded webhook owner credentials");
        Ok(Self { owners })
    }

    pub fn get(&self, login: &str) -> Option<&OwnerBinding> {
        self.owners.get(&login.to_lowercase())
    }

    /// First owner whose webhook secret verifies the delivery.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> Option<&OwnerBinding> {
        let verified = self
            .owners
            .values()
            .find(|owner| owner.verifies(body, signature));
        if let Some(owner) = verified {
            debug!(owner = %owner.login, "Webhook signature verified");
        }
        verified
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// The App client and repository the report route updates.
#[derive(Debug)]
pub struct ReportBinding {
    pub client: GitHubClient,
    pub repository: RepositoryRef,
}

impl ReportBinding {
    pub fn from_credentials(
        credentials: &ReportCredentials,
        settings: &GitHubSettings,
    ) -> Result<Self, ConfigError> {
        let client = build_client(
            credentials.app_id,
            &credentials.private_key_pem,
            crate::secrets::GH_APP_PRIVATE_KEY,
            settings,
        )?;

        Ok(Self {
            client,
            repository: credentials.repository.clone(),
        })
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
