//! Credentials read from the process environment.
//!
//! Secrets never go through [`GatewayConfig`](crate::config::GatewayConfig);
//! they are looked up by fixed variable names so deployments can keep them
//! in a secret manager. The lookup is injected, which keeps tests away from
//! the real process environment.
//!
//! Per-owner variables use the owner login upper-cased with `-` replaced by
//! `_`, so `octo-org` reads `GITHUB_APP_ID_OCTO_ORG`.

use check_gateway_core::{ConfigError, UpstashConfig};
use github_checks_sdk::{GitHubAppId, InstallationId};
use std::fmt;
use tracing::warn;

pub const GH_APP_ID: &str = "GH_APP_ID";
pub const GH_APP_PRIVATE_KEY: &str = "GH_APP_PRIVATE_KEY";
pub const GH_REPOSITORY: &str = "GH_REPOSITORY";
pub const INTERNAL_APP_SECRET: &str = "INTERNAL_APP_SECRET";
pub const UPSTASH_REDIS_REST_URL: &str = "UPSTASH_REDIS_REST_URL";
pub const UPSTASH_REDIS_REST_TOKEN: &str = "UPSTASH_REDIS_REST_TOKEN";

/// `owner/name` pair identifying a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    /// Parse `owner/name`. Both halves must be non-empty.
    pub fn parse(value: &str) -> Option<Self> {
        let (owner, name) = value.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// GitHub App credentials for one supported repository owner.
#[derive(Clone)]
pub struct OwnerCredentials {
    /// Owner login as configured
    pub login: String,
    pub app_id: GitHubAppId,
    pub private_key_pem: String,
    pub webhook_secret: String,
    /// Single repository this owner may create checks on; `None` allows all
    pub repository: Option<String>,
    /// Skips the installation lookup when set
    pub installation_id: Option<InstallationId>,
}

impl fmt::Debug for OwnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerCredentials")
            .field("login", &self.login)
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"<REDACTED>")
            .field("webhook_secret", &"<REDACTED>")
            .field("repository", &self.repository)
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

/// GitHub App credentials used by the report route.
#[derive(Clone)]
pub struct ReportCredentials {
    pub app_id: GitHubAppId,
    pub private_key_pem: String,
    pub repository: RepositoryRef,
}

impl fmt::Debug for ReportCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportCredentials")
            .field("app_id", &self.app_id)
            .field("private_key_pem", &"<REDACTED>")
            .field("repository", &self.repository)
            .finish()
    }
}

/// Every secret the gateway reads at start-up.
#[derive(Clone, Default)]
pub struct GatewaySecrets {
    pub owners: Vec<OwnerCredentials>,

    /// `None` when any of `GH_APP_ID`, `GH_APP_PRIVATE_KEY`, `GH_REPOSITORY`
    /// is unset. The report route then answers 500.
    pub report: Option<ReportCredentials>,

    /// Bearer token expected on the report route
    pub internal_secret: Option<String>,

    /// Shared dedup store; `None` falls back to the in-memory store
    pub upstash: Option<UpstashConfig>,
}

impl fmt::Debug for GatewaySecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySecrets")
            .field("owners", &self.owners)
            .field("report", &self.report)
            .field(
                "internal_secret",
                &self.internal_secret.as_ref().map(|_| "<REDACTED>"),
            )
            .field("upstash", &self.upstash)
            .finish()
    }
}

impl GatewaySecrets {
    /// Read secrets from the process environment.
    pub fn from_env(supported_owners: &[String]) -> Result<Self, ConfigError> {
        Self::from_lookup(supported_owners, |key| std::env::var(key).ok())
    }

    /// Read secrets through `lookup`.
    ///
    /// Empty values count as unset. Owner bundles are all-or-nothing: a
    /// supported owner without an app id, private key or webhook secret is a
    /// start-up error. Report credentials are optional as a group but any
    /// value that is present must parse.
    pub fn from_lookup<F>(supported_owners: &[String], lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let owners = supported_owners
            .iter()
            .map(|login| owner_credentials(login, &get))
            .collect::<Result<Vec<_>, _>>()?;

        let report = report_credentials(&get)?;

        let upstash = match (get(UPSTASH_REDIS_REST_URL), get(UPSTASH_REDIS_REST_TOKEN)) {
            (Some(url), Some(token)) => Some(UpstashConfig::new(url, token)),
            (None, None) => None,
            (Some(_), None) => return Err(missing(UPSTASH_REDIS_REST_TOKEN)),
            (None, Some(_)) => return Err(missing(UPSTASH_REDIS_REST_URL)),
        };

        Ok(Self {
            owners,
            report,
            internal_secret: get(INTERNAL_APP_SECRET),
            upstash,
        })
    }
}

/// Environment variable suffix for an owner login.
pub fn owner_env_suffix(login: &str) -> String {
    login.trim().to_uppercase().replace('-', "_")
}

fn owner_credentials<G>(login: &str, get: &G) -> Result<OwnerCredentials, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let suffix = owner_env_suffix(login);
    let key = |prefix: &str| format!("{}_{}", prefix, suffix);

    let app_id_key = key("GITHUB_APP_ID");
    let app_id = parse_u64(&app_id_key, get(&app_id_key).ok_or_else(|| missing(&app_id_key))?)?;

    let private_key_key = key("GITHUB_PRIVATE_KEY");
    let private_key_pem = get(&private_key_key)
        .map(|pem| unescape_newlines(&pem))
        .ok_or_else(|| missing(&private_key_key))?;

    let secret_key = key("GITHUB_WEBHOOK_SECRET");
    let webhook_secret = get(&secret_key).ok_or_else(|| missing(&secret_key))?;

    let repository_key = key("GITHUB_REPOSITORY");
    let repository = match get(&repository_key) {
        None => None,
        Some(value) => Some(allowed_repository(login, &repository_key, &value)?),
    };

    let installation_key = key("GITHUB_INSTALLATION_ID");
    let installation_id = match get(&installation_key) {
        None => None,
        Some(value) => Some(InstallationId::new(parse_u64(&installation_key, value)?)),
    };

    Ok(OwnerCredentials {
        login: login.trim().to_string(),
        app_id: GitHubAppId::new(app_id),
        private_key_pem,
        webhook_secret,
        repository,
        installation_id,
    })
}

/// Accepts `repo` or `owner/repo`; the owner half must name this owner.
fn allowed_repository(login: &str, key: &str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if !value.contains('/') {
        return Ok(value.to_string());
    }

    match RepositoryRef::parse(value) {
        Some(repository) if repository.owner.eq_ignore_ascii_case(login.trim()) => {
            Ok(repository.name)
        }
        Some(_) => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("repository '{}' does not belong to owner '{}'", value, login),
        }),
        None => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected 'repo' or 'owner/repo', got '{}'", value),
        }),
    }
}

fn report_credentials<G>(get: &G) -> Result<Option<ReportCredentials>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let app_id = get(GH_APP_ID)
        .map(|value| parse_u64(GH_APP_ID, value))
        .transpose()?;
    let private_key_pem = get(GH_APP_PRIVATE_KEY).map(|pem| unescape_newlines(&pem));
    let repository = get(GH_REPOSITORY)
        .map(|value| {
            RepositoryRef::parse(&value).ok_or_else(|| ConfigError::Invalid {
                key: GH_REPOSITORY.to_string(),
                message: format!("expected 'owner/repo', got '{}'", value),
            })
        })
        .transpose()?;

    match (app_id, private_key_pem, repository) {
        (Some(app_id), Some(private_key_pem), Some(repository)) => Ok(Some(ReportCredentials {
            app_id: GitHubAppId::new(app_id),
            private_key_pem,
            repository,
        })),
        (app_id, private_key_pem, repository) => {
            let missing: Vec<&str> = [
                (app_id.is_none(), GH_APP_ID),
                (private_key_pem.is_none(), GH_APP_PRIVATE_KEY),
                (repository.is_none(), GH_REPOSITORY),
            ]
            .into_iter()
            .filter_map(|(absent, key)| absent.then_some(key))
            .collect();
            warn!(
                missing = ?missing,
                "Report credentials incomplete; report route will answer with a configuration error"
            );
            Ok(None)
        }
    }
}

fn parse_u64(key: &str, value: String) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        message: "expected a positive integer".to_string(),
    })
}

/// Keys stored in single-line env vars carry literal `\n` sequences.
fn unescape_newlines(pem: &str) -> String {
    pem.replace("\\n", "\n")
}

fn missing(key: &str) -> ConfigError {
    ConfigError::Missing {
        key: key.to_string(),
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
