//! Check suite webhook payloads.
//!
//! GitHub sends many event types to the same endpoint. Only
//! `check_suite` / `requested` triggers work; everything else is
//! acknowledged and ignored.

use serde::Deserialize;
use serde_json::Value;

/// Classification of an incoming webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A new check suite was requested for a commit
    CheckSuiteRequested,
    /// Any other event or action
    Ignored,
}

impl WebhookEvent {
    /// Classify a delivery from its `x-github-event` header and payload.
    pub fn classify(event_type: &str, payload: &Value) -> Self {
        let action = payload.get("action").and_then(Value::as_str);
        match (event_type, action) {
            ("check_suite", Some("requested")) => Self::CheckSuiteRequested,
            _ => Self::Ignored,
        }
    }
}

/// The fields of a `check_suite` / `requested` payload the gateway acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSuiteRequest {
    pub head_sha: String,
    pub owner: String,
    pub repository: String,
    /// Informational only; the configured or resolved installation wins.
    pub installation_id: Option<u64>,
}

impl CheckSuiteRequest {
    /// Extract the request from a webhook payload.
    ///
    /// Empty strings count as missing.
    pub fn from_payload(payload: &Value) -> Result<Self, WebhookPayloadError> {
        let raw = RawPayload::deserialize(payload).map_err(|e| {
            WebhookPayloadError::Malformed {
                message: e.to_string(),
            }
        })?;

        let head_sha = raw
            .check_suite
            .and_then(|suite| suite.head_sha)
            .filter(|sha| !sha.is_empty())
            .ok_or(WebhookPayloadError::MissingField {
                field: "check_suite.head_sha",
            })?;

        let repository = raw.repository.ok_or(WebhookPayloadError::MissingField {
            field: "repository",
        })?;

        let owner = repository
            .owner
            .and_then(|owner| owner.login)
            .filter(|login| !login.is_empty())
            .ok_or(WebhookPayloadError::MissingField {
                field: "repository.owner.login",
            })?;

        let name = repository
            .name
            .filter(|name| !name.is_empty())
            .ok_or(WebhookPayloadError::MissingField {
                field: "repository.name",
            })?;

        Ok(Self {
            head_sha,
            owner,
            repository: name,
            installation_id: raw.installation.and_then(|installation| installation.id),
        })
    }
}

/// Failures extracting a [`CheckSuiteRequest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookPayloadError {
    #[error("Missing required payload field '{field}'")]
    MissingField { field: &'static str },

    #[error("Malformed webhook payload: {message}")]
    Malformed { message: String },
}

#[derive(Deserialize)]
struct RawPayload {
    check_suite: Option<RawCheckSuite>,
    repository: Option<RawRepository>,
    installation: Option<RawInstallation>,
}

#[derive(Deserialize)]
struct RawCheckSuite {
    head_sha: Option<String>,
}

#[derive(Deserialize)]
struct RawRepository {
    name: Option<String>,
    owner: Option<RawOwner>,
}

#[derive(Deserialize)]
struct RawOwner {
    login: Option<String>,
}

#[derive(Deserialize)]
struct RawInstallation {
    id: Option<u64>,
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
