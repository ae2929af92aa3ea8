//! # Upstash Dedup Store
//!
//! Redis-over-REST client for Upstash. Each command is a JSON array POSTed
//! to the database URL with a bearer token, for example
//! `["SET", "key", "value", "EX", "600", "NX"]`. Responses are
//! `{"result": ...}` on success and `{"error": "..."}` on failure.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::dedup::{DedupStore, DedupStoreError};

/// Connection settings for an Upstash Redis database.
#[derive(Clone)]
pub struct UpstashConfig {
    /// REST endpoint, e.g. `https://eu1-example.upstash.io`
    pub url: String,
    /// REST bearer token
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl UpstashConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for UpstashConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashConfig")
            .field("url", &self.url)
            .field("token", &"<REDACTED>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

/// Dedup store backed by Upstash Redis.
#[derive(Debug, Clone)]
pub struct UpstashDedupStore {
    client: reqwest::Client,
    config: UpstashConfig,
}

impl UpstashDedupStore {
    /// Create a store for the given database.
    pub fn new(config: UpstashConfig) -> Result<Self, DedupStoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DedupStoreError::Internal {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Send one command and return its `result` value.
    async fn execute(&self, command: &[&str]) -> Result<Value, DedupStoreError> {
        let response = self
            .client
            .post(self.config.url.trim_end_matches('/'))
            .bearer_auth(&self.config.token)
            .json(command)
            .send()
            .await
            .map_err(|e| DedupStoreError::Unavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DedupStoreError::Unavailable {
                message: e.to_string(),
            })?;
        let parsed = serde_json::from_str::<CommandResponse>(&body);

        if !status.is_success() {
            let message = match parsed {
                Ok(CommandResponse {
                    error: Some(error), ..
                }) => error,
                _ => body,
            };
            return Err(DedupStoreError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.map_err(|e| DedupStoreError::InvalidResponse {
            message: e.to_string(),
        })?;

        if let Some(error) = parsed.error {
            return Err(DedupStoreError::CommandRejected { message: error });
        }

        debug!(command = command.first().copied().unwrap_or(""), "Upstash command succeeded");
        Ok(parsed.result)
    }
}

fn ttl_seconds(ttl: Duration) -> String {
    // Redis rejects EX 0.
    ttl.as_secs().max(1).to_string()
}

fn unexpected(command: &str, result: &Value) -> DedupStoreError {
    DedupStoreError::InvalidResponse {
        message: format!("Unexpected {} result: {}", command, result),
    }
}

#[async_trait]
impl DedupStore for UpstashDedupStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, DedupStoreError> {
        match self.execute(&["GET", key]).await? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(unexpected("GET", &other)),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DedupStoreError> {
        let ttl = ttl_seconds(ttl);
        match self.execute(&["SET", key, value, "EX", ttl.as_str()]).await? {
            Value::String(reply) if reply == "OK" => Ok(()),
            other => Err(unexpected("SET", &other)),
        }
    }

    #[instrument(skip(self, value))]
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, DedupStoreError> {
        let ttl = ttl_seconds(ttl);
        match self.execute(&["SET", key, value, "EX", ttl.as_str(), "NX"]).await? {
            Value::String(reply) if reply == "OK" => Ok(true),
            Value::Null => Ok(false),
            other => Err(unexpected("SET NX", &other)),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), DedupStoreError> {
        match self.execute(&["DEL", key]).await? {
            Value::Number(_) => Ok(()),
            other => Err(unexpected("DEL", &other)),
        }
    }
}

#[cfg(test)]
#[path = "upstash_dedup_store_tests.rs"]
mod tests;
