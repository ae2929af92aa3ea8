//! Error types for the HTTP layer.
//!
//! Handlers return [`GatewayError`]. Each variant maps to one status code
//! and one fixed plain-text body; details are logged, never sent back.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use check_gateway_core::{ConfigError, DedupStoreError};
use github_checks_sdk::ApiError;
use tracing::{error, warn};

/// Failures of the webhook and report routes
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required payload data")]
    MissingPayloadData,

    #[error("Unsupported repository owner.")]
    UnsupportedOwner,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service temporarily unavailable")]
    CircuitOpen { retry_after_seconds: u64 },

    #[error("GitHub API call failed: {0}")]
    Upstream(#[from] ApiError),

    #[error("Dedup store failed: {0}")]
    DedupStore(#[from] DedupStoreError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Validation(_) | Self::MissingPayloadData | Self::UnsupportedOwner => {
                StatusCode::BAD_REQUEST
            }
            Self::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. }
            | Self::Upstream(_)
            | Self::DedupStore(_)
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body returned to the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::Configuration { .. } => "Configuration error".to_string(),
            Self::Upstream(_) | Self::DedupStore(_) | Self::Internal { .. } => {
                "Internal error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Metric label for this failure
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::InvalidSignature => "invalid_signature",
            Self::Validation(_) => "validation_error",
            Self::MissingPayloadData => "missing_payload_data",
            Self::UnsupportedOwner => "unsupported_owner",
            Self::Configuration { .. } => "configuration_error",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Upstream(_) => "upstream_error",
            Self::DedupStore(_) => "dedup_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
            }
            | Self::CircuitOpen {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() && !matches!(self, Self::CircuitOpen { .. }) {
            error!(error = %self, outcome = self.outcome(), "Request failed");
        } else {
            warn!(error = %self, outcome = self.outcome(), "Request rejected");
        }

        let mut response = (status, self.public_message()).into_response();

        if let Some(seconds) = self.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Service start-up and runtime errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Metrics registry error: {message}")]
    Metrics { message: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
