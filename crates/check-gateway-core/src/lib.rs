//! # Check Gateway Core
//!
//! Core logic for the GitHub check-run reporting gateway.
//!
//! This crate holds everything that does not depend on the HTTP layer:
//! payload validation and sanitization, webhook payload extraction, the
//! sliding-window rate limiter, the circuit breaker and the dedup store
//! abstraction with its adapters.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions (`DedupStore`,
//!   `CircuitBreaker`)
//! - Infrastructure implementations are injected by the composition root
//! - Process-wide state (rate limiter windows, breaker state) lives in
//!   explicitly constructed objects, never in statics
//!
//! ## Usage
//!
//! ```rust
//! use check_gateway_core::report::escape_html;
//!
//! assert_eq!(escape_html("<b>"), "&lt;b&gt;");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Time and Request Metadata
// ============================================================================

/// UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since the Unix epoch
    pub fn unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Get duration since another timestamp, zero if `other` is later
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Identifier attached to every log line of one HTTP request.
///
/// Format: `{unix_millis}-{8 hex chars}`, so ids sort roughly by arrival and
/// stay unique within the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new request id for the current moment
    pub fn new() -> Self {
        Self::at(Timestamp::now())
    }

    /// Generate a request id for a given moment
    pub fn at(timestamp: Timestamp) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", timestamp.unix_millis(), &suffix[..8]))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that may succeed later
    Transient,
    /// Failures caused by the request itself
    Permanent,
    /// Missing or invalid deployment configuration
    Configuration,
}

/// Error type for configuration loading and validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting '{key}'")]
    Missing { key: String },

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to load configuration: {message}")]
    Load { message: String },
}

impl ConfigError {
    /// Error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Report payload validation and sanitization
pub mod report;

/// Check suite webhook payload extraction
pub mod webhook;

/// Sliding-window rate limiting
pub mod rate_limiter;

/// Circuit breaker protecting the report unit of work
pub mod circuit_breaker;

/// Idempotency ledger abstraction
pub mod dedup;

/// Dedup store implementations
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{InMemoryDedupStore, UpstashConfig, UpstashDedupStore};
pub use circuit_breaker::{
    check_run_update_circuit_breaker_config, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerError, CircuitMetrics, CircuitState, DefaultCircuitBreaker,
};
pub use dedup::{perform_once, ClaimError, Claimed, DedupKey, DedupStore, DedupStoreError};
pub use rate_limiter::{client_identifier, RateLimitConfig, SlidingWindowRateLimiter};
pub use report::{escape_html, ReportPayload, ReportValidationError};
pub use webhook::{CheckSuiteRequest, WebhookEvent, WebhookPayloadError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
