//! Circuit breaker for the check-run update unit of work.
//!
//! The breaker wraps the whole report flow (installation lookup, check-run
//! lookup, dedup claim and update) so that a failing GitHub or dedup backend
//! is given time to recover instead of being hammered by every CI job.
//!
//! # Circuit Breaker States
//!
//! - **Closed**: Normal operation, failures are counted
//! - **Open**: Requests are rejected without running the operation
//! - **Half-Open**: A single probe request tests whether the backend recovered
//!
//! # Example
//!
//! ```rust
//! use check_gateway_core::circuit_breaker::{
//!     check_run_update_circuit_breaker_config, CircuitBreaker, DefaultCircuitBreaker,
//! };
//!
//! # async fn example() {
//! let breaker: DefaultCircuitBreaker<u64, String> =
//!     DefaultCircuitBreaker::new(check_run_update_circuit_breaker_config());
//!
//! let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
//! assert_eq!(result.ok(), Some(42));
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::Timestamp;

mod breaker;
pub use breaker::DefaultCircuitBreaker;

// ============================================================================
// Circuit Breaker Trait
// ============================================================================

/// Circuit breaker protection for an operation.
///
/// # Type Parameters
///
/// - `T`: Success result type
/// - `E`: Operation error type
#[async_trait]
pub trait CircuitBreaker<T, E>: Send + Sync {
    /// Execute operation with circuit breaker protection.
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: Operation succeeded
    /// - `Err(CircuitBreakerError::CircuitOpen)`: Rejected without running
    /// - `Err(CircuitBreakerError::OperationFailed(e))`: Operation ran and failed
    async fn call<F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send;

    /// Get current circuit breaker state.
    fn state(&self) -> CircuitState;

    /// Get circuit breaker metrics and statistics.
    fn metrics(&self) -> CircuitMetrics;

    /// Force the circuit back to closed, clearing all counters.
    fn reset(&self);

    /// Check if circuit breaker is healthy (allowing requests).
    fn is_healthy(&self) -> bool {
        self.state().allows_requests()
    }
}

// ============================================================================
// Circuit State
// ============================================================================

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Requests pass through and failures are counted.
    Closed,

    /// Requests are rejected until the recovery timeout has elapsed.
    Open,

    /// One probe request is running to test recovery.
    HalfOpen,
}

impl CircuitState {
    /// `true` for Closed and HalfOpen.
    pub fn allows_requests(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }

    /// `true` for Open and HalfOpen.
    pub fn is_failure_state(&self) -> bool {
        matches!(self, Self::Open | Self::HalfOpen)
    }

    /// Upper-case label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Circuit Breaker Configuration
// ============================================================================

/// Configuration for circuit breaker behavior.
///
/// # Default Configuration
///
/// - Failure threshold: 5 failures
/// - Recovery timeout: 60 seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Service name for identification in logs.
    pub service_name: String,

    /// Number of failures, without an intervening success, that trips the
    /// circuit.
    pub failure_threshold: u32,

    /// Time since the last failure before a probe is allowed (seconds).
    pub recovery_timeout_seconds: u64,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_seconds)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            failure_threshold: 5,
            recovery_timeout_seconds: 60,
        }
    }
}

// ============================================================================
// Circuit Metrics
// ============================================================================

/// Operational statistics for monitoring and alerting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitMetrics {
    /// Current circuit state.
    pub state: CircuitState,

    /// Requests that ran the operation.
    pub total_requests: u64,

    /// Number of successful requests.
    pub successful_requests: u64,

    /// Number of failed requests.
    pub failed_requests: u64,

    /// Number of requests rejected without running.
    pub rejected_requests: u64,

    /// Failures since the last success.
    pub failure_count: u32,

    /// Time when circuit last changed state.
    pub last_state_change: Timestamp,

    /// Time left before an open circuit admits a probe.
    pub recovery_remaining: Option<Duration>,
}

impl CircuitMetrics {
    /// Success rate from 0.0 to 1.0, or 1.0 if no requests processed.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Failure rate from 0.0 to 1.0, or 0.0 if no requests processed.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }
}

// ============================================================================
// Circuit Breaker Error
// ============================================================================

/// Errors returned by a circuit-protected call.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, or a half-open probe is already running.
    #[error("Circuit breaker is OPEN")]
    CircuitOpen,

    /// Operation ran and failed.
    #[error("Operation failed: {0}")]
    OperationFailed(E),

    /// Circuit breaker internal error.
    #[error("Circuit breaker internal error: {message}")]
    InternalError { message: String },
}

impl<E> CircuitBreakerError<E> {
    /// `true` for errors that indicate backend issues
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, Self::OperationFailed(_) | Self::InternalError { .. })
    }

    /// `true` when the breaker rejected the call without running it
    pub fn is_circuit_protection(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }

    /// Unwrap the operation error, if the operation ran.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// Service-Specific Configurations
// ============================================================================

/// Circuit breaker configuration for the check-run update unit of work.
///
/// - 5 failures to trip
/// - 60 second recovery timeout
pub fn check_run_update_circuit_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        service_name: "check-run-update".to_string(),
        failure_threshold: 5,
        recovery_timeout_seconds: 60,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
