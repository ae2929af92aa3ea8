//! Default circuit breaker implementation.
//!
//! State lives behind an `Arc<RwLock<>>` that is never held across an await.
//! Timing uses the tokio clock so tests can pause and advance time.

use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitMetrics, CircuitState};
use crate::Timestamp;

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug)]
struct InternalState {
    current_state: CircuitState,

    /// Failures since the last success. Not cleared when a probe is admitted.
    failure_count: u32,

    last_failure: Option<Instant>,

    /// Set while the single half-open probe is running
    probe_in_flight: bool,

    last_state_change: Timestamp,

    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
}

impl InternalState {
    fn new() -> Self {
        Self {
            current_state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            probe_in_flight: false,
            last_state_change: Timestamp::now(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rejected_requests: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, service_name: &str) {
        if self.current_state != to {
            info!(
                service = service_name,
                from = %self.current_state,
                to = %to,
                failure_count = self.failure_count,
                "Circuit breaker state changed"
            );
            self.current_state = to;
            self.last_state_change = Timestamp::now();
        }
    }
}

/// How a call was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Probe,
}

// ============================================================================
// Default Circuit Breaker
// ============================================================================

/// Default circuit breaker implementation.
///
/// Cloning shares the underlying state.
pub struct DefaultCircuitBreaker<T, E> {
    config: CircuitBreakerConfig,
    state: Arc<RwLock<InternalState>>,
    _phantom: std::marker::PhantomData<fn() -> (T, E)>,
}

impl<T, E> Clone for DefaultCircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, E> std::fmt::Debug for DefaultCircuitBreaker<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCircuitBreaker")
            .field("config", &self.config)
            .field(
                "state",
                &self.state.read().map(|state| state.current_state).ok(),
            )
            .finish()
    }
}

impl<T, E> DefaultCircuitBreaker<T, E> {
    /// Create new circuit breaker with configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(InternalState::new())),
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, InternalState>, CircuitBreakerError<E>> {
        self.state
            .write()
            .map_err(|e| CircuitBreakerError::InternalError {
                message: format!("Failed to acquire write lock: {}", e),
            })
    }

    fn recovery_elapsed(&self, state: &InternalState) -> bool {
        state
            .last_failure
            .map(|at| at.elapsed() >= self.config.recovery_timeout())
            .unwrap_or(true)
    }

    /// Decide whether a call may run, moving Open to HalfOpen when due.
    fn admit(&self) -> Result<Admission, CircuitBreakerError<E>> {
        let mut state = self.write_state()?;

        match state.current_state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open if self.recovery_elapsed(&state) => {
                state.transition(CircuitState::HalfOpen, &self.config.service_name);
                state.probe_in_flight = true;
                Ok(Admission::Probe)
            }
            CircuitState::HalfOpen if !state.probe_in_flight => {
                state.probe_in_flight = true;
                Ok(Admission::Probe)
            }
            CircuitState::Open | CircuitState::HalfOpen => {
                state.rejected_requests += 1;
                debug!(
                    service = %self.config.service_name,
                    state = %state.current_state,
                    "Circuit breaker rejected request"
                );
                Err(CircuitBreakerError::CircuitOpen)
            }
        }
    }

    /// A normal call only clears the failure count while the circuit is
    /// still closed; settling a half-open circuit is left to its probe.
    fn record_success(&self, state: &mut InternalState, admission: Admission) {
        state.total_requests += 1;
        state.successful_requests += 1;

        match admission {
            Admission::Probe => {
                state.failure_count = 0;
                state.probe_in_flight = false;
                state.transition(CircuitState::Closed, &self.config.service_name);
            }
            Admission::Normal if state.current_state == CircuitState::Closed => {
                state.failure_count = 0;
            }
            Admission::Normal => {
                debug!(
                    service = %self.config.service_name,
                    state = %state.current_state,
                    "Late success ignored for circuit state"
                );
            }
        }
    }

    fn record_failure(&self, state: &mut InternalState, admission: Admission) {
        state.total_requests += 1;
        state.failed_requests += 1;

        if admission == Admission::Normal && state.current_state != CircuitState::Closed {
            debug!(
                service = %self.config.service_name,
                state = %state.current_state,
                "Late failure ignored for circuit state"
            );
            return;
        }

        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure = Some(Instant::now());
        if admission == Admission::Probe {
            state.probe_in_flight = false;
        }

        if state.failure_count >= self.config.failure_threshold {
            if state.current_state == CircuitState::Closed {
                warn!(
                    service = %self.config.service_name,
                    failure_count = state.failure_count,
                    threshold = self.config.failure_threshold,
                    "Failure threshold reached, opening circuit"
                );
            }
            state.transition(CircuitState::Open, &self.config.service_name);
        } else {
            state.transition(CircuitState::Closed, &self.config.service_name);
        }
    }
}

#[async_trait]
impl<T, E> CircuitBreaker<T, E> for DefaultCircuitBreaker<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    async fn call<F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, E>> + Send,
    {
        let admission = self.admit()?;
        let mut probe_guard = ProbeGuard::new(&self.state, admission == Admission::Probe);

        let result = operation().await;
        probe_guard.disarm();

        let mut state = self.write_state()?;
        match result {
            Ok(value) => {
                self.record_success(&mut state, admission);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(&mut state, admission);
                Err(CircuitBreakerError::OperationFailed(e))
            }
        }
    }

    fn state(&self) -> CircuitState {
        self.state
            .read()
            .map(|state| state.current_state)
            .unwrap_or(CircuitState::Open) // Fail-safe: treat lock poisoning as open
    }

    fn metrics(&self) -> CircuitMetrics {
        let state = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let recovery_remaining = match (state.current_state, state.last_failure) {
            (CircuitState::Open, Some(at)) => {
                Some(self.config.recovery_timeout().saturating_sub(at.elapsed()))
            }
            _ => None,
        };

        CircuitMetrics {
            state: state.current_state,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            rejected_requests: state.rejected_requests,
            failure_count: state.failure_count,
            last_state_change: state.last_state_change,
            recovery_remaining,
        }
    }

    fn reset(&self) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        info!(service = %self.config.service_name, "Circuit breaker reset");
        *state = InternalState::new();
    }
}

// ============================================================================
// Probe Guard
// ============================================================================

/// Returns a half-open circuit to Open if the probe future is dropped before
/// it completes, so a cancelled request cannot wedge the breaker.
struct ProbeGuard<'a> {
    state: &'a RwLock<InternalState>,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    fn new(state: &'a RwLock<InternalState>, armed: bool) -> Self {
        Self { state, armed }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.current_state == CircuitState::HalfOpen && state.probe_in_flight {
            warn!("Circuit breaker probe was cancelled, returning to OPEN");
            state.probe_in_flight = false;
            state.current_state = CircuitState::Open;
            state.last_state_change = Timestamp::now();
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
