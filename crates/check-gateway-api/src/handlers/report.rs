//! Report ingress: CI callers push a status for a named check run.
//!
//! Flow: rate limit, bearer authentication, payload validation, then one
//! circuit-breaker-protected unit of work that resolves the installation,
//! finds the check run by name and updates it at most once per
//! `(check run, status, conclusion)`.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use check_gateway_core::{
    client_identifier, perform_once, CircuitBreaker, CircuitBreakerError, ClaimError, Claimed,
    DedupKey, ReportPayload, Timestamp,
};
use github_checks_sdk::{
    client::find_check_run_by_name, ApiError, CheckRunOutput, UpdateCheckRunRequest,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tracing::{debug, info, instrument};

use crate::{errors::GatewayError, github::ReportBinding, metrics::REPORT_ROUTE, AppState};

pub const CHECK_RUN_UPDATED: &str = "✅ Check run updated";
pub const DUPLICATE_UPDATE_SKIPPED: &str = "⏭️ Duplicate check update skipped.";

/// Result of a report that reached GitHub or the dedup store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Updated { check_run_id: u64 },
    Duplicate { check_run_id: u64 },
}

impl ReportOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Updated { .. } => CHECK_RUN_UPDATED,
            Self::Duplicate { .. } => DUPLICATE_UPDATE_SKIPPED,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::Duplicate { .. } => "duplicate",
        }
    }
}

/// `POST /api/github-webhook/report`
#[instrument(skip(state, headers, body), fields(body_size = body.len()))]
pub async fn handle_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let result = process_report(&state, &headers, &body).await;

    let outcome = match &result {
        Ok(report) => report.outcome(),
        Err(e) => e.outcome(),
    };
    state
        .metrics
        .record_request(REPORT_ROUTE, outcome, start.elapsed());

    match result {
        Ok(report) => (StatusCode::OK, report.message()).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn process_report(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ReportOutcome, GatewayError> {
    let client = client_identifier(headers);
    if state.rate_limiter.is_rate_limited(&client) {
        state.metrics.rate_limited.inc();
        return Err(GatewayError::RateLimited {
            retry_after_seconds: state.rate_limiter.config().window.as_secs(),
        });
    }

    let secret = state
        .internal_secret
        .as_deref()
        .ok_or_else(|| GatewayError::Configuration {
            message: "INTERNAL_APP_SECRET is not set".to_string(),
        })?;
    authorize(headers, secret)?;

    let payload = parse_payload(body)?;

    let binding = state
        .report
        .as_deref()
        .ok_or_else(|| GatewayError::Configuration {
            message: "GH_APP_ID, GH_APP_PRIVATE_KEY and GH_REPOSITORY must all be set"
                .to_string(),
        })?;

    info!(
        sha = %payload.sha(),
        check_name = %payload.name(),
        status = %payload.status(),
        conclusion = payload.conclusion().map(|c| c.as_str()).unwrap_or("none"),
        "Report accepted"
    );

    state
        .circuit_breaker
        .call(|| update_check_run(state, binding, &payload))
        .await
        .map_err(|e| match e {
            CircuitBreakerError::CircuitOpen => {
                state.metrics.circuit_breaker_rejections.inc();
                let breaker = state.circuit_breaker.metrics();
                GatewayError::CircuitOpen {
                    retry_after_seconds: breaker
                        .recovery_remaining
                        .map(|remaining| remaining.as_secs().max(1))
                        .unwrap_or(state.config.circuit_breaker.recovery_timeout_seconds),
                }
            }
            CircuitBreakerError::OperationFailed(e) => e,
            CircuitBreakerError::InternalError { message } => GatewayError::Internal { message },
        })
}

/// Check `Authorization: Bearer <token>` against the internal secret.
fn authorize(headers: &HeaderMap, secret: &str) -> Result<(), GatewayError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(GatewayError::Unauthorized)?;

    if bool::from(token.as_bytes().ct_eq(secret.as_bytes())) {
        Ok(())
    } else {
        Err(GatewayError::Unauthorized)
    }
}

fn parse_payload(body: &[u8]) -> Result<ReportPayload, GatewayError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| {
        GatewayError::Validation("Invalid payload: body is not valid JSON".to_string())
    })?;

    ReportPayload::from_json(&value).map_err(|e| GatewayError::Validation(e.to_string()))
}

/// The circuit-protected unit of work. Every error counts as a failure.
async fn update_check_run(
    state: &AppState,
    binding: &ReportBinding,
    payload: &ReportPayload,
) -> Result<ReportOutcome, GatewayError> {
    let repository = &binding.repository;

    let installation = binding
        .client
        .get_repo_installation(&repository.owner, &repository.name)
        .await?;
    let checks = binding.client.installation_by_id(installation.id).await?;

    let runs = checks
        .list_check_runs_for_ref(&repository.owner, &repository.name, payload.sha())
        .await?;
    let check_run_id = find_check_run_by_name(&runs, payload.name())
        .map(|run| run.id)
        .ok_or_else(|| ApiError::CheckRunNotFound {
            name: payload.name().to_string(),
            sha: payload.sha().to_string(),
        })?;

    let key = DedupKey::check_run_update(check_run_id, payload.status(), payload.conclusion());
    let request = update_request(payload);

    let claimed = perform_once(
        state.dedup_store.as_ref(),
        &key,
        state.config.dedup.report_ttl(),
        || checks.update_check_run(&repository.owner, &repository.name, check_run_id, &request),
    )
    .await;

    match claimed {
        Ok(Claimed::Performed(_)) => {
            info!(check_run_id, key = %key, "Check run updated");
            Ok(ReportOutcome::Updated { check_run_id })
        }
        Ok(Claimed::Duplicate) => {
            debug!(check_run_id, key = %key, "Duplicate check run update skipped");
            Ok(ReportOutcome::Duplicate { check_run_id })
        }
        Err(ClaimError::Store(e)) => Err(GatewayError::DedupStore(e)),
        Err(ClaimError::Operation(e)) => Err(GatewayError::Upstream(e)),
    }
}

/// PATCH body for a validated report. `completed_at` only accompanies
/// `completed`.
pub(crate) fn update_request(payload: &ReportPayload) -> UpdateCheckRunRequest {
    UpdateCheckRunRequest {
        status: Some(payload.status()),
        conclusion: payload.conclusion(),
        completed_at: payload
            .is_completed()
            .then(|| *Timestamp::now().as_datetime()),
        details_url: Some(payload.details_url().to_string()),
        output: Some(CheckRunOutput {
            title: payload.title().to_string(),
            summary: payload.summary().to_string(),
        }),
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub message: &'static str,
    pub timestamp: String,
    pub status: &'static str,
}

/// `GET /api/github-webhook/report`
pub async fn report_readiness() -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        message: "Check run report endpoint is ready",
        timestamp: Timestamp::now().to_rfc3339(),
        status: "ready",
    })
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
