//! Webhook ingress: GitHub asks for checks on a new commit.
//!
//! Only `check_suite` / `requested` does any work. For those deliveries the
//! gateway creates one queued check run per configured name, once per head
//! SHA.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use check_gateway_core::{
    perform_once, CheckSuiteRequest, ClaimError, Claimed, DedupKey, WebhookEvent,
};
use github_checks_sdk::{ApiError, CreateCheckRunRequest};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{errors::GatewayError, github::OwnerBinding, metrics::WEBHOOK_ROUTE, AppState};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

pub const EVENT_IGNORED: &str = "Event ignored";
pub const CHECKS_CREATED: &str = "✅ All check runs created";
pub const CHECKS_ALREADY_CREATED: &str = "⏭️ Checks already created for this SHA.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Ignored,
    Created { count: usize },
    AlreadyCreated,
}

impl WebhookOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Ignored => EVENT_IGNORED,
            Self::Created { .. } => CHECKS_CREATED,
            Self::AlreadyCreated => CHECKS_ALREADY_CREATED,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Created { .. } => "created",
            Self::AlreadyCreated => "already_created",
        }
    }
}

/// `POST /api/github-webhook`
#[instrument(skip(state, headers, body), fields(event_type, body_size = body.len()))]
pub async fn handle_github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let result = process_webhook(&state, &headers, &body).await;

    let outcome = match &result {
        Ok(webhook) => webhook.outcome(),
        Err(e) => e.outcome(),
    };
    state
        .metrics
        .record_request(WEBHOOK_ROUTE, outcome, start.elapsed());

    match result {
        Ok(webhook) => (StatusCode::OK, webhook.message()).into_response(),
        Err(e) => e.into_response(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

async fn process_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookOutcome, GatewayError> {
    let signature = header_str(headers, SIGNATURE_HEADER);
    let event_type = header_str(headers, EVENT_HEADER);
    tracing::Span::current().record("event_type", event_type);

    let verified = state
        .owners
        .verify_signature(body, signature)
        .ok_or(GatewayError::InvalidSignature)?;

    // A verified body that is not JSON cannot be a check suite event.
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Verified webhook body is not JSON");
            return Ok(WebhookOutcome::Ignored);
        }
    };

    if WebhookEvent::classify(event_type, &payload) == WebhookEvent::Ignored {
        debug!(event_type, "Ignoring webhook event");
        return Ok(WebhookOutcome::Ignored);
    }

    let request = CheckSuiteRequest::from_payload(&payload).map_err(|e| {
        warn!(error = %e, "Check suite payload incomplete");
        GatewayError::MissingPayloadData
    })?;

    let owner = state
        .owners
        .get(&request.owner)
        .ok_or(GatewayError::UnsupportedOwner)?;

    if !owner.login().eq_ignore_ascii_case(verified.login()) {
        warn!(
            payload_owner = %request.owner,
            verified_owner = %verified.login(),
            "Payload owner does not match the signing owner"
        );
        return Err(GatewayError::InvalidSignature);
    }

    if !owner.allows_repository(&request.repository) {
        warn!(
            owner = %request.owner,
            repository = %request.repository,
            "Repository not allowed for owner"
        );
        return Err(GatewayError::UnsupportedOwner);
    }

    info!(
        owner = %request.owner,
        repository = %request.repository,
        head_sha = %request.head_sha,
        "Check suite requested"
    );

    let key = DedupKey::checks_created(&request.head_sha);
    let claimed = perform_once(
        state.dedup_store.as_ref(),
        &key,
        state.config.dedup.webhook_ttl(),
        || create_check_runs(owner, &request, &state.config.checks.names),
    )
    .await;

    match claimed {
        Ok(Claimed::Performed(count)) => Ok(WebhookOutcome::Created { count }),
        Ok(Claimed::Duplicate) => {
            info!(head_sha = %request.head_sha, "Checks already created for this SHA");
            Ok(WebhookOutcome::AlreadyCreated)
        }
        Err(ClaimError::Store(e)) => Err(GatewayError::DedupStore(e)),
        Err(ClaimError::Operation(e)) => Err(GatewayError::Upstream(e)),
    }
}

/// Create one queued check run per name. Stops at the first failure.
async fn create_check_runs(
    owner: &OwnerBinding,
    request: &CheckSuiteRequest,
    names: &[String],
) -> Result<usize, ApiError> {
    let installation_id = match owner.installation_id() {
        Some(id) => id,
        None => {
            owner
                .client()
                .get_repo_installation(&request.owner, &request.repository)
                .await?
                .id
        }
    };
    let checks = owner.client().installation_by_id(installation_id).await?;

    for name in names {
        let run = checks
            .create_check_run(
                &request.owner,
                &request.repository,
                &CreateCheckRunRequest::queued(name.clone(), request.head_sha.clone()),
            )
            .await?;
        debug!(check_run_id = run.id, name = %name, "Created check run");
    }

    info!(count = names.len(), head_sha = %request.head_sha, "All check runs created");
    Ok(names.len())
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
