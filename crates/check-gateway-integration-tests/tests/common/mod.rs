//! Common test utilities for check-gateway integration tests
//!
//! This module provides:
//! - A gateway wired to a wiremock GitHub API
//! - Dedup store doubles that count or fail calls
//! - Request and payload builders for both routes

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use check_gateway_api::{create_router, AppState, GatewayConfig, GatewaySecrets};
use check_gateway_core::{DedupStore, DedupStoreError, InMemoryDedupStore};
use github_checks_sdk::SignatureValidator;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_PRIVATE_KEY: &str =
    include_str!("../../../github-checks-sdk/testdata/app_private_key.pem");

pub const OWNER: &str = "octo-org";
pub const REPO: &str = "widgets";
pub const SHA: &str = "0123456789abcdef0123456789abcdef01234567";
pub const INSTALLATION_ID: u64 = 123;
pub const CHECK_RUN_ID: u64 = 456;
pub const CHECK_NAME: &str = "build";
pub const INTERNAL_SECRET: &str = "ci-shared-secret";
pub const WEBHOOK_SECRET: &str = "webhook-secret";

// ============================================================================
// Dedup store doubles
// ============================================================================

/// In-memory store that counts every call.
#[derive(Clone, Default)]
pub struct CountingDedupStore {
    inner: InMemoryDedupStore,
    calls: Arc<AtomicUsize>,
}

impl CountingDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryDedupStore {
        &self.inner
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DedupStore for CountingDedupStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DedupStoreError> {
        self.count();
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DedupStoreError> {
        self.count();
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, DedupStoreError> {
        self.count();
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), DedupStoreError> {
        self.count();
        self.inner.delete(key).await
    }
}

/// Store whose every call fails as if the backend were down.
pub struct UnavailableDedupStore;

fn unavailable() -> DedupStoreError {
    DedupStoreError::Unavailable {
        message: "connection refused".to_string(),
    }
}

#[async_trait]
impl DedupStore for UnavailableDedupStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, DedupStoreError> {
        Err(unavailable())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), DedupStoreError> {
        Err(unavailable())
    }

    async fn set_if_absent(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<bool, DedupStoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), DedupStoreError> {
        Err(unavailable())
    }
}

// ============================================================================
// Gateway fixture
// ============================================================================

/// Environment a fully configured gateway reads its secrets from.
pub fn default_env() -> HashMap<String, String> {
    [
        ("GH_APP_ID", "1"),
        ("GH_APP_PRIVATE_KEY", TEST_PRIVATE_KEY),
        ("GH_REPOSITORY", "octo-org/widgets"),
        ("INTERNAL_APP_SECRET", INTERNAL_SECRET),
        ("GITHUB_APP_ID_OCTO_ORG", "2"),
        ("GITHUB_PRIVATE_KEY_OCTO_ORG", TEST_PRIVATE_KEY),
        ("GITHUB_WEBHOOK_SECRET_OCTO_ORG", WEBHOOK_SECRET),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub struct TestGateway {
    pub app: Router,
    pub state: AppState,
    pub github: MockServer,
}

impl TestGateway {
    /// Gateway with default settings and a counting in-memory store.
    pub async fn start() -> (Self, CountingDedupStore) {
        let store = CountingDedupStore::new();
        let gateway = Self::build(|_, _| {}, Arc::new(store.clone())).await;
        (gateway, store)
    }

    /// Gateway with adjusted configuration, environment and store.
    pub async fn build<F>(configure: F, store: Arc<dyn DedupStore>) -> Self
    where
        F: FnOnce(&mut GatewayConfig, &mut HashMap<String, String>),
    {
        let github = MockServer::start().await;

        let mut config = GatewayConfig::default();
        config.github.api_url = github.uri();
        config.github.timeout_seconds = 5;
        config.supported_owners = vec![OWNER.to_string()];
        config.checks.names = vec![CHECK_NAME.to_string(), "test".to_string()];

        let mut env = default_env();
        configure(&mut config, &mut env);

        let secrets = GatewaySecrets::from_lookup(&config.supported_owners, |key| {
            env.get(key).cloned()
        })
        .expect("test secrets");
        let state = AppState::new(config, &secrets, store).expect("test app state");

        Self {
            app: create_router(state.clone()),
            state,
            github,
        }
    }

    /// Send one request and return status and body text.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    /// Requests GitHub received, optionally filtered by HTTP method.
    pub async fn github_requests(&self, http_method: Option<&str>) -> Vec<wiremock::Request> {
        self.github
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| http_method.is_none_or(|m| r.method.as_str() == m))
            .collect()
    }
}

// ============================================================================
// GitHub API mocks
// ============================================================================

pub async fn mount_installation(server: &MockServer, owner: &str, repo: &str, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{}/{}/installation", owner, repo)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "app_id": 1,
            "account": { "login": owner }
        })))
        .mount(server)
        .await;
}

pub async fn mount_access_token(server: &MockServer, installation_id: u64) {
    let expires_at = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    Mock::given(method("POST"))
        .and(path(format!(
            "/app/installations/{}/access_tokens",
            installation_id
        )))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "ghs_installation_token",
            "expires_at": expires_at
        })))
        .mount(server)
        .await;
}

pub fn check_run_json(id: u64, name: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "head_sha": SHA,
        "status": status,
        "conclusion": null
    })
}

pub async fn mount_check_runs(server: &MockServer, runs: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/repos/{}/{}/commits/{}/check-runs",
            OWNER, REPO, SHA
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": runs.len(),
            "check_runs": runs
        })))
        .mount(server)
        .await;
}

pub async fn mount_update(server: &MockServer, check_run_id: u64, expected_calls: u64) {
    Mock::given(method("PATCH"))
        .and(path(format!(
            "/repos/{}/{}/check-runs/{}",
            OWNER, REPO, check_run_id
        )))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(check_run_json(
                check_run_id,
                CHECK_NAME,
                "completed",
            )),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_create(server: &MockServer, owner: &str, repo: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/repos/{}/{}/check-runs", owner, repo)))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(check_run_json(1, CHECK_NAME, "queued")),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Everything a successful report needs from GitHub, with the update expected
/// `expected_updates` times.
pub async fn mount_report_happy_path(server: &MockServer, expected_updates: u64) {
    mount_installation(server, OWNER, REPO, INSTALLATION_ID).await;
    mount_access_token(server, INSTALLATION_ID).await;
    mount_check_runs(
        server,
        vec![
            check_run_json(111, "lint", "queued"),
            check_run_json(CHECK_RUN_ID, CHECK_NAME, "queued"),
        ],
    )
    .await;
    mount_update(server, CHECK_RUN_ID, expected_updates).await;
}

// ============================================================================
// Request builders
// ============================================================================

pub fn report_body(status: &str, conclusion: Option<&str>) -> Value {
    let mut body = json!({
        "sha": SHA,
        "name": CHECK_NAME,
        "status": status,
        "title": "Build finished",
        "summary": "<script>alert(1)</script> all good",
        "details_url": "https://ci.example.com/runs/42"
    });
    if let Some(conclusion) = conclusion {
        body["conclusion"] = json!(conclusion);
    }
    body
}

pub fn report_request(token: Option<&str>, body: &Value) -> Request<Body> {
    report_request_from(token, body, "203.0.113.7")
}

pub fn report_request_from(token: Option<&str>, body: &Value, client_ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/github-webhook/report")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client_ip);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn check_suite_payload(action: &str, owner: &str, repo: &str) -> Value {
    json!({
        "action": action,
        "check_suite": { "head_sha": SHA, "status": "queued" },
        "repository": {
            "name": repo,
            "full_name": format!("{}/{}", owner, repo),
            "owner": { "login": owner }
        },
        "installation": { "id": INSTALLATION_ID }
    })
}

pub fn sign(secret: &str, body: &[u8]) -> String {
    SignatureValidator::new(secret).sign(body).unwrap()
}

pub fn webhook_request(event: &str, signature: Option<&str>, body: &[u8]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/github-webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event);
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

/// Signed `check_suite` delivery.
pub fn signed_check_suite(secret: &str, action: &str, owner: &str, repo: &str) -> Request<Body> {
    let body = check_suite_payload(action, owner, repo).to_string();
    let signature = sign(secret, body.as_bytes());
    webhook_request("check_suite", Some(&signature), body.as_bytes())
}
