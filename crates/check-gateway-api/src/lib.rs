//! # Check Gateway API
//!
//! HTTP layer of the check-run gateway.
//!
//! Routes:
//! - `POST /api/github-webhook`: GitHub `check_suite` deliveries
//! - `POST /api/github-webhook/report`: CI status reports
//! - `GET /api/github-webhook/report`: readiness probe
//! - `GET /metrics`: Prometheus text format
//!
//! All shared state lives in [`AppState`], built once by the composition
//! root and cloned into every handler.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use check_gateway_core::{
    DedupStore, DefaultCircuitBreaker, InMemoryDedupStore, RequestId, SlidingWindowRateLimiter,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

pub mod config;
pub mod errors;
pub mod github;
pub mod handlers;
pub mod metrics;
pub mod secrets;

pub use config::{load_config, GatewayConfig};
pub use errors::{GatewayError, ServiceError};
pub use github::{OwnerRegistry, ReportBinding};
pub use handlers::{ReportOutcome, WebhookOutcome};
pub use metrics::GatewayMetrics;
pub use secrets::GatewaySecrets;

/// Header carrying the request id on every response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// How often idle rate-limiter windows and expired in-memory claims are dropped
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Circuit breaker guarding the report unit of work
pub type ReportCircuitBreaker = DefaultCircuitBreaker<ReportOutcome, GatewayError>;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub owners: Arc<OwnerRegistry>,
    pub report: Option<Arc<ReportBinding>>,
    pub internal_secret: Option<Arc<str>>,
    pub rate_limiter: Arc<SlidingWindowRateLimiter>,
    pub circuit_breaker: Arc<ReportCircuitBreaker>,
    pub dedup_store: Arc<dyn DedupStore>,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Build the state from validated configuration and secrets.
    ///
    /// Every GitHub App client is constructed here, so a bad private key
    /// stops start-up instead of failing the first request.
    pub fn new(
        config: GatewayConfig,
        secrets: &GatewaySecrets,
        dedup_store: Arc<dyn DedupStore>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let owners = OwnerRegistry::from_credentials(&secrets.owners, &config.github)?;
        let report = secrets
            .report
            .as_ref()
            .map(|credentials| ReportBinding::from_credentials(credentials, &config.github))
            .transpose()?
            .map(Arc::new);

        if secrets.internal_secret.is_none() {
            warn!("INTERNAL_APP_SECRET is not set; report requests will fail");
        }

        let metrics = GatewayMetrics::new().map_err(|e| ServiceError::Metrics {
            message: e.to_string(),
        })?;

        let rate_limiter = SlidingWindowRateLimiter::new(config.rate_limit.to_rate_limit_config());
        let circuit_breaker =
            DefaultCircuitBreaker::new(config.circuit_breaker.to_circuit_breaker_config());

        Ok(Self {
            config: Arc::new(config),
            owners: Arc::new(owners),
            report,
            internal_secret: secrets.internal_secret.as_deref().map(Arc::from),
            rate_limiter: Arc::new(rate_limiter),
            circuit_breaker: Arc::new(circuit_breaker),
            dedup_store,
            metrics: Arc::new(metrics),
        })
    }
}

/// Create the HTTP router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/api/github-webhook", post(handlers::handle_github_webhook))
        .route(
            "/api/github-webhook/report",
            post(handlers::handle_report).get(handlers::report_readiness),
        );

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(webhook_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size)),
        )
        .with_state(state)
}

/// Serve until SIGINT or SIGTERM.
///
/// After the signal, in-flight requests get `shutdown_timeout_seconds` to
/// finish before the server returns anyway.
pub async fn start_server(
    state: AppState,
    memory_store: Option<InMemoryDedupStore>,
) -> Result<(), ServiceError> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    let maintenance = tokio::spawn(run_maintenance(state.clone(), memory_store));
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let app = create_router(state);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let graceful = async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(graceful);

    let drain_deadline = async move {
        // Only start counting once the signal has arrived.
        if shutdown_rx.wait_for(|stopping| *stopping).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    let result = tokio::select! {
        result = server => result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        }),
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Shutdown timeout elapsed with requests still in flight"
            );
            Ok(())
        }
    };

    maintenance.abort();
    info!("HTTP server stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Periodically drop state that would otherwise grow without bound.
async fn run_maintenance(state: AppState, memory_store: Option<InMemoryDedupStore>) {
    let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
    interval.tick().await;

    loop {
        interval.tick().await;

        let idle_clients = state.rate_limiter.purge_idle();
        let expired_claims = match &memory_store {
            Some(store) => store.purge_expired().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to purge expired dedup entries");
                0
            }),
            None => 0,
        };

        debug!(idle_clients, expired_claims, "Maintenance pass complete");
    }
}

/// `GET /metrics`
async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// Assign a request id, log the request and its total duration.
///
/// The completion line is written for every response, whatever the handler
/// returned.
#[instrument(skip(request, next), fields(
    request_id,
    method = %request.method(),
    path = %request.uri().path(),
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();
    let request_id = RequestId::new();

    tracing::Span::current().record("request_id", request_id.as_str());
    request.extensions_mut().insert(request_id.clone());

    info!(request_id = %request_id, "Request started");

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            request_id = %request_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            request_id = %request_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            request_id = %request_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
