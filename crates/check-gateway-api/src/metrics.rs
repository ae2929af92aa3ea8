//! Prometheus metrics for the gateway.
//!
//! Each [`GatewayMetrics`] owns its own [`Registry`], so several gateways
//! (or tests) can live in one process without name collisions.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Route label for the webhook endpoint
pub const WEBHOOK_ROUTE: &str = "webhook";

/// Route label for the report endpoint
pub const REPORT_ROUTE: &str = "report";

#[derive(Debug)]
pub struct GatewayMetrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_duration: HistogramVec,
    pub circuit_breaker_rejections: IntCounter,
    pub rate_limited: IntCounter,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "gateway_requests_total",
                "Requests handled per route and outcome",
            ),
            &["route", "outcome"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "gateway_request_duration_seconds",
                "Handler duration per route",
            )
            .buckets(vec![0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["route"],
        )?;
        let circuit_breaker_rejections = IntCounter::new(
            "gateway_circuit_breaker_rejections_total",
            "Report requests rejected while the circuit was open",
        )?;
        let rate_limited = IntCounter::new(
            "gateway_rate_limited_total",
            "Report requests rejected by the rate limiter",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(circuit_breaker_rejections.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            circuit_breaker_rejections,
            rate_limited,
        })
    }

    /// Count one finished request and its duration.
    pub fn record_request(&self, route: &str, outcome: &str, duration: Duration) {
        self.requests_total
            .with_label_values(&[route, outcome])
            .inc();
        self.request_duration
            .with_label_values(&[route])
            .observe(duration.as_secs_f64());
    }

    /// Render every metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
