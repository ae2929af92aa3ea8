//! Configuration types for the gateway service.
//!
//! Every field has a default so an empty configuration is usable. Values are
//! layered by [`load_config`]: system file, local file, an explicit file and
//! finally `CG__`-prefixed environment variables.

use check_gateway_core::{
    check_run_update_circuit_breaker_config, CircuitBreakerConfig, ConfigError, RateLimitConfig,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};

/// Optional system-wide configuration file (extension resolved by `config`).
pub const SYSTEM_CONFIG_PATH: &str = "/etc/check-gateway/gateway";

/// Optional configuration file relative to the working directory.
pub const LOCAL_CONFIG_PATH: &str = "config/gateway";

/// Prefix for environment overrides, e.g. `CG__SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "CG";

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Report endpoint rate limiting
    pub rate_limit: RateLimitSettings,

    /// Circuit breaker around the report unit of work
    pub circuit_breaker: CircuitBreakerSettings,

    /// Dedup entry lifetimes
    pub dedup: DedupSettings,

    /// Check runs created for each check suite
    pub checks: ChecksConfig,

    /// GitHub API client settings
    pub github: GitHubSettings,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Owner logins accepted on the webhook route
    pub supported_owners: Vec<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Time allowed for in-flight requests after a shutdown signal
    pub shutdown_timeout_seconds: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Sliding-window limits for the report endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_seconds: u64,
    pub max_requests: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            max_requests: 100,
        }
    }
}

impl RateLimitSettings {
    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(self.window_seconds),
            max_requests: self.max_requests,
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let defaults = check_run_update_circuit_breaker_config();
        Self {
            failure_threshold: defaults.failure_threshold,
            recovery_timeout_seconds: defaults.recovery_timeout_seconds,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout_seconds: self.recovery_timeout_seconds,
            ..check_run_update_circuit_breaker_config()
        }
    }
}

/// Dedup entry lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Lifetime of `check:{id}:{status}:{conclusion}` entries
    pub report_ttl_seconds: u64,

    /// Lifetime of `checks-created:{sha}` entries
    pub webhook_ttl_seconds: u64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            report_ttl_seconds: 600,
            webhook_ttl_seconds: 600,
        }
    }
}

impl DedupSettings {
    pub fn report_ttl(&self) -> Duration {
        Duration::from_secs(self.report_ttl_seconds)
    }

    pub fn webhook_ttl(&self) -> Duration {
        Duration::from_secs(self.webhook_ttl_seconds)
    }
}

/// Check runs created when a check suite is requested
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub names: Vec<String>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            names: vec!["build".to_string(), "test".to_string()],
        }
    }
}

/// GitHub API client settings, shared by every App client the gateway builds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// API base URL (GitHub Enterprise or a mock server in tests)
    pub api_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            user_agent: format!("check-gateway/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: 30,
        }
    }
}

impl GitHubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl GatewayConfig {
    /// Check the configuration for values the gateway cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than zero"));
        }

        if self.rate_limit.window_seconds == 0 {
            return Err(invalid(
                "rate_limit.window_seconds",
                "must be greater than zero",
            ));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(invalid(
                "rate_limit.max_requests",
                "must be greater than zero",
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid(
                "circuit_breaker.failure_threshold",
                "must be greater than zero",
            ));
        }

        if self.circuit_breaker.recovery_timeout_seconds == 0 {
            return Err(invalid(
                "circuit_breaker.recovery_timeout_seconds",
                "must be greater than zero",
            ));
        }

        if self.dedup.report_ttl_seconds == 0 {
            return Err(invalid(
                "dedup.report_ttl_seconds",
                "must be greater than zero",
            ));
        }

        if self.dedup.webhook_ttl_seconds == 0 {
            return Err(invalid(
                "dedup.webhook_ttl_seconds",
                "must be greater than zero",
            ));
        }

        if self.checks.names.is_empty() {
            return Err(invalid("checks.names", "at least one check name is required"));
        }

        if let Some(name) = self
            .checks
            .names
            .iter()
            .find(|name| name.trim().is_empty() || name.chars().count() > 100)
        {
            return Err(invalid(
                "checks.names",
                &format!("check name '{}' must be 1-100 characters", name),
            ));
        }

        let mut seen = HashSet::new();
        for owner in &self.supported_owners {
            let login = owner.trim().to_lowercase();
            if login.is_empty() {
                return Err(invalid("supported_owners", "owner login cannot be empty"));
            }
            if !seen.insert(login) {
                return Err(invalid(
                    "supported_owners",
                    &format!("owner '{}' is listed more than once", owner),
                ));
            }
        }

        if url::Url::parse(&self.github.api_url).is_err() {
            return Err(invalid("github.api_url", "must be an absolute URL"));
        }

        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Load and validate the gateway configuration.
///
/// Sources, lowest precedence first:
/// 1. `/etc/check-gateway/gateway.{yaml,...}` (optional)
/// 2. `config/gateway.{yaml,...}` (optional)
/// 3. `explicit_path` (required when given)
/// 4. `CG__`-prefixed environment variables, `__` between sections
///
/// `CG__SUPPORTED_OWNERS` and `CG__CHECKS__NAMES` accept comma-separated
/// lists.
pub fn load_config(explicit_path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(SYSTEM_CONFIG_PATH).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_PATH).required(false));

    if let Some(path) = explicit_path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("supported_owners")
            .with_list_parse_key("checks.names")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .and_then(|settings| settings.try_deserialize::<GatewayConfig>())
        .map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
