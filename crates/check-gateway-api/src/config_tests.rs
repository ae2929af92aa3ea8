//! Tests for [`GatewayConfig`] defaults, validation and loading.

use super::*;
use std::io::Write;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

mod defaults {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = GatewayConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout_seconds, 60);
        assert_eq!(config.dedup.report_ttl(), Duration::from_secs(600));
        assert_eq!(config.dedup.webhook_ttl(), Duration::from_secs(600));
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.timeout(), Duration::from_secs(30));
        assert!(config.supported_owners.is_empty());
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_breaker_config_keeps_service_name() {
        let settings = CircuitBreakerSettings {
            failure_threshold: 2,
            recovery_timeout_seconds: 10,
        };

        let config = settings.to_circuit_breaker_config();
        assert_eq!(config.service_name, "check-run-update");
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_rate_limit_conversion() {
        let settings = RateLimitSettings {
            window_seconds: 5,
            max_requests: 3,
        };

        let config = settings.to_rate_limit_config();
        assert_eq!(config.window, Duration::from_secs(5));
        assert_eq!(config.max_requests, 3);
    }
}

mod validation {
    use super::*;

    fn assert_invalid(config: GatewayConfig, expected_key: &str) {
        match config.validate() {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected Invalid for {}, got {:?}", expected_key, other),
        }
    }

    #[test]
    fn test_zero_rate_limit_window_rejected() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_seconds = 0;
        assert_invalid(config, "rate_limit.window_seconds");
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let mut config = GatewayConfig::default();
        config.rate_limit.max_requests = 0;
        assert_invalid(config, "rate_limit.max_requests");
    }

    #[test]
    fn test_zero_failure_threshold_rejected() {
        let mut config = GatewayConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        assert_invalid(config, "circuit_breaker.failure_threshold");
    }

    #[test]
    fn test_zero_recovery_timeout_rejected() {
        let mut config = GatewayConfig::default();
        config.circuit_breaker.recovery_timeout_seconds = 0;
        assert_invalid(config, "circuit_breaker.recovery_timeout_seconds");
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = GatewayConfig::default();
        config.dedup.webhook_ttl_seconds = 0;
        assert_invalid(config, "dedup.webhook_ttl_seconds");
    }

    #[test]
    fn test_empty_check_names_rejected() {
        let mut config = GatewayConfig::default();
        config.checks.names.clear();
        assert_invalid(config, "checks.names");
    }

    #[test]
    fn test_blank_check_name_rejected() {
        let mut config = GatewayConfig::default();
        config.checks.names = vec!["build".to_string(), "  ".to_string()];
        assert_invalid(config, "checks.names");
    }

    #[test]
    fn test_duplicate_owner_rejected_case_insensitively() {
        let mut config = GatewayConfig::default();
        config.supported_owners = vec!["Octo-Org".to_string(), "octo-org".to_string()];
        assert_invalid(config, "supported_owners");
    }

    #[test]
    fn test_relative_api_url_rejected() {
        let mut config = GatewayConfig::default();
        config.github.api_url = "api.github.com".to_string();
        assert_invalid(config, "github.api_url");
    }
}

mod loading {
    use super::*;

    #[test]
    fn test_load_explicit_yaml_file() {
        let file = write_yaml(
            r#"
server:
  port: 8080
rate_limit:
  max_requests: 10
checks:
  names: ["lint", "unit-tests", "e2e"]
supported_owners: ["octo-org", "other-org"]
logging:
  json_format: true
"#,
        );

        let config = load_config(Some(file.path())).expect("load config");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.checks.names, vec!["lint", "unit-tests", "e2e"]);
        assert_eq!(config.supported_owners, vec!["octo-org", "other-org"]);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("absent.yaml");

        let result = load_config(Some(&path));
        assert!(matches!(result, Err(ConfigError::Load { .. })));
    }

    #[test]
    fn test_wrong_type_fails_to_load() {
        let file = write_yaml("server:\n  port: not-a-number\n");

        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Load { .. })));
    }

    #[test]
    fn test_loaded_config_is_validated() {
        let file = write_yaml("checks:\n  names: []\n");

        let result = load_config(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
