//! Tests for the GitHub App authentication provider.

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Helpers
// ============================================================================

/// JWT generator returning a fixed token and counting invocations.
struct StaticJwtGenerator {
    calls: AtomicUsize,
}

impl StaticJwtGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl JwtGenerator for StaticJwtGenerator {
    async fn generate_jwt(&self, app_id: GitHubAppId) -> Result<JsonWebToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(JsonWebToken::new(
            "app.jwt.token".to_string(),
            app_id,
            Utc::now() + Duration::minutes(10),
        ))
    }

    fn expiration_duration(&self) -> Duration {
        Duration::minutes(10)
    }
}

fn create_auth(server: &MockServer, generator: Arc<StaticJwtGenerator>) -> GitHubAppAuth {
    let config = AuthConfig {
        github_api_url: server.uri(),
        ..AuthConfig::default()
    };

    GitHubAppAuth::with_components(
        GitHubAppId::new(42),
        generator,
        Arc::new(InMemoryTokenCache::new()),
        config,
    )
    .unwrap()
}

fn token_body(token: &str, expires_in: Duration) -> serde_json::Value {
    serde_json::json!({
        "token": token,
        "expires_at": (Utc::now() + expires_in).to_rfc3339(),
        "permissions": { "checks": "write", "metadata": "read" },
        "repository_selection": "all"
    })
}

// ============================================================================
// Installation Token Exchange
// ============================================================================

mod installation_token_tests {
    use super::*;

    /// Verify the JWT is exchanged for an installation token.
    #[tokio::test]
    async fn test_exchange_uses_app_jwt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/123/access_tokens"))
            .and(header("Authorization", "Bearer app.jwt.token"))
            .and(header("Accept", "application/vnd.github+json"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(token_body("ghs_one", Duration::hours(1))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = create_auth(&server, Arc::new(StaticJwtGenerator::new()));
        let token = auth
            .installation_token(InstallationId::new(123))
            .await
            .unwrap();

        assert_eq!(token.token(), "ghs_one");
        assert_eq!(token.installation_id(), InstallationId::new(123));
    }

    /// Verify a fresh cached token is reused without another exchange.
    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/9/access_tokens"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(token_body("ghs_cached", Duration::hours(1))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let auth = create_auth(&server, Arc::new(StaticJwtGenerator::new()));
        let first = auth.installation_token(InstallationId::new(9)).await.unwrap();
        let second = auth.installation_token(InstallationId::new(9)).await.unwrap();

        assert_eq!(first.token(), second.token());
    }

    /// Verify a token inside the refresh margin is exchanged again.
    #[tokio::test]
    async fn test_token_near_expiry_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/9/access_tokens"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(token_body("ghs_short", Duration::minutes(2))),
            )
            .expect(2)
            .mount(&server)
            .await;

        let auth = create_auth(&server, Arc::new(StaticJwtGenerator::new()));
        auth.installation_token(InstallationId::new(9)).await.unwrap();
        auth.installation_token(InstallationId::new(9)).await.unwrap();
    }

    /// Verify refresh always performs an exchange.
    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/1/access_tokens"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(token_body("ghs_new", Duration::hours(1))),
            )
            .expect(2)
            .mount(&server)
            .await;

        let auth = create_auth(&server, Arc::new(StaticJwtGenerator::new()));
        auth.installation_token(InstallationId::new(1)).await.unwrap();
        auth.refresh_installation_token(InstallationId::new(1))
            .await
            .unwrap();
    }

    /// Verify 404 maps to InstallationNotFound.
    #[tokio::test]
    async fn test_unknown_installation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/404/access_tokens"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let auth = create_auth(&server, Arc::new(StaticJwtGenerator::new()));
        let result = auth.installation_token(InstallationId::new(404)).await;

        assert!(matches!(
            result,
            Err(AuthError::InstallationNotFound { installation_id }) if installation_id.as_u64() == 404
        ));
    }

    /// Verify server errors surface as transient exchange failures.
    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/5/access_tokens"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let auth = create_auth(&server, Arc::new(StaticJwtGenerator::new()));
        let error = auth
            .installation_token(InstallationId::new(5))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            AuthError::TokenExchangeFailed { status: 502, .. }
        ));
        assert!(error.is_transient());
    }
}

// ============================================================================
// App JWT Caching
// ============================================================================

mod app_token_tests {
    use super::*;

    /// Verify the app JWT is generated once and then served from cache.
    #[tokio::test]
    async fn test_app_token_is_cached() {
        let server = MockServer::start().await;
        let generator = Arc::new(StaticJwtGenerator::new());
        let auth = create_auth(&server, generator.clone());

        let first = auth.app_token().await.unwrap();
        let second = auth.app_token().await.unwrap();

        assert_eq!(first.token(), second.token());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    /// Verify a provider built from a real key signs tokens.
    #[tokio::test]
    async fn test_new_with_real_key() {
        let key = PrivateKey::from_pem(include_str!("../../testdata/app_private_key.pem")).unwrap();
        let auth = GitHubAppAuth::new(GitHubAppId::new(7), key, AuthConfig::default()).unwrap();

        let jwt = auth.app_token().await.unwrap();

        assert_eq!(jwt.app_id(), GitHubAppId::new(7));
        assert_eq!(jwt.token().split('.').count(), 3);
    }
}
