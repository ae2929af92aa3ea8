//! Tests for token cache implementation.

use super::*;
use chrono::{Duration, Utc};

// ============================================================================
// Helper Functions
// ============================================================================

fn create_test_jwt(app_id: u64) -> JsonWebToken {
    JsonWebToken::new(
        format!("test.jwt.{}", app_id),
        GitHubAppId::new(app_id),
        Utc::now() + Duration::minutes(10),
    )
}

fn create_test_installation_token(installation_id: u64, ttl: Duration) -> InstallationToken {
    InstallationToken::new(
        format!("ghs_test_{}", installation_id),
        InstallationId::new(installation_id),
        Utc::now() + ttl,
    )
}

// ============================================================================
// JWT Caching Tests
// ============================================================================

mod jwt_cache_tests {
    use super::*;

    /// Verify JWT can be stored and retrieved.
    #[tokio::test]
    async fn test_store_and_get_jwt() {
        let cache = InMemoryTokenCache::new();
        cache.store_jwt(create_test_jwt(42)).await.unwrap();

        let cached = cache.get_jwt(GitHubAppId::new(42)).await.unwrap();

        assert_eq!(cached.unwrap().token(), "test.jwt.42");
    }

    /// Verify lookups for other apps miss.
    #[tokio::test]
    async fn test_get_jwt_for_unknown_app() {
        let cache = InMemoryTokenCache::new();
        cache.store_jwt(create_test_jwt(1)).await.unwrap();

        assert!(cache.get_jwt(GitHubAppId::new(2)).await.unwrap().is_none());
    }
}

// ============================================================================
// Installation Token Caching Tests
// ============================================================================

mod installation_cache_tests {
    use super::*;

    /// Verify installation tokens are keyed by installation id.
    #[tokio::test]
    async fn test_store_and_get_installation_token() {
        let cache = InMemoryTokenCache::new();
        cache
            .store_installation_token(create_test_installation_token(10, Duration::hours(1)))
            .await
            .unwrap();
        cache
            .store_installation_token(create_test_installation_token(20, Duration::hours(1)))
            .await
            .unwrap();

        let token = cache
            .get_installation_token(InstallationId::new(20))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(token.token(), "ghs_test_20");
        assert_eq!(cache.installation_token_count(), 2);
    }

    /// Verify an expired token is never returned and is evicted on read.
    #[tokio::test]
    async fn test_expired_token_is_not_returned() {
        let cache = InMemoryTokenCache::new();
        cache
            .store_installation_token(create_test_installation_token(
                5,
                Duration::seconds(-1),
            ))
            .await
            .unwrap();

        let token = cache
            .get_installation_token(InstallationId::new(5))
            .await
            .unwrap();

        assert!(token.is_none());
        assert_eq!(cache.installation_token_count(), 0);
    }

    /// Verify invalidation removes the token.
    #[tokio::test]
    async fn test_invalidate_installation_token() {
        let cache = InMemoryTokenCache::new();
        cache
            .store_installation_token(create_test_installation_token(7, Duration::hours(1)))
            .await
            .unwrap();

        cache
            .invalidate_installation_token(InstallationId::new(7))
            .await
            .unwrap();

        assert!(cache
            .get_installation_token(InstallationId::new(7))
            .await
            .unwrap()
            .is_none());
    }

    /// Verify cleanup drops expired entries and keeps valid ones.
    #[tokio::test]
    async fn test_cleanup_expired_tokens() {
        let cache = InMemoryTokenCache::new();
        cache
            .store_installation_token(create_test_installation_token(1, Duration::hours(1)))
            .await
            .unwrap();
        cache
            .store_installation_token(create_test_installation_token(
                2,
                Duration::seconds(-5),
            ))
            .await
            .unwrap();

        cache.cleanup_expired_tokens();

        assert_eq!(cache.installation_token_count(), 1);
    }
}
