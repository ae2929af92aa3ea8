use super::*;
use crate::adapters::InMemoryDedupStore;
use std::sync::atomic::{AtomicU32, Ordering};

const TTL: Duration = Duration::from_secs(600);

/// Store whose every operation fails.
struct UnavailableStore;

#[async_trait]
impl DedupStore for UnavailableStore {
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

fn unavailable() -> DedupStoreError {
    DedupStoreError::Unavailable {
        message: "connection refused".to_string(),
    }
}

mod keys {
    use super::*;

    #[test]
    fn test_check_run_update_key_with_conclusion() {
        let key = DedupKey::check_run_update(
            42,
            CheckRunStatus::Completed,
            Some(CheckConclusion::Success),
        );
        assert_eq!(key.as_str(), "check:42:completed:success");
    }

    #[test]
    fn test_check_run_update_key_without_conclusion() {
        let key = DedupKey::check_run_update(42, CheckRunStatus::InProgress, None);
        assert_eq!(key.to_string(), "check:42:in_progress:none");
    }

    #[test]
    fn test_distinct_triples_produce_distinct_keys() {
        let a = DedupKey::check_run_update(1, CheckRunStatus::Completed, Some(CheckConclusion::Success));
        let b = DedupKey::check_run_update(1, CheckRunStatus::Completed, Some(CheckConclusion::Failure));
        let c = DedupKey::check_run_update(2, CheckRunStatus::Completed, Some(CheckConclusion::Success));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_checks_created_key() {
        assert_eq!(
            DedupKey::checks_created("abc123").as_str(),
            "checks-created:abc123"
        );
    }
}

mod perform_once {
    use super::*;

    #[tokio::test]
    async fn test_first_call_performs_operation() {
        let store = InMemoryDedupStore::new();
        let key = DedupKey::checks_created("abc");

        let outcome = perform_once(&store, &key, TTL, || async { Ok::<_, String>(7) })
            .await
            .unwrap();

        assert_eq!(outcome, Claimed::Performed(7));
        assert!(store.get(key.as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_call_is_duplicate_and_skips_operation() {
        let store = InMemoryDedupStore::new();
        let key = DedupKey::checks_created("abc");
        let invocations = AtomicU32::new(0);

        for _ in 0..2 {
            let _ = perform_once(&store, &key, TTL, || async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await
            .unwrap();
        }

        let outcome = perform_once(&store, &key, TTL, || async { Ok::<_, String>(()) })
            .await
            .unwrap();
        assert_eq!(outcome, Claimed::Duplicate);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_operation_releases_claim() {
        let store = InMemoryDedupStore::new();
        let key = DedupKey::checks_created("abc");

        let result = perform_once(&store, &key, TTL, || async {
            Err::<(), _>("github down".to_string())
        })
        .await;
        match result {
            Err(ClaimError::Operation(message)) => assert_eq!(message, "github down"),
            other => panic!("Expected operation error, got {:?}", other),
        }
        assert_eq!(store.get(key.as_str()).await.unwrap(), None);

        let retry = perform_once(&store, &key, TTL, || async { Ok::<_, String>(()) })
            .await
            .unwrap();
        assert_eq!(retry, Claimed::Performed(()));
    }

    #[tokio::test]
    async fn test_store_error_propagates_without_running_operation() {
        let key = DedupKey::checks_created("abc");
        let invocations = AtomicU32::new(0);

        let result = perform_once(&UnavailableStore, &key, TTL, || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await;

        assert!(matches!(result, Err(ClaimError::Store(DedupStoreError::Unavailable { .. }))));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn test_error_transience() {
    assert!(unavailable().is_transient());
    assert!(DedupStoreError::RequestFailed {
        status: 503,
        message: String::new()
    }
    .is_transient());
    assert!(!DedupStoreError::RequestFailed {
        status: 401,
        message: String::new()
    }
    .is_transient());
    assert!(!DedupStoreError::CommandRejected {
        message: "ERR wrong number of arguments".to_string()
    }
    .is_transient());
}
