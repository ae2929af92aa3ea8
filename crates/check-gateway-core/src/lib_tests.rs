use super::*;

#[test]
fn test_request_id_format() {
    let timestamp = Timestamp::now();
    let id = RequestId::at(timestamp);

    let (millis, suffix) = id.as_str().split_once('-').unwrap();
    assert_eq!(millis.parse::<i64>().unwrap(), timestamp.unix_millis());
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_request_ids_are_unique() {
    let timestamp = Timestamp::now();
    let ids: std::collections::HashSet<_> = (0..100).map(|_| RequestId::at(timestamp)).collect();
    assert_eq!(ids.len(), 100);
}

#[test]
fn test_timestamp_duration_since() {
    let earlier = Timestamp::from(Utc::now() - chrono::Duration::seconds(5));
    let later = Timestamp::now();

    assert!(later.duration_since(earlier) >= Duration::from_secs(5));
    assert_eq!(earlier.duration_since(later), Duration::ZERO);
}

#[test]
fn test_config_error_category() {
    let error = ConfigError::Missing {
        key: "INTERNAL_APP_SECRET".to_string(),
    };
    assert_eq!(error.error_category(), ErrorCategory::Configuration);
    assert_eq!(
        error.to_string(),
        "Missing required setting 'INTERNAL_APP_SECRET'"
    );
}
