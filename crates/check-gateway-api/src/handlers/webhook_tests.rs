use super::*;
use axum::http::HeaderValue;

#[test]
fn test_missing_headers_default_to_empty() {
    let headers = HeaderMap::new();
    assert_eq!(header_str(&headers, SIGNATURE_HEADER), "");
    assert_eq!(header_str(&headers, EVENT_HEADER), "");
}

#[test]
fn test_header_value_read() {
    let mut headers = HeaderMap::new();
    headers.insert(EVENT_HEADER, HeaderValue::from_static("check_suite"));
    assert_eq!(header_str(&headers, EVENT_HEADER), "check_suite");
}

#[test]
fn test_non_ascii_header_reads_as_empty() {
    let mut headers = HeaderMap::new();
    headers.insert(
        SIGNATURE_HEADER,
        HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
    );
    assert_eq!(header_str(&headers, SIGNATURE_HEADER), "");
}

#[test]
fn test_outcome_messages() {
    assert_eq!(WebhookOutcome::Ignored.message(), "Event ignored");
    assert_eq!(
        WebhookOutcome::Created { count: 2 }.message(),
        "✅ All check runs created"
    );
    assert_eq!(
        WebhookOutcome::AlreadyCreated.message(),
        "⏭️ Checks already created for this SHA."
    );
}

#[test]
fn test_outcome_labels() {
    assert_eq!(WebhookOutcome::Ignored.outcome(), "ignored");
    assert_eq!(WebhookOutcome::Created { count: 1 }.outcome(), "created");
    assert_eq!(WebhookOutcome::AlreadyCreated.outcome(), "already_created");
}
