//! Integration tests for the content fetcher against a local HTTP server.

mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use keepsake_core::{FetchPolicy, Fetcher, SnapshotError, SourceUrl, UrlKind};

fn fetcher() -> Fetcher {
    Fetcher::new("keepsake-test").unwrap()
}

fn policy(max_size_bytes: u64) -> FetchPolicy {
    FetchPolicy {
        max_size_bytes,
        ..FetchPolicy::default()
    }
}

fn url(base: &str, path: &str) -> SourceUrl {
    SourceUrl::parse(&format!("{}{}", base, path)).unwrap()
}

// ─── Size policy ────────────────────────────────────────────────────

#[tokio::test]
async fn test_content_exactly_at_limit_is_accepted() {
    let base = common::spawn_server().await;

    let fetched = fetcher()
        .fetch(&url(&base, "/bytes/1024"), &policy(1024))
        .await
        .unwrap();
    assert_eq!(fetched.len(), 1024);
}

#[tokio::test]
async fn test_content_one_over_limit_is_rejected() {
    let base = common::spawn_server().await;

    let err = fetcher()
        .fetch(&url(&base, "/bytes/1025"), &policy(1024))
        .await
        .unwrap_err();
    match err {
        SnapshotError::ContentTooLarge { actual, max } => {
            assert_eq!(actual, 1025);
            assert_eq!(max, 1024);
        }
        other => panic!("expected ContentTooLarge, got {:?}", other),
    }
}

#[tokio::test]
async fn test_streamed_body_limit_without_content_length() {
    let base = common::spawn_server().await;

    let fetched = fetcher()
        .fetch(&url(&base, "/stream/4096"), &policy(4096))
        .await
        .unwrap();
    assert_eq!(fetched.len(), 4096);

    let err = fetcher()
        .fetch(&url(&base, "/stream/4097"), &policy(4096))
        .await
        .unwrap_err();
    match err {
        SnapshotError::ContentTooLarge { actual, max } => {
            assert!(actual > max);
            assert_eq!(max, 4096);
        }
        other => panic!("expected ContentTooLarge, got {:?}", other),
    }
}

// ─── Redirects ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_redirects_within_budget_are_followed() {
    let base = common::spawn_server().await;
    let policy = FetchPolicy {
        max_redirects: 3,
        ..FetchPolicy::default()
    };

    let fetched = fetcher()
        .fetch(&url(&base, "/redirect/3"), &policy)
        .await
        .unwrap();
    assert_eq!(fetched.bytes, b"landed");
    assert!(fetched.final_url.ends_with("/redirect/0"));
}

#[tokio::test]
async fn test_redirect_budget_exceeded() {
    let base = common::spawn_server().await;
    let policy = FetchPolicy {
        max_redirects: 3,
        ..FetchPolicy::default()
    };

    let err = fetcher()
        .fetch(&url(&base, "/redirect/4"), &policy)
        .await
        .unwrap_err();
    assert!(
        matches!(err, SnapshotError::TooManyRedirects { max: 3 }),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_zero_redirect_budget() {
    let base = common::spawn_server().await;
    let policy = FetchPolicy {
        max_redirects: 0,
        ..FetchPolicy::default()
    };

    assert!(fetcher()
        .fetch(&url(&base, "/redirect/0"), &policy)
        .await
        .is_ok());
    let err = fetcher()
        .fetch(&url(&base, "/redirect/1"), &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::TooManyRedirects { max: 0 }));
}

#[tokio::test]
async fn test_redirect_to_ftp_not_supported() {
    let base = common::spawn_server().await;

    let err = fetcher()
        .fetch(&url(&base, "/redirect-ftp"), &FetchPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::NotSupported(UrlKind::Ftp)));
}

// ─── Failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_timeout() {
    let base = common::spawn_server().await;
    let policy = FetchPolicy {
        timeout: Duration::from_millis(200),
        ..FetchPolicy::default()
    };

    let err = fetcher()
        .fetch(&url(&base, "/slow"), &policy)
        .await
        .unwrap_err();
    match err {
        SnapshotError::Timeout { after } => assert_eq!(after, Duration::from_millis(200)),
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(SnapshotError::Timeout {
        after: Duration::from_millis(200)
    }
    .is_transient());
}

#[tokio::test]
async fn test_error_status_carries_body_excerpt() {
    let base = common::spawn_server().await;

    let err = fetcher()
        .fetch(&url(&base, "/status/404"), &FetchPolicy::default())
        .await
        .unwrap_err();
    match &err {
        SnapshotError::Transport {
            status,
            body_excerpt,
        } => {
            assert_eq!(*status, 404);
            assert_eq!(body_excerpt, "status 404 body");
        }
        other => panic!("expected Transport, got {:?}", other),
    }
    assert!(!err.is_transient());
    assert_eq!(err.suggested_status(), 502);
}

#[tokio::test]
async fn test_server_errors_are_transient() {
    let base = common::spawn_server().await;

    let err = fetcher()
        .fetch(&url(&base, "/status/503"), &FetchPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::Transport { status: 503, .. }));
    assert!(err.is_transient());
}

// ─── Metadata ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_transport_metadata() {
    let base = common::spawn_server().await;

    let fetched = fetcher()
        .fetch(&url(&base, "/html"), &FetchPolicy::default())
        .await
        .unwrap();

    assert_eq!(fetched.bytes, common::HTML_DOC);
    assert_eq!(
        fetched.declared_mime_type.as_deref(),
        Some("text/html; charset=utf-8")
    );
    assert_eq!(fetched.entity_tag.as_deref(), Some(common::HTML_ETAG));
    assert_eq!(
        fetched.last_modified,
        Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
    );
    assert!(fetched.transport_encoding.is_none());
    assert!(fetched.final_url.ends_with("/html"));
}
