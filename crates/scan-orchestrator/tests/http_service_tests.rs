//! HTTP client tests against a local mock server.
//!
//! Each test spins up its own `mockito` server and points an
//! `HttpScanService` at `<server>/api`.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use scanpost_core::config::ServiceConfig;
use scanpost_core::types::{CandidateFile, RemoteStatus};
use scanpost_orchestrator::{HttpScanService, ProgressFn, ScanError, ScanService};

fn service_for(server: &ServerGuard) -> HttpScanService {
    let config = ServiceConfig {
        base_url: format!("{}/api/", server.url()),
        request_timeout_secs: 5,
        upload_timeout_secs: 5,
    };
    HttpScanService::new(&config).unwrap()
}

fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
    (callback, seen)
}

fn pdf(size: usize) -> CandidateFile {
    CandidateFile::new(
        "invoice.pdf",
        Some("application/pdf".to_owned()),
        Bytes::from(vec![b'x'; size]),
    )
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/upload")
        .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="file""#.into()),
            Matcher::Regex(r#"filename="invoice.pdf""#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"fileId":"f-42","message":"stored"}"#)
        .create_async()
        .await;

    let service = service_for(&server);
    let (progress, seen) = recorder();
    let response = service.upload(&pdf(200 * 1024), progress).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.identifier().as_deref(), Some("f-42"));
    assert_eq!(response.body()["message"], "stored");

    let seen = seen.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn upload_error_carries_server_text() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/upload")
        .with_status(413)
        .with_body("  File too large  ")
        .create_async()
        .await;

    let service = service_for(&server);
    let (progress, _seen) = recorder();
    let err = service.upload(&pdf(16), progress).await.unwrap_err();

    assert_eq!(
        err,
        ScanError::Protocol {
            status: Some(413),
            message: "File too large".to_owned(),
        }
    );
}

#[tokio::test]
async fn empty_error_body_uses_fallback_text() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/scan/f-1")
        .with_status(500)
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.start_scan("f-1").await.unwrap_err();

    assert_eq!(
        err,
        ScanError::Protocol {
            status: Some(500),
            message: "scan failed to start".to_owned(),
        }
    );
}

#[tokio::test]
async fn start_scan_returns_scan_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/scan/f-1")
        .with_status(202)
        .with_body(r#"{"scanId":"s-9"}"#)
        .create_async()
        .await;

    let service = service_for(&server);
    let started = service.start_scan("f-1").await.unwrap();

    mock.assert_async().await;
    assert_eq!(started.identifier().as_deref(), Some("s-9"));
}

#[tokio::test]
async fn invalid_json_is_a_protocol_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/result/s-1")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.get_result("s-1").await.unwrap_err();

    match err {
        ScanError::Protocol { status, message } => {
            assert_eq!(status, Some(200));
            assert!(message.starts_with("invalid JSON response"));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn status_is_parsed_from_body() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/status/s-1")
        .with_status(200)
        .with_body(r#"{"status":"scanning","progress":40}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/status/s-2")
        .with_status(200)
        .with_body(r#"{"status":"quarantined"}"#)
        .create_async()
        .await;

    let service = service_for(&server);
    assert_eq!(
        service.get_status("s-1").await.unwrap().status,
        RemoteStatus::Scanning
    );
    assert_eq!(
        service.get_status("s-2").await.unwrap().status,
        RemoteStatus::Other("quarantined".to_owned())
    );
}

#[tokio::test]
async fn status_without_status_field_is_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/status/s-1")
        .with_status(200)
        .with_body(r#"{"state":"done"}"#)
        .create_async()
        .await;

    let service = service_for(&server);
    let err = service.get_status("s-1").await.unwrap_err();
    assert_eq!(err.kind(), "protocol");
}

#[tokio::test]
async fn result_body_is_returned_raw() {
    let mut server = Server::new_async().await;
    let body = json!({
        "details": { "status": "infected", "signature": "Eicar" },
        "scannedAt": "2025-06-01T12:00:00Z"
    });
    server
        .mock("GET", "/api/result/s-1")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let service = service_for(&server);
    assert_eq!(service.get_result("s-1").await.unwrap(), body);
}

#[tokio::test]
async fn unsafe_identifier_is_rejected_before_any_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let service = service_for(&server);
    for id in ["", "../etc/passwd", "a/b", "..", "id with space"] {
        let err = service.get_status(id).await.unwrap_err();
        assert!(
            matches!(err, ScanError::InvalidIdentifier(_)),
            "{id:?} gave {err:?}"
        );
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
    // bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ServiceConfig {
        base_url: format!("http://127.0.0.1:{port}/api"),
        request_timeout_secs: 2,
        upload_timeout_secs: 2,
    };
    let service = HttpScanService::new(&config).unwrap();

    let err = service.get_status("s-1").await.unwrap_err();
    assert_eq!(err.kind(), "network");
}

#[tokio::test]
async fn health_and_stats() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_body(r#"{"status":"ok","clamav":"up"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/health/stats")
        .with_status(503)
        .create_async()
        .await;

    let service = service_for(&server);
    assert_eq!(service.health().await.unwrap()["status"], "ok");

    let err = service.stats().await.unwrap_err();
    assert_eq!(
        err,
        ScanError::Protocol {
            status: Some(503),
            message: "failed to get stats".to_owned(),
        }
    );
}
