//! Integration tests: full submit -> poll -> result flow.
//!
//! Runs the orchestrator against an in-memory fake service on a paused
//! tokio clock, so 120 status checks at 1.5s take no wall time and the
//! exact number of remote calls can be asserted.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;

use scanpost_core::types::{CandidateFile, Phase, RemoteStatus, Tone, Verdict};
use scanpost_orchestrator::{
    OrchestratorConfigBuilder, ScanError, ScanEvent, ScanOrchestrator, ScanOrchestratorBuilder,
};

// Fake scanning service for integration tests
mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::Value;

    use super::*;
    use scanpost_orchestrator::{
        ProgressFn, ScanService, ScanStartResponse, StatusReport, UploadResponse,
    };

    pub struct FakeScanService {
        upload_body: Value,
        upload_delay: Option<Duration>,
        statuses: Mutex<VecDeque<&'static str>>,
        result: Value,
        started_with: Mutex<Option<String>>,
        upload_calls: AtomicU32,
        scan_calls: AtomicU32,
        status_calls: AtomicU32,
        result_calls: AtomicU32,
    }

    impl FakeScanService {
        pub fn new(statuses: &[&'static str]) -> Self {
            Self {
                upload_body: json!({ "fileId": "file-abc" }),
                upload_delay: None,
                statuses: Mutex::new(statuses.iter().copied().collect()),
                result: json!({ "status": "clean", "meta": { "originalName": "a.pdf" } }),
                started_with: Mutex::new(None),
                upload_calls: AtomicU32::new(0),
                scan_calls: AtomicU32::new(0),
                status_calls: AtomicU32::new(0),
                result_calls: AtomicU32::new(0),
            }
        }

        pub fn upload_body(mut self, body: Value) -> Self {
            self.upload_body = body;
            self
        }

        pub fn upload_delay(mut self, delay: Duration) -> Self {
            self.upload_delay = Some(delay);
            self
        }

        pub fn result(mut self, result: Value) -> Self {
            self.result = result;
            self
        }

        pub fn upload_calls(&self) -> u32 {
            self.upload_calls.load(Ordering::SeqCst)
        }

        pub fn scan_calls(&self) -> u32 {
            self.scan_calls.load(Ordering::SeqCst)
        }

        pub fn status_calls(&self) -> u32 {
            self.status_calls.load(Ordering::SeqCst)
        }

        pub fn result_calls(&self) -> u32 {
            self.result_calls.load(Ordering::SeqCst)
        }

        pub fn started_with(&self) -> Option<String> {
            self.started_with.lock().unwrap().clone()
        }
    }

    impl ScanService for FakeScanService {
        async fn upload(
            &self,
            file: &CandidateFile,
            on_progress: ProgressFn,
        ) -> Result<UploadResponse, ScanError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            on_progress(0);
            if let Some(delay) = self.upload_delay {
                tokio::time::sleep(delay).await;
            }
            if file.data.is_empty() {
                on_progress(100);
            } else {
                on_progress(60);
                on_progress(100);
            }
            Ok(UploadResponse::new(self.upload_body.clone()))
        }

        async fn start_scan(&self, upload_id: &str) -> Result<ScanStartResponse, ScanError> {
            self.scan_calls.fetch_add(1, Ordering::SeqCst);
            *self.started_with.lock().unwrap() = Some(upload_id.to_owned());
            Ok(ScanStartResponse::new(json!({ "scanId": "scan-xyz" })))
        }

        async fn get_status(&self, _scan_id: &str) -> Result<StatusReport, ScanError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap_or("scanning")
            } else {
                statuses.front().copied().unwrap_or("scanning")
            };
            Ok(StatusReport::new(RemoteStatus::parse(status)))
        }

        async fn get_result(&self, _scan_id: &str) -> Result<Value, ScanError> {
            self.result_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }
}

use fake::FakeScanService;

const INTERVAL: Duration = Duration::from_millis(1500);

fn pdf() -> CandidateFile {
    CandidateFile::new(
        "invoice.pdf",
        Some("application/pdf".to_owned()),
        Bytes::from_static(b"%PDF-1.4 integration"),
    )
}

fn setup(
    service: FakeScanService,
) -> (
    ScanOrchestrator<FakeScanService>,
    mpsc::Receiver<ScanEvent>,
    Arc<FakeScanService>,
) {
    let service = Arc::new(service);
    let (orchestrator, rx) = ScanOrchestratorBuilder::new()
        .service(Arc::clone(&service))
        .build()
        .unwrap();
    (orchestrator, rx.unwrap(), service)
}

async fn next_terminal(rx: &mut mpsc::Receiver<ScanEvent>) -> ScanEvent {
    loop {
        let event = rx.recv().await.expect("event channel closed");
        if event.is_terminal() {
            return event;
        }
    }
}

// paused-clock deadlines are rounded to the millisecond
fn assert_near(elapsed: Duration, expected: Duration) {
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "elapsed {elapsed:?}, expected about {expected:?}"
    );
}

fn drain(rx: &mut mpsc::Receiver<ScanEvent>) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn three_ticks_then_one_result_fetch() {
    let (orchestrator, mut rx, service) =
        setup(FakeScanService::new(&["pending", "scanning", "completed"]));

    let started = Instant::now();
    orchestrator.submit(pdf()).await.unwrap();
    let event = next_terminal(&mut rx).await;

    assert!(matches!(event, ScanEvent::Completed { .. }));
    assert_eq!(service.status_calls(), 3);
    assert_eq!(service.result_calls(), 1);
    assert_near(started.elapsed(), INTERVAL * 3);

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(snapshot.poll_attempt, 3);
    assert_eq!(snapshot.last_status.as_deref(), Some("completed"));
    assert_eq!(snapshot.indicator.tone, Tone::Success);
    assert_eq!(snapshot.result.unwrap().meta.original_name(), Some("a.pdf"));

    // nothing else happens afterwards
    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(service.status_calls(), 3);
    assert_eq!(service.result_calls(), 1);
    assert!(!orchestrator.is_polling());
}

#[tokio::test(start_paused = true)]
async fn times_out_after_exactly_120_checks() {
    let (orchestrator, mut rx, service) = setup(FakeScanService::new(&["scanning"]));

    let started = Instant::now();
    orchestrator.submit(pdf()).await.unwrap();
    let event = next_terminal(&mut rx).await;

    match event {
        ScanEvent::Failed { error, .. } => {
            assert_eq!(error, ScanError::Timeout { attempts: 120 });
        }
        other => panic!("expected timeout failure, got {other:?}"),
    }
    assert_near(started.elapsed(), Duration::from_secs(180));
    assert_eq!(service.status_calls(), 120);
    assert_eq!(service.result_calls(), 0);

    // no 121st call
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.status_calls(), 120);

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Failed);
    assert_eq!(snapshot.poll_attempt, 120);
    assert_eq!(snapshot.failure.unwrap().kind, "timeout");
    assert!(!orchestrator.is_polling());
}

#[tokio::test(start_paused = true)]
async fn custom_ceiling_is_honoured() {
    let service = Arc::new(FakeScanService::new(&["pending"]));
    let config = OrchestratorConfigBuilder::new()
        .poll_interval_ms(200)
        .max_poll_attempts(5)
        .build()
        .unwrap();
    let (orchestrator, rx) = ScanOrchestratorBuilder::new()
        .config(config)
        .service(Arc::clone(&service))
        .build()
        .unwrap();
    let mut rx = rx.unwrap();

    orchestrator.submit(pdf()).await.unwrap();
    next_terminal(&mut rx).await;
    assert_eq!(service.status_calls(), 5);
    assert_eq!(orchestrator.phase(), Phase::Failed);
}

#[tokio::test(start_paused = true)]
async fn terminal_on_last_allowed_tick_still_completes() {
    let mut statuses = vec!["scanning"; 119];
    statuses.push("completed");
    let (orchestrator, mut rx, service) = setup(FakeScanService::new(&statuses));

    orchestrator.submit(pdf()).await.unwrap();
    let event = next_terminal(&mut rx).await;

    assert!(matches!(event, ScanEvent::Completed { .. }));
    assert_eq!(service.status_calls(), 120);
    assert_eq!(service.result_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_while_scanning_stops_polling() {
    let (orchestrator, mut rx, service) = setup(FakeScanService::new(&["scanning"]));

    orchestrator.submit(pdf()).await.unwrap();
    tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(100)).await;
    assert_eq!(service.status_calls(), 3);

    orchestrator.reset();
    let reset_events = drain(&mut rx);
    assert!(matches!(
        reset_events.last(),
        Some(ScanEvent::PhaseChanged {
            phase: Phase::Idle,
            ..
        })
    ));

    tokio::time::sleep(INTERVAL * 20).await;
    assert_eq!(service.status_calls(), 3);
    assert!(drain(&mut rx).is_empty());

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.poll_attempt, 0);
    assert!(snapshot.scan_id.is_none());
    assert!(!orchestrator.is_polling());
}

#[tokio::test(start_paused = true)]
async fn reset_during_upload_supersedes_submit() {
    let service = FakeScanService::new(&["completed"]).upload_delay(Duration::from_secs(5));
    let (orchestrator, _rx, service) = setup(service);

    let pending = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.submit(pdf()).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(orchestrator.phase(), Phase::Uploading);

    orchestrator.reset();
    let outcome = pending.await.unwrap();

    assert_eq!(outcome, Err(ScanError::Superseded));
    assert_eq!(orchestrator.phase(), Phase::Idle);
    assert_eq!(service.scan_calls(), 0);
    assert_eq!(orchestrator.snapshot().progress_percent, 0);
}

#[tokio::test(start_paused = true)]
async fn submit_during_upload_is_rejected() {
    let service = FakeScanService::new(&["completed"]).upload_delay(Duration::from_secs(2));
    let (orchestrator, mut rx, service) = setup(service);

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.submit(pdf()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = orchestrator.submit(pdf()).await;
    assert_eq!(second, Err(ScanError::Busy));

    let first_id = first.await.unwrap().unwrap();
    next_terminal(&mut rx).await;

    assert_eq!(service.upload_calls(), 1);
    assert_eq!(service.scan_calls(), 1);
    assert_eq!(orchestrator.snapshot().session_id, first_id);
    assert_eq!(orchestrator.phase(), Phase::Completed);
}

#[tokio::test(start_paused = true)]
async fn submit_during_scanning_is_rejected() {
    let (orchestrator, _rx, service) = setup(FakeScanService::new(&["scanning"]));

    orchestrator.submit(pdf()).await.unwrap();
    tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;

    assert_eq!(orchestrator.submit(pdf()).await, Err(ScanError::Busy));
    tokio::time::sleep(INTERVAL * 2).await;

    // a single loop keeps ticking at the original cadence
    assert_eq!(service.status_calls(), 3);
    assert_eq!(service.upload_calls(), 1);
    orchestrator.reset();
}

#[tokio::test(start_paused = true)]
async fn plain_id_in_upload_response_is_accepted() {
    let service = FakeScanService::new(&["completed"]).upload_body(json!({ "id": "u-77" }));
    let (orchestrator, mut rx, service) = setup(service);

    orchestrator.submit(pdf()).await.unwrap();
    next_terminal(&mut rx).await;

    assert_eq!(service.started_with().as_deref(), Some("u-77"));
    assert_eq!(orchestrator.snapshot().upload_id.as_deref(), Some("u-77"));
    assert_eq!(orchestrator.phase(), Phase::Completed);
}

#[tokio::test(start_paused = true)]
async fn numeric_upload_id_is_accepted() {
    let service = FakeScanService::new(&["completed"]).upload_body(json!({ "fileId": 12 }));
    let (orchestrator, mut rx, service) = setup(service);

    orchestrator.submit(pdf()).await.unwrap();
    next_terminal(&mut rx).await;
    assert_eq!(service.started_with().as_deref(), Some("12"));
}

#[tokio::test(start_paused = true)]
async fn infected_nested_result_is_normalized() {
    let service = FakeScanService::new(&["pending", "completed"]).result(json!({
        "details": {
            "status": "infected",
            "signature": "Eicar-Test-Signature",
            "meta": { "originalName": "invoice.pdf", "size": 20 }
        },
        "scannedAt": "2025-06-01T12:00:00Z"
    }));
    let (orchestrator, mut rx, _service) = setup(service);

    orchestrator.submit(pdf()).await.unwrap();
    let event = next_terminal(&mut rx).await;

    let ScanEvent::Completed {
        result, indicator, ..
    } = event
    else {
        panic!("expected completion");
    };
    assert_eq!(result.status, Verdict::Infected);
    assert_eq!(result.signature.as_deref(), Some("Eicar-Test-Signature"));
    assert_eq!(result.scanned_at.as_deref(), Some("2025-06-01T12:00:00Z"));
    assert_eq!(indicator.tone, Tone::Danger);
}

#[tokio::test(start_paused = true)]
async fn poll_attempts_strictly_increase() {
    let (orchestrator, mut rx, _service) =
        setup(FakeScanService::new(&["pending", "pending", "scanning", "completed"]));

    orchestrator.submit(pdf()).await.unwrap();

    let mut attempts = Vec::new();
    loop {
        let event = rx.recv().await.unwrap();
        if let ScanEvent::StatusObserved { attempt, .. } = &event {
            attempts.push(*attempt);
        }
        if event.is_terminal() {
            break;
        }
    }
    assert_eq!(attempts, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn upload_progress_is_reported_while_uploading() {
    let (orchestrator, mut rx, _service) = setup(FakeScanService::new(&["completed"]));

    let session_id = orchestrator.submit(pdf()).await.unwrap();

    let progress: Vec<u8> = drain(&mut rx)
        .into_iter()
        .filter(|e| e.session_id() == session_id)
        .filter_map(|e| match e {
            ScanEvent::UploadProgress { percent, .. } => Some(percent),
            _ => None,
        })
        .collect();
    // the initial 0 matches the starting value and is not re-emitted
    assert_eq!(progress, vec![60, 100]);
    assert_eq!(orchestrator.snapshot().progress_percent, 100);
}

#[tokio::test(start_paused = true)]
async fn new_session_after_completion_resets_counters() {
    let (orchestrator, mut rx, service) = setup(FakeScanService::new(&["pending", "completed"]));

    let first = orchestrator.submit(pdf()).await.unwrap();
    next_terminal(&mut rx).await;
    assert_eq!(orchestrator.snapshot().poll_attempt, 2);

    let second = orchestrator.submit(pdf()).await.unwrap();
    assert_ne!(first, second);
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.poll_attempt, 0);
    assert!(snapshot.result.is_none());

    next_terminal(&mut rx).await;
    assert_eq!(orchestrator.sessions_started(), 2);
    assert_eq!(orchestrator.sessions_completed(), 2);
    assert_eq!(service.upload_calls(), 2);
}

#[tokio::test]
async fn invalid_file_never_reaches_service() {
    let (orchestrator, _rx, service) = setup(FakeScanService::new(&["completed"]));

    let big = CandidateFile::new(
        "archive.zip",
        Some("application/zip".to_owned()),
        Bytes::from(vec![0u8; 10 * 1024 * 1024 + 1]),
    );
    let err = orchestrator.submit(big).await.unwrap_err();

    assert_eq!(
        err,
        ScanError::Validation(vec!["File size exceeds 10MB limit".to_owned()])
    );
    assert_eq!(service.upload_calls(), 0);
    assert_eq!(orchestrator.phase(), Phase::Idle);
    assert_eq!(orchestrator.sessions_started(), 0);
}
