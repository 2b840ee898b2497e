//! Remote scanning service abstraction.
//!
//! The [`ScanService`] trait wraps the four calls the orchestrator needs.
//! Production code uses [`HttpScanService`]; tests use `MockScanService` or
//! their own fakes.
//!
//! ```text
//! ┌──────────────────┐
//! │ ScanOrchestrator │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ ScanService │ (trait)
//!   └─────────────┘
//!        │     │
//!        ▼     ▼
//!   ┌──────┐ ┌──────┐
//!   │ Http │ │ Mock │
//!   └──┬───┘ └──────┘
//!      │
//!      ▼
//!  POST /upload, POST /scan/{id}, GET /status/{id}, GET /result/{id}
//! ```
//!
//! No call is retried here: retry policy, if any, belongs to the caller.
//!
//! # Identifier validation
//!
//! Identifiers handed back by the service end up in request paths, so they
//! must be 1-128 characters of `[A-Za-z0-9._-]` and not consist of dots only.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use scanpost_core::config::ServiceConfig;
use scanpost_core::types::{CandidateFile, RemoteStatus};

use crate::error::ScanError;

/// Bytes handed to the transport per progress report
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

const MAX_IDENTIFIER_LEN: usize = 128;

/// Upload progress callback, receives 0-100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Rejects identifiers that cannot be placed in a URL path segment.
pub fn validate_identifier(id: &str) -> Result<(), ScanError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        return Err(ScanError::InvalidIdentifier(format!(
            "length {} (must be 1-{MAX_IDENTIFIER_LEN})",
            id.len()
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ScanError::InvalidIdentifier(format!(
            "'{id}' contains characters outside [A-Za-z0-9._-]"
        )));
    }
    if id.chars().all(|c| c == '.') {
        return Err(ScanError::InvalidIdentifier(format!(
            "'{id}' is not a usable path segment"
        )));
    }
    Ok(())
}

/// First present identifier among `keys`; strings and numbers both count.
fn identifier_from(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Body returned by `POST /upload`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse(Value);

impl UploadResponse {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// `fileId`, then `uploadId`, then `id`.
    pub fn identifier(&self) -> Option<String> {
        identifier_from(&self.0, &["fileId", "uploadId", "id"])
    }

    pub fn body(&self) -> &Value {
        &self.0
    }
}

/// Body returned by `POST /scan/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStartResponse(Value);

impl ScanStartResponse {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// `scanId`, then `id`.
    pub fn identifier(&self) -> Option<String> {
        identifier_from(&self.0, &["scanId", "id"])
    }

    pub fn body(&self) -> &Value {
        &self.0
    }
}

/// Parsed `GET /status/{id}` body.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: RemoteStatus,
}

impl StatusReport {
    pub fn new(status: RemoteStatus) -> Self {
        Self { status }
    }

    /// Reads the `status` string; a body without one is a protocol error.
    pub fn from_body(body: &Value) -> Result<Self, ScanError> {
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ScanError::Protocol {
                status: None,
                message: "status response has no 'status' field".to_owned(),
            })?;
        Ok(Self::new(RemoteStatus::parse(status)))
    }
}

/// Operations the orchestrator needs from the remote service.
///
/// The trait is `Send + Sync + 'static` so one instance can be shared
/// between the submit path and the spawned poll task.
///
/// # Errors
///
/// - `Network`: no response received
/// - `Protocol`: non-2xx status (server text, or a per-call fallback) or a
///   body that is not JSON
/// - `InvalidIdentifier`: the id cannot be used in a request path
pub trait ScanService: Send + Sync + 'static {
    /// Uploads a file, reporting progress through `on_progress`.
    ///
    /// Progress is non-decreasing and ends at 100 on success.
    fn upload(
        &self,
        file: &CandidateFile,
        on_progress: ProgressFn,
    ) -> impl Future<Output = Result<UploadResponse, ScanError>> + Send;

    /// Starts a scan of an uploaded file.
    fn start_scan(
        &self,
        upload_id: &str,
    ) -> impl Future<Output = Result<ScanStartResponse, ScanError>> + Send;

    /// Reads the current status of a scan.
    fn get_status(
        &self,
        scan_id: &str,
    ) -> impl Future<Output = Result<StatusReport, ScanError>> + Send;

    /// Fetches the raw, un-normalized result of a scan.
    fn get_result(&self, scan_id: &str) -> impl Future<Output = Result<Value, ScanError>> + Send;
}

/// [`ScanService`] over HTTP.
///
/// # Example
/// ```ignore
/// use scanpost_core::config::ServiceConfig;
/// use scanpost_orchestrator::HttpScanService;
///
/// let service = HttpScanService::new(&ServiceConfig::default())?;
/// let health = service.health().await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpScanService {
    client: reqwest::Client,
    base_url: String,
    upload_timeout: Duration,
}

impl HttpScanService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScanError::Config {
                field: "service".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_owned(),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<Value, ScanError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(network)?;
        read_json(response, "health check failed").await
    }

    /// `GET /health/stats`
    pub async fn stats(&self) -> Result<Value, ScanError> {
        let url = format!("{}/health/stats", self.base_url);
        let response = self.client.get(&url).send().await.map_err(network)?;
        read_json(response, "failed to get stats").await
    }
}

impl ScanService for HttpScanService {
    async fn upload(
        &self,
        file: &CandidateFile,
        on_progress: ProgressFn,
    ) -> Result<UploadResponse, ScanError> {
        let url = format!("{}/upload", self.base_url);
        let body = reqwest::Body::wrap_stream(progress_stream(
            file.data.clone(),
            Arc::clone(&on_progress),
        ));
        let part = Part::stream_with_length(body, file.size()).file_name(file.name.clone());
        let part = match file.content_type.as_deref() {
            Some(mime) => part.mime_str(mime).map_err(|_| {
                ScanError::Validation(vec![format!("File type not allowed. Detected: {mime}")])
            })?,
            None => part,
        };
        let form = Form::new().part("file", part);

        debug!(url = %url, file = %file.name, size = file.size(), "uploading file");
        let response = self
            .client
            .post(&url)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;

        let body = read_json(response, "upload failed").await?;
        on_progress(100);
        Ok(UploadResponse::new(body))
    }

    async fn start_scan(&self, upload_id: &str) -> Result<ScanStartResponse, ScanError> {
        validate_identifier(upload_id)?;
        let url = format!("{}/scan/{upload_id}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(network)?;
        let body = read_json(response, "scan failed to start").await?;
        Ok(ScanStartResponse::new(body))
    }

    async fn get_status(&self, scan_id: &str) -> Result<StatusReport, ScanError> {
        validate_identifier(scan_id)?;
        let url = format!("{}/status/{scan_id}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(network)?;
        let body = read_json(response, "failed to get scan status").await?;
        StatusReport::from_body(&body)
    }

    async fn get_result(&self, scan_id: &str) -> Result<Value, ScanError> {
        validate_identifier(scan_id)?;
        let url = format!("{}/result/{scan_id}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(network)?;
        read_json(response, "failed to get scan result").await
    }
}

fn network(err: reqwest::Error) -> ScanError {
    ScanError::Network(err.to_string())
}

/// Non-2xx becomes `Protocol` with the trimmed body or `fallback`.
async fn read_json(response: reqwest::Response, fallback: &str) -> Result<Value, ScanError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let text = text.trim();
        return Err(ScanError::Protocol {
            status: Some(status.as_u16()),
            message: if text.is_empty() {
                fallback.to_owned()
            } else {
                text.to_owned()
            },
        });
    }

    let bytes = response.bytes().await.map_err(network)?;
    serde_json::from_slice(&bytes).map_err(|e| ScanError::Protocol {
        status: Some(status.as_u16()),
        message: format!("invalid JSON response: {e}"),
    })
}

/// Splits `data` into chunks, reporting progress as each one is taken.
fn progress_stream(
    data: Bytes,
    on_progress: ProgressFn,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len();
    let chunks: Vec<Bytes> = (0..total)
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
        .collect();

    let mut sent = 0usize;
    futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len();
        on_progress(percent(sent, total));
        Ok(chunk)
    })
}

/// Rounded percentage, 100 for an empty transfer.
pub(crate) fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    let pct = (sent * 100 + total / 2) / total;
    u8::try_from(pct).unwrap_or(100)
}

/// Mock service for unit tests.
///
/// Statuses are served in order; the last one repeats once the list runs
/// out. Call counters let tests assert exactly how often each endpoint was hit.
#[cfg(test)]
pub struct MockScanService {
    pub upload_body: Value,
    pub upload_error: Option<ScanError>,
    pub scan_body: Value,
    pub scan_error: Option<ScanError>,
    pub statuses: std::sync::Mutex<std::collections::VecDeque<Result<RemoteStatus, ScanError>>>,
    pub result_body: Result<Value, ScanError>,
    pub upload_delay: Option<Duration>,
    pub upload_calls: std::sync::atomic::AtomicU32,
    pub scan_calls: std::sync::atomic::AtomicU32,
    pub status_calls: std::sync::atomic::AtomicU32,
    pub result_calls: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl Default for MockScanService {
    fn default() -> Self {
        Self {
            upload_body: serde_json::json!({ "fileId": "file-1" }),
            upload_error: None,
            scan_body: serde_json::json!({ "scanId": "scan-1" }),
            scan_error: None,
            statuses: std::sync::Mutex::new(
                [Ok(RemoteStatus::Completed)].into_iter().collect(),
            ),
            result_body: Ok(serde_json::json!({ "status": "clean", "meta": {} })),
            upload_delay: None,
            upload_calls: Default::default(),
            scan_calls: Default::default(),
            status_calls: Default::default(),
            result_calls: Default::default(),
        }
    }
}

#[cfg(test)]
impl MockScanService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload_body(mut self, body: Value) -> Self {
        self.upload_body = body;
        self
    }

    pub fn with_upload_error(mut self, err: ScanError) -> Self {
        self.upload_error = Some(err);
        self
    }

    pub fn with_scan_body(mut self, body: Value) -> Self {
        self.scan_body = body;
        self
    }

    pub fn with_scan_error(mut self, err: ScanError) -> Self {
        self.scan_error = Some(err);
        self
    }

    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        self.with_status_results(
            statuses
                .iter()
                .map(|s| Ok(RemoteStatus::parse(s)))
                .collect(),
        )
    }

    pub fn with_status_results(mut self, statuses: Vec<Result<RemoteStatus, ScanError>>) -> Self {
        self.statuses = std::sync::Mutex::new(statuses.into_iter().collect());
        self
    }

    pub fn with_result(mut self, result: Result<Value, ScanError>) -> Self {
        self.result_body = result;
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn calls(counter: &std::sync::atomic::AtomicU32) -> u32 {
        counter.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl ScanService for MockScanService {
    async fn upload(
        &self,
        _file: &CandidateFile,
        on_progress: ProgressFn,
    ) -> Result<UploadResponse, ScanError> {
        use std::sync::atomic::Ordering;

        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        on_progress(50);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.upload_error {
            return Err(err.clone());
        }
        on_progress(100);
        Ok(UploadResponse::new(self.upload_body.clone()))
    }

    async fn start_scan(&self, _upload_id: &str) -> Result<ScanStartResponse, ScanError> {
        use std::sync::atomic::Ordering;

        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        match &self.scan_error {
            Some(err) => Err(err.clone()),
            None => Ok(ScanStartResponse::new(self.scan_body.clone())),
        }
    }

    async fn get_status(&self, _scan_id: &str) -> Result<StatusReport, ScanError> {
        use std::sync::atomic::Ordering;

        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self
            .statuses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let next = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        next.unwrap_or(Ok(RemoteStatus::Scanning))
            .map(StatusReport::new)
    }

    async fn get_result(&self, _scan_id: &str) -> Result<Value, ScanError> {
        use std::sync::atomic::Ordering;

        self.result_calls.fetch_add(1, Ordering::SeqCst);
        self.result_body.clone()
    }
}
