//! 스캔 오케스트레이터 -- 업로드부터 결과 수신까지 스캔 세션 전체 흐름 관리
//!
//! ```text
//! submit(file)
//!   |-- FileValidator          rejected -> Err(Validation), no state change
//!   |-- phase active?          rejected -> Err(Busy), no state change
//!   |
//!   Idle ──> Uploading ──upload──> Scanning ──start_scan──> poll loop
//!                |                    |                        |
//!                └──────> Failed <────┴─── error / timeout ────┤
//!                                                              |
//!                          Completed <── normalize <── get_result
//! ```
//!
//! 공유 상태는 `Arc` 뒤에 있으므로 오케스트레이터 복제본 하나를 태스크로
//! 옮기고 다른 복제본으로 스냅샷을 읽을 수 있습니다.
//!
//! # 교체된 세션
//!
//! 모든 세션은 세대 번호를 가집니다. 각 변경은 시작 시점의 세대를 기억하고
//! 그 사이 세션이 초기화되거나 교체되었으면 버려집니다.
//! 락은 항상 poller, session 순서로 잡습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scanpost_core::metrics as m;
use scanpost_core::types::{CandidateFile, Phase, ScanResult, SessionId};

use crate::config::OrchestratorConfig;
use crate::error::ScanError;
use crate::event::ScanEvent;
use crate::normalizer::normalize;
use crate::poller::Poller;
use crate::service::{ProgressFn, ScanService};
use crate::session::{ScanSession, SessionSnapshot};
use crate::validator::FileValidator;

/// 오케스트레이터 복제본과 폴링 태스크가 공유하는 상태
struct Shared {
    session: Mutex<ScanSession>,
    poller: Mutex<Poller>,
    generation: AtomicU64,
    event_tx: mpsc::Sender<ScanEvent>,
    sessions_started: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_failed: AtomicU64,
}

impl Shared {
    fn new(event_tx: mpsc::Sender<ScanEvent>) -> Self {
        Self {
            session: Mutex::new(ScanSession::new(0)),
            poller: Mutex::new(Poller::new()),
            generation: AtomicU64::new(0),
            event_tx,
            sessions_started: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, ScanSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poller(&self) -> MutexGuard<'_, Poller> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// `generation`이 여전히 현재 세션일 때만 `f`를 적용합니다.
    fn update<T>(&self, generation: u64, f: impl FnOnce(&mut ScanSession) -> T) -> Option<T> {
        let mut session = self.lock_session();
        if session.generation() != generation {
            debug!(
                generation,
                current = session.generation(),
                "dropping update for superseded session"
            );
            return None;
        }
        Some(f(&mut session))
    }

    fn emit(&self, event: ScanEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(
                session_id = %event.session_id(),
                event = event.kind_name(),
                "event channel full, dropping event"
            ),
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn emit_phase(&self, session: &ScanSession) {
        self.emit(ScanEvent::PhaseChanged {
            session_id: session.id(),
            phase: session.phase(),
            indicator: session.indicator().clone(),
        });
    }

    /// 세션을 `Failed`로 전환합니다. 오래된 세대이거나 이미 종료됐으면 `false`.
    fn fail(&self, generation: u64, error: &ScanError) -> bool {
        let applied = self
            .update(generation, |s| {
                if !s.fail(error) {
                    return false;
                }
                warn!(
                    session_id = %s.id(),
                    kind = error.kind(),
                    error = %error,
                    "scan session failed"
                );
                self.emit(ScanEvent::Failed {
                    session_id: s.id(),
                    error: error.clone(),
                    indicator: s.indicator().clone(),
                });
                true
            })
            .unwrap_or(false);

        if applied {
            self.sessions_failed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::SCAN_SESSIONS_FAILED_TOTAL, m::LABEL_KIND => error.kind())
                .increment(1);
        }
        applied
    }

    /// 세션을 `Completed`로 전환합니다. 오래된 세대이거나 스캔 중이 아니면 `false`.
    fn complete(&self, generation: u64, result: ScanResult) -> bool {
        let verdict = result.status;
        let applied = self
            .update(generation, |s| {
                if !s.complete(result) {
                    return false;
                }
                info!(
                    session_id = %s.id(),
                    scan_id = s.scan_id().unwrap_or_default(),
                    verdict = %verdict,
                    "scan completed"
                );
                if let Some(result) = s.result() {
                    self.emit(ScanEvent::Completed {
                        session_id: s.id(),
                        result: result.clone(),
                        indicator: s.indicator().clone(),
                    });
                }
                true
            })
            .unwrap_or(false);

        if applied {
            self.sessions_completed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(
                m::SCAN_SESSIONS_COMPLETED_TOTAL,
                m::LABEL_VERDICT => verdict.as_str()
            )
            .increment(1);
        }
        applied
    }
}

/// [`ScanService`]를 상대로 스캔 세션을 진행하는 오케스트레이터
///
/// 한 번에 하나의 세션만 활성화됩니다. 새 `submit`은 종료된 세션을 교체하고
/// 업로드나 스캔 중에는 거부됩니다.
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use scanpost_orchestrator::{HttpScanService, ScanOrchestratorBuilder};
///
/// let service = Arc::new(HttpScanService::new(&core_config.service)?);
/// let (orchestrator, events) = ScanOrchestratorBuilder::new()
///     .service(service)
///     .build()?;
///
/// let session_id = orchestrator.submit(file).await?;
/// ```
pub struct ScanOrchestrator<S: ScanService> {
    config: OrchestratorConfig,
    service: Arc<S>,
    validator: FileValidator,
    shared: Arc<Shared>,
}

impl<S: ScanService> Clone for ScanOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            service: Arc::clone(&self.service),
            validator: self.validator.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: ScanService> ScanOrchestrator<S> {
    /// 현재 단계 이름 (소문자)
    pub fn state_name(&self) -> &'static str {
        self.phase().as_str()
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock_session().phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock_session().snapshot()
    }

    /// 폴링 루프가 실행 중이면 `true`를 반환합니다.
    pub fn is_polling(&self) -> bool {
        self.shared.lock_poller().is_active()
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn sessions_started(&self) -> u64 {
        self.shared.sessions_started.load(Ordering::Relaxed)
    }

    pub fn sessions_completed(&self) -> u64 {
        self.shared.sessions_completed.load(Ordering::Relaxed)
    }

    pub fn sessions_failed(&self) -> u64 {
        self.shared.sessions_failed.load(Ordering::Relaxed)
    }

    /// `file`을 검증하고 업로드한 뒤 스캔을 시작합니다.
    ///
    /// 폴링이 시작되면 반환합니다. 이후 진행은 이벤트나
    /// [`snapshot`](Self::snapshot)으로 확인합니다.
    ///
    /// # 에러
    ///
    /// - `Validation`, `Busy`: 거부, 현재 세션은 그대로
    /// - `Network`, `Protocol`, `MissingIdentifier`, `InvalidIdentifier`:
    ///   새 세션은 `Failed` 상태
    /// - `Superseded`: 진행 중 세션이 초기화되거나 교체됨
    pub async fn submit(&self, file: CandidateFile) -> Result<SessionId, ScanError> {
        if let Err(err) = self.validator.validate(Some(&file)).into_result() {
            metrics::counter!(m::SCAN_SUBMISSIONS_REJECTED_TOTAL, m::LABEL_KIND => err.kind())
                .increment(1);
            warn!(file = %file.name, error = %err, "submission rejected");
            return Err(err);
        }

        let (generation, session_id) = self.begin_session(&file)?;

        match self.upload_and_start(generation, session_id, file).await {
            Ok(()) => Ok(session_id),
            Err(ScanError::Superseded) => {
                debug!(%session_id, "session superseded during submit");
                Err(ScanError::Superseded)
            }
            Err(err) => {
                if self.shared.fail(generation, &err) {
                    Err(err)
                } else {
                    Err(ScanError::Superseded)
                }
            }
        }
    }

    /// 폴링을 멈춘 뒤 세션을 새 `Idle` 세션으로 교체합니다.
    ///
    /// 이미 전송 중인 업로드는 중단하지 않지만 그 결과는
    /// 버려집니다.
    pub fn reset(&self) {
        let mut poller = self.shared.lock_poller();
        let stopped = poller.stop();

        let mut session = self.shared.lock_session();
        let previous = session.id();
        let fresh = ScanSession::new(self.shared.next_generation());
        self.shared.emit_phase(&fresh);
        *session = fresh;

        info!(
            previous_session = %previous,
            polling_stopped = stopped,
            "session reset"
        );
    }

    fn begin_session(&self, file: &CandidateFile) -> Result<(u64, SessionId), ScanError> {
        let mut poller = self.shared.lock_poller();
        let mut session = self.shared.lock_session();

        if session.phase().is_active() {
            metrics::counter!(m::SCAN_SUBMISSIONS_REJECTED_TOTAL, m::LABEL_KIND => "busy")
                .increment(1);
            warn!(
                session_id = %session.id(),
                phase = %session.phase(),
                "submission rejected, scan already in progress"
            );
            return Err(ScanError::Busy);
        }

        if poller.stop() {
            debug!(session_id = %session.id(), "stopped leftover poll loop");
        }

        let mut next = ScanSession::new(self.shared.next_generation());
        next.begin_upload();
        let ids = (next.generation(), next.id());
        self.shared.emit_phase(&next);
        *session = next;

        self.shared.sessions_started.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::SCAN_SESSIONS_STARTED_TOTAL).increment(1);
        info!(
            session_id = %ids.1,
            file = %file.name,
            size = file.size(),
            "scan session started"
        );
        Ok(ids)
    }

    async fn upload_and_start(
        &self,
        generation: u64,
        session_id: SessionId,
        file: CandidateFile,
    ) -> Result<(), ScanError> {
        metrics::counter!(m::SCAN_UPLOAD_BYTES).increment(file.size());
        let uploaded = self
            .service
            .upload(&file, self.progress_callback(generation))
            .await?;
        drop(file);

        let upload_id = uploaded.identifier().ok_or_else(|| {
            ScanError::MissingIdentifier("no valid file id received".to_owned())
        })?;

        self.shared
            .update(generation, |s| {
                if s.begin_scanning(upload_id.clone()) {
                    self.shared.emit_phase(s);
                }
            })
            .ok_or(ScanError::Superseded)?;
        info!(%session_id, upload_id = %upload_id, "upload finished, starting scan");

        let started = self.service.start_scan(&upload_id).await?;
        let scan_id = started.identifier().ok_or_else(|| {
            ScanError::MissingIdentifier("no valid scan id received".to_owned())
        })?;

        self.start_polling(generation, session_id, scan_id)
    }

    fn progress_callback(&self, generation: u64) -> ProgressFn {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |percent| {
            shared.update(generation, |s| {
                if s.set_progress(percent) {
                    debug!(session_id = %s.id(), percent, "upload progress");
                    shared.emit(ScanEvent::UploadProgress {
                        session_id: s.id(),
                        percent: s.progress_percent(),
                    });
                }
            });
        })
    }

    fn start_polling(
        &self,
        generation: u64,
        session_id: SessionId,
        scan_id: String,
    ) -> Result<(), ScanError> {
        let mut poller = self.shared.lock_poller();
        self.shared
            .update(generation, |s| s.set_scan_id(scan_id.clone()))
            .ok_or(ScanError::Superseded)?;

        let task = PollTask {
            service: Arc::clone(&self.service),
            shared: Arc::clone(&self.shared),
            generation,
            session_id,
            scan_id: scan_id.clone(),
            interval: self.config.poll_interval(),
            max_attempts: self.config.max_poll_attempts,
        };
        if !poller.start(move |cancel| task.run(cancel)) {
            warn!(%session_id, "poll loop already running, not starting another");
        }

        info!(
            %session_id,
            scan_id = %scan_id,
            interval_ms = self.config.poll_interval_ms,
            max_attempts = self.config.max_poll_attempts,
            "polling started"
        );
        Ok(())
    }
}

/// 스폰된 상태 조회 루프 본체
struct PollTask<S: ScanService> {
    service: Arc<S>,
    shared: Arc<Shared>,
    generation: u64,
    session_id: SessionId,
    scan_id: String,
    interval: Duration,
    max_attempts: u32,
}

impl<S: ScanService> PollTask<S> {
    async fn run(self, cancel: CancellationToken) {
        // 첫 조회는 시작 후 한 주기 뒤
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(session_id = %self.session_id, "poll loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let Some(attempt) = self.shared.update(self.generation, ScanSession::record_tick)
            else {
                return;
            };
            metrics::counter!(m::SCAN_POLL_TICKS_TOTAL).increment(1);
            debug!(
                session_id = %self.session_id,
                scan_id = %self.scan_id,
                attempt,
                "checking scan status"
            );

            let report = tokio::select! {
                () = cancel.cancelled() => return,
                report = self.service.get_status(&self.scan_id) => report,
            };
            let status = match report {
                Ok(report) => report.status,
                Err(err) => {
                    self.shared.fail(self.generation, &err);
                    return;
                }
            };

            let observed = self.shared.update(self.generation, |s| {
                s.observe_status(status.clone());
                self.shared.emit(ScanEvent::StatusObserved {
                    session_id: s.id(),
                    attempt,
                    status: status.clone(),
                    indicator: s.indicator().clone(),
                });
            });
            if observed.is_none() {
                return;
            }

            if status.is_terminal() {
                info!(
                    session_id = %self.session_id,
                    scan_id = %self.scan_id,
                    attempt,
                    status = %status,
                    "scan reached terminal status"
                );
                break;
            }

            if attempt >= self.max_attempts {
                self.shared
                    .fail(self.generation, &ScanError::Timeout { attempts: attempt });
                return;
            }
        }

        let raw = tokio::select! {
            () = cancel.cancelled() => return,
            raw = self.service.get_result(&self.scan_id) => raw,
        };
        match raw {
            Ok(raw) => {
                self.shared.complete(self.generation, normalize(&raw));
            }
            Err(err) => {
                self.shared.fail(self.generation, &err);
            }
        }
    }
}

/// Builder for [`ScanOrchestrator`].
pub struct ScanOrchestratorBuilder<S: ScanService> {
    config: OrchestratorConfig,
    service: Option<Arc<S>>,
    event_tx: Option<mpsc::Sender<ScanEvent>>,
    validator: FileValidator,
}

impl<S: ScanService> ScanOrchestratorBuilder<S> {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            service: None,
            event_tx: None,
            validator: FileValidator::default(),
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn service(mut self, service: Arc<S>) -> Self {
        self.service = Some(service);
        self
    }

    /// Uses an external event channel instead of creating one.
    pub fn event_sender(mut self, tx: mpsc::Sender<ScanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn validator(mut self, validator: FileValidator) -> Self {
        self.validator = validator;
        self
    }

    /// 오케스트레이터를 생성합니다.
    ///
    /// # 반환값
    /// - `ScanOrchestrator`: 오케스트레이터
    /// - `Option<mpsc::Receiver<ScanEvent>>`: 이벤트 수신 채널, 외부 sender를
    ///   지정했으면 `None`
    pub fn build(
        self,
    ) -> Result<(ScanOrchestrator<S>, Option<mpsc::Receiver<ScanEvent>>), ScanError> {
        self.config.validate()?;

        let service = self.service.ok_or_else(|| ScanError::Config {
            field: "service".to_owned(),
            reason: "scan service must be provided".to_owned(),
        })?;

        let (event_tx, event_rx) = match self.event_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
                (tx, Some(rx))
            }
        };

        let orchestrator = ScanOrchestrator {
            config: self.config,
            service,
            validator: self.validator,
            shared: Arc::new(Shared::new(event_tx)),
        };
        Ok((orchestrator, event_rx))
    }
}

impl<S: ScanService> Default for ScanOrchestratorBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
