//! 스캔 세션 상태
//!
//! [`ScanSession`]은 [`Phase`] 전이로 앞으로만 진행합니다. reset이나 새 제출은
//! 새 세대 번호를 가진 세션으로 통째로 교체합니다.
//! 식별자는 한 번만 기록되고 폴링 횟수는 증가만 합니다.

use serde::Serialize;

use scanpost_core::types::{Phase, RemoteStatus, ScanResult, SessionId, StatusIndicator};

use crate::error::ScanError;

/// 세션이 [`Phase::Failed`]로 끝난 이유
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    /// [`ScanError::kind`] 태그
    pub kind: String,
    pub message: String,
}

impl From<&ScanError> for SessionFailure {
    fn from(err: &ScanError) -> Self {
        Self {
            kind: err.kind().to_owned(),
            message: err.to_string(),
        }
    }
}

/// 스캔 한 번의 가변 상태
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: SessionId,
    generation: u64,
    phase: Phase,
    upload_id: Option<String>,
    scan_id: Option<String>,
    progress_percent: u8,
    poll_attempt: u32,
    last_status: Option<RemoteStatus>,
    indicator: StatusIndicator,
    result: Option<ScanResult>,
    failure: Option<SessionFailure>,
}

impl ScanSession {
    /// 새 `Idle` 세션
    pub fn new(generation: u64) -> Self {
        Self {
            id: SessionId::new(),
            generation,
            phase: Phase::Idle,
            upload_id: None,
            scan_id: None,
            progress_percent: 0,
            poll_attempt: 0,
            last_status: None,
            indicator: StatusIndicator::idle(),
            result: None,
            failure: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    pub fn scan_id(&self) -> Option<&str> {
        self.scan_id.as_deref()
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn poll_attempt(&self) -> u32 {
        self.poll_attempt
    }

    pub fn last_status(&self) -> Option<&RemoteStatus> {
        self.last_status.as_ref()
    }

    pub fn indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    pub fn result(&self) -> Option<&ScanResult> {
        self.result.as_ref()
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        self.failure.as_ref()
    }

    fn transition(&mut self, next: Phase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::debug!(
                session_id = %self.id,
                from = %self.phase,
                to = %next,
                "ignoring invalid phase transition"
            );
            return false;
        }
        self.phase = next;
        true
    }

    /// `Idle -> Uploading`.
    pub fn begin_upload(&mut self) -> bool {
        if !self.transition(Phase::Uploading) {
            return false;
        }
        self.progress_percent = 0;
        self.indicator = StatusIndicator::uploading();
        true
    }

    /// 업로드 진행률을 기록합니다. 마지막 값이 유지됩니다.
    ///
    /// `Uploading`이 아니면 무시합니다. 값이 바뀌었으면 `true`를 반환합니다.
    pub fn set_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.phase != Phase::Uploading || self.progress_percent == percent {
            return false;
        }
        self.progress_percent = percent;
        true
    }

    /// `Uploading -> Scanning`, 업로드 ID를 고정합니다.
    pub fn begin_scanning(&mut self, upload_id: String) -> bool {
        if self.upload_id.is_some() || !self.transition(Phase::Scanning) {
            return false;
        }
        self.upload_id = Some(upload_id);
        self.progress_percent = 100;
        self.indicator = StatusIndicator::starting_scan();
        true
    }

    /// 스캔 ID를 한 번만 기록하고 이후 호출은 무시합니다.
    pub fn set_scan_id(&mut self, scan_id: String) -> bool {
        if self.phase != Phase::Scanning || self.scan_id.is_some() {
            return false;
        }
        self.scan_id = Some(scan_id);
        true
    }

    /// 상태 조회 1회를 세고 새 시도 번호를 반환합니다.
    pub fn record_tick(&mut self) -> u32 {
        self.poll_attempt = self.poll_attempt.saturating_add(1);
        self.poll_attempt
    }

    /// 단계 변경 없이 조회한 상태를 저장합니다.
    pub fn observe_status(&mut self, status: RemoteStatus) {
        self.indicator = StatusIndicator::for_remote(&status);
        self.last_status = Some(status);
    }

    /// 정규화된 결과와 함께 `Scanning -> Completed`
    pub fn complete(&mut self, result: ScanResult) -> bool {
        if !self.transition(Phase::Completed) {
            return false;
        }
        self.indicator = StatusIndicator::for_verdict(result.status);
        self.result = Some(result);
        true
    }

    /// `Uploading | Scanning -> Failed`.
    pub fn fail(&mut self, err: &ScanError) -> bool {
        if !self.transition(Phase::Failed) {
            return false;
        }
        let failure = SessionFailure::from(err);
        self.indicator = StatusIndicator::failed(&failure.message);
        self.failure = Some(failure);
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            upload_id: self.upload_id.clone(),
            scan_id: self.scan_id.clone(),
            progress_percent: self.progress_percent,
            poll_attempt: self.poll_attempt,
            last_status: self.last_status.as_ref().map(|s| s.as_str().to_owned()),
            indicator: self.indicator.clone(),
            result: self.result.clone(),
            failure: self.failure.clone(),
        }
    }
}

/// 표현 계층용 세션 읽기 전용 사본
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    pub progress_percent: u8,
    pub poll_attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    pub indicator: StatusIndicator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SessionFailure>,
}
