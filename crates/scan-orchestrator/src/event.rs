//! 오케스트레이터가 표현 계층으로 보내는 이벤트
//!
//! 모든 이벤트는 소속 [`SessionId`]를 담고 있어 소비자가 더 이상
//! 표시하지 않는 세션의 이벤트를 걸러낼 수 있습니다.

use std::fmt;

use scanpost_core::types::{Phase, RemoteStatus, ScanResult, SessionId, StatusIndicator};

use crate::error::ScanError;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// The session entered a new phase
    PhaseChanged {
        session_id: SessionId,
        phase: Phase,
        indicator: StatusIndicator,
    },
    /// Upload progress, 0-100
    UploadProgress { session_id: SessionId, percent: u8 },
    /// A status check returned; the phase is unchanged
    StatusObserved {
        session_id: SessionId,
        attempt: u32,
        status: RemoteStatus,
        indicator: StatusIndicator,
    },
    /// The scan finished and the normalized result is available
    Completed {
        session_id: SessionId,
        result: ScanResult,
        indicator: StatusIndicator,
    },
    /// The pipeline broke; no result exists
    Failed {
        session_id: SessionId,
        error: ScanError,
        indicator: StatusIndicator,
    },
}

impl ScanEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::PhaseChanged { session_id, .. }
            | Self::UploadProgress { session_id, .. }
            | Self::StatusObserved { session_id, .. }
            | Self::Completed { session_id, .. }
            | Self::Failed { session_id, .. } => *session_id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::UploadProgress { .. } => "upload_progress",
            Self::StatusObserved { .. } => "status_observed",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// `Completed` and `Failed` end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PhaseChanged {
                session_id, phase, ..
            } => write!(f, "[{session_id}] phase -> {phase}"),
            Self::UploadProgress {
                session_id,
                percent,
            } => write!(f, "[{session_id}] upload {percent}%"),
            Self::StatusObserved {
                session_id,
                attempt,
                status,
                ..
            } => write!(f, "[{session_id}] check #{attempt}: {status}"),
            Self::Completed { session_id, result, .. } => {
                write!(f, "[{session_id}] completed: {}", result.status)
            }
            Self::Failed { session_id, error, .. } => {
                write!(f, "[{session_id}] failed: {error}")
            }
        }
    }
}
