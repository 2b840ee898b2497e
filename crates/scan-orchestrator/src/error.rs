//! 스캔 오케스트레이터 에러 타입
//!
//! [`ScanError`]는 파일 선택부터 결과 수신까지 발생하는 모든 에러를 다룹니다.
//! `From<ScanError> for ScanpostError` 변환으로 상위 계층에서 `?`로
//! 전파할 수 있습니다.

use scanpost_core::error::{ConfigError, ScanpostError, ServiceError, SessionError};

/// 오케스트레이터 도메인 에러
///
/// `Validation`, `Busy`, `Config`는 거부 에러로 세션을 건드리지 않습니다.
/// 나머지는 진행 중인 세션을 `Failed`로 종료시킵니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// 클라이언트 측 검증 실패, 모든 사유를 순서대로 담음
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// 전송 실패, 응답 없음
    #[error("network error: {0}")]
    Network(String),

    /// 비정상 상태 코드 또는 해석할 수 없는 본문
    #[error("protocol error: {message}")]
    Protocol {
        /// 응답을 받은 경우의 HTTP 상태 코드
        status: Option<u16>,
        /// 서버가 준 메시지 또는 기본 메시지
        message: String,
    },

    /// 성공 응답이지만 식별자가 없음
    #[error("missing identifier: {0}")]
    MissingIdentifier(String),

    /// 요청 경로에 쓸 수 없는 식별자
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// 종료 상태 없이 폴링 상한 도달
    #[error("scan timed out after {attempts} status checks")]
    Timeout {
        /// 수행한 상태 조회 횟수
        attempts: u32,
    },

    /// 이미 업로드 또는 스캔 중인 세션이 있음
    #[error("a scan is already in progress")]
    Busy,

    /// 호출 진행 중 세션이 초기화되거나 교체됨
    #[error("session superseded by a newer one")]
    Superseded,

    /// 잘못된 오케스트레이터 설정
    #[error("config error: {field}: {reason}")]
    Config {
        /// 필드 이름
        field: String,
        /// 사유
        reason: String,
    },
}

impl ScanError {
    /// 메트릭 레이블과 로그에 쓰는 고정 소문자 태그
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Network(_) => "network",
            Self::Protocol { .. } => "protocol",
            Self::MissingIdentifier(_) => "missing_identifier",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::Timeout { .. } => "timeout",
            Self::Busy => "busy",
            Self::Superseded => "superseded",
            Self::Config { .. } => "config",
        }
    }

    /// 세션 변경 전에 거부되는 에러이면 `true`를 반환합니다.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Busy | Self::Config { .. })
    }
}

impl From<ScanError> for ScanpostError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Validation(reasons) => {
                ScanpostError::Session(SessionError::Validation(reasons))
            }
            ScanError::Network(msg) => ScanpostError::Service(ServiceError::Network(msg)),
            ScanError::Protocol { status, message } => {
                let msg = match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                };
                ScanpostError::Service(ServiceError::Protocol(msg))
            }
            ScanError::MissingIdentifier(msg) => {
                ScanpostError::Service(ServiceError::MissingIdentifier(msg))
            }
            ScanError::InvalidIdentifier(msg) => {
                ScanpostError::Service(ServiceError::InvalidIdentifier(msg))
            }
            ScanError::Timeout { attempts } => {
                ScanpostError::Session(SessionError::Timeout { attempts })
            }
            ScanError::Busy => ScanpostError::Session(SessionError::Busy),
            ScanError::Superseded => ScanpostError::Session(SessionError::Superseded),
            ScanError::Config { field, reason } => {
                ScanpostError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}
