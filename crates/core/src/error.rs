//! 워크스페이스 공통 에러 타입
//!
//! 도메인 크레이트는 자체 에러 enum을 두고 [`ScanpostError`]로 변환하여
//! 상위 계층에서 `?`로 전파합니다.

/// scanpost 최상위 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanpostError {
    /// 설정 오류
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 원격 스캔 서비스 오류
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// 스캔 세션 생명주기 오류
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일이 존재하지 않음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 값이 범위를 벗어나거나 형식이 잘못됨
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 원격 스캔 서비스 통신 에러
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// 전송 실패, 응답 없음
    #[error("network error: {0}")]
    Network(String),

    /// 비정상 상태 코드 또는 해석할 수 없는 응답 본문
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 성공 응답이지만 식별자가 없음
    #[error("missing identifier: {0}")]
    MissingIdentifier(String),

    /// 요청 경로에 사용할 수 없는 식별자
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// 스캔 세션 상태 머신 에러
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 클라이언트 측 파일 검증 실패
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// 종료 상태 없이 폴링 상한 도달
    #[error("scan timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// 이미 업로드 또는 스캔 중인 세션이 있음
    #[error("a scan is already in progress")]
    Busy,

    /// 호출 진행 중 세션이 초기화되거나 교체됨
    #[error("session superseded")]
    Superseded,
}
