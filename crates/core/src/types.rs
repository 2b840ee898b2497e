//! 오케스트레이터와 표현 계층이 공유하는 도메인 타입
//!
//! 두 가지 차원을 분리해서 다룹니다:
//! - [`Phase`]: 스캔 세션의 생명주기 (파이프라인이 끝났는가?)
//! - [`Verdict`]: 원격 스캐너가 파일에 내린 판정
//!
//! [`Phase::Completed`] 세션도 [`Verdict::Error`] 결과를 가질 수 있습니다.
//! 스캔은 끝났고 문제를 보고한 것입니다. [`Phase::Failed`]는 전송, 프로토콜,
//! 타임아웃 등으로 파이프라인 자체가 실패해 결과가 없는 상태입니다.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 스캔 세션 생명주기 단계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// 진행 중인 세션 없음
    #[default]
    Idle,
    /// 파일 전송 중
    Uploading,
    /// 스캔 시작됨, 상태 폴링 중
    Scanning,
    /// 스캔 생명주기 종료, 결과 있음
    Completed,
    /// 결과를 가져오기 전에 파이프라인 실패
    Failed,
}

impl Phase {
    /// 세션이 네트워크 작업을 진행 중이면 `true`를 반환합니다.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Scanning)
    }

    /// `Completed`와 `Failed`이면 `true`를 반환합니다.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// 한 세션 안에서 허용되는 전이
    ///
    /// `Idle` 복귀는 전이가 아니라 세션 교체(reset)입니다.
    pub fn can_transition_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Uploading)
                | (Self::Uploading, Self::Scanning)
                | (Self::Uploading, Self::Failed)
                | (Self::Scanning, Self::Completed)
                | (Self::Scanning, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Scanning => "scanning",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 진행 중 원격 서비스가 보고하는 상태
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    /// 대기열에 있음
    Pending,
    /// 스캔 중
    Scanning,
    /// 완료, 결과 조회 가능
    Completed,
    /// 에러로 종료, 상세 내용은 결과 본문에 있음
    Error,
    /// 알 수 없는 상태, 종료 상태로 취급하지 않음
    Other(String),
}

impl RemoteStatus {
    /// 대소문자 구분 없이 상태 문자열을 파싱합니다.
    ///
    /// 알 수 없는 값은 [`RemoteStatus::Other`]에 보존됩니다.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pending" => Self::Pending,
            "scanning" => Self::Scanning,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Other(s.trim().to_owned()),
        }
    }

    /// `completed`와 `error`는 폴링을 종료시킵니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Scanning => "scanning",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 파일에 대한 스캐너 판정
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// 악성코드 없음
    Clean,
    /// 악성코드 발견, [`ScanResult::signature`] 참조
    Infected,
    /// 신뢰할 수 있는 판정을 내리지 못함
    #[default]
    Error,
}

impl Verdict {
    /// 대소문자 구분 없이 판정 문자열을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "clean" => Some(Self::Clean),
            "infected" => Some(Self::Infected),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 결과에 첨부된 파일 메타데이터
///
/// 형태는 서비스가 정하므로 원본 맵을 그대로 보관하고
/// 주요 키는 접근자로 제공합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultMeta(Map<String, Value>);

impl ResultMeta {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// 업로드된 원본 파일명
    pub fn original_name(&self) -> Option<&str> {
        self.0.get("originalName").and_then(Value::as_str)
    }

    /// 파일 크기 (바이트)
    pub fn size(&self) -> Option<u64> {
        self.0.get("size").and_then(Value::as_u64)
    }

    /// 서비스가 기록한 MIME 타입
    pub fn mimetype(&self) -> Option<&str> {
        self.0.get("mimetype").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// 정규화기가 한 번 생성하는 표준 스캔 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub status: Verdict,
    pub meta: ResultMeta,
    /// 악성코드 시그니처, [`Verdict::Infected`]일 때만 존재
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<String>,
}

impl ScanResult {
    pub fn is_clean(&self) -> bool {
        self.status == Verdict::Clean
    }

    pub fn is_infected(&self) -> bool {
        self.status == Verdict::Infected
    }
}

/// 표현 계층이 상태를 표시할 때 쓰는 심각도 태그
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Warn,
    Success,
    Danger,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neutral => write!(f, "neutral"),
            Self::Warn => write!(f, "warn"),
            Self::Success => write!(f, "success"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// 사람이 읽는 상태 문구와 톤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusIndicator {
    pub text: String,
    pub tone: Tone,
}

impl StatusIndicator {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    pub fn idle() -> Self {
        Self::new("Waiting for file...", Tone::Neutral)
    }

    pub fn uploading() -> Self {
        Self::new("Uploading file...", Tone::Warn)
    }

    pub fn starting_scan() -> Self {
        Self::new("Starting scan...", Tone::Warn)
    }

    /// 폴링한 원격 상태에 대한 표시
    pub fn for_remote(status: &RemoteStatus) -> Self {
        match status {
            RemoteStatus::Pending => Self::new("Queued...", Tone::Warn),
            RemoteStatus::Scanning => Self::new("Scanning...", Tone::Warn),
            RemoteStatus::Completed => Self::new("Completed", Tone::Success),
            RemoteStatus::Error => Self::new("Error", Tone::Danger),
            RemoteStatus::Other(s) => Self::new(s.clone(), Tone::Neutral),
        }
    }

    /// 결과를 받은 뒤의 표시
    pub fn for_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Clean => Self::new("File is clean", Tone::Success),
            Verdict::Infected => Self::new("File is infected", Tone::Danger),
            Verdict::Error => Self::new("Scan reported an error", Tone::Danger),
        }
    }

    pub fn failed(message: &str) -> Self {
        Self::new(format!("Scan failed: {message}"), Tone::Danger)
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::idle()
    }
}

/// 스캔 세션 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 사용자가 고른, 아직 검증되지 않은 파일
///
/// 선택부터 업로드 전까지만 존재하며, 전송이 시작되면
/// 오케스트레이터가 보관하지 않습니다.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// 선언된 파일명
    pub name: String,
    /// 선언된 MIME 타입 (있을 경우)
    pub content_type: Option<String>,
    /// 파일 내용
    pub data: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type,
            data,
        }
    }

    /// 파일 바이트 길이
    pub fn size(&self) -> u64 {
        u64::try_from(self.data.len()).unwrap_or(u64::MAX)
    }

    /// 마지막 `.` 뒤의 소문자 확장자. 점이 없으면
    /// 소문자로 바꾼 파일명 전체를 반환합니다.
    pub fn extension(&self) -> String {
        let lower = self.name.to_lowercase();
        match lower.rsplit_once('.') {
            Some((_, ext)) => ext.to_owned(),
            None => lower,
        }
    }
}

impl fmt::Display for CandidateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, {})",
            self.name,
            self.size(),
            self.content_type.as_deref().unwrap_or("no content type"),
        )
    }
}
