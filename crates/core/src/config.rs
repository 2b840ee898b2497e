//! 설정 관리 -- `scanpost.toml` 파싱 및 런타임 설정
//!
//! [`ScanpostConfig`]는 모든 섹션을 담고, 각 크레이트는 자기 섹션만 읽습니다.
//!
//! # 설정 우선순위
//! 1. CLI 플래그 (최우선)
//! 2. 환경변수 (`SCANPOST_SERVICE_BASE_URL=http://scanner:8080/api`)
//! 3. 설정 파일 (`scanpost.toml`)
//! 4. `Default` 구현
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), scanpost_core::error::ScanpostError> {
//! use scanpost_core::config::ScanpostConfig;
//!
//! let config = ScanpostConfig::load("scanpost.toml").await?;
//! let config = ScanpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ScanpostError};

/// 검증 상한값
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_UPLOAD_TIMEOUT_SECS: u64 = 3600;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_POLL_ATTEMPTS: u32 = 10_000;

/// `scanpost.toml` 최상위 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanpostConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl ScanpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드 후 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScanpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일을 읽어 파싱만 합니다. 환경변수 오버라이드와 검증은 호출자 몫입니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ScanpostError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ScanpostError> {
        toml::from_str(toml_str).map_err(|e| {
            ScanpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// `SCANPOST_{SECTION}_{FIELD}` 환경변수로 값을 덮어씁니다.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "SCANPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SCANPOST_GENERAL_LOG_FORMAT");

        override_string(&mut self.service.base_url, "SCANPOST_SERVICE_BASE_URL");
        override_u64(
            &mut self.service.request_timeout_secs,
            "SCANPOST_SERVICE_REQUEST_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.service.upload_timeout_secs,
            "SCANPOST_SERVICE_UPLOAD_TIMEOUT_SECS",
        );

        override_u64(
            &mut self.scan.poll_interval_ms,
            "SCANPOST_SCAN_POLL_INTERVAL_MS",
        );
        override_u32(
            &mut self.scan.max_poll_attempts,
            "SCANPOST_SCAN_MAX_POLL_ATTEMPTS",
        );
        override_usize(
            &mut self.scan.event_channel_capacity,
            "SCANPOST_SCAN_EVENT_CHANNEL_CAPACITY",
        );
    }

    /// 모든 섹션의 값을 검증합니다.
    pub fn validate(&self) -> Result<(), ScanpostError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let base_url = self.service.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("service.base_url", "must not be empty".to_owned()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid(
                "service.base_url",
                "must start with http:// or https://".to_owned(),
            ));
        }

        if self.service.request_timeout_secs == 0
            || self.service.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(invalid(
                "service.request_timeout_secs",
                format!("must be 1-{MAX_REQUEST_TIMEOUT_SECS}"),
            ));
        }

        if self.service.upload_timeout_secs == 0
            || self.service.upload_timeout_secs > MAX_UPLOAD_TIMEOUT_SECS
        {
            return Err(invalid(
                "service.upload_timeout_secs",
                format!("must be 1-{MAX_UPLOAD_TIMEOUT_SECS}"),
            ));
        }

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.scan.poll_interval_ms) {
            return Err(invalid(
                "scan.poll_interval_ms",
                format!("must be {MIN_POLL_INTERVAL_MS}-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if self.scan.max_poll_attempts == 0 || self.scan.max_poll_attempts > MAX_POLL_ATTEMPTS {
            return Err(invalid(
                "scan.max_poll_attempts",
                format!("must be 1-{MAX_POLL_ATTEMPTS}"),
            ));
        }

        if self.scan.event_channel_capacity == 0 {
            return Err(invalid(
                "scan.event_channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ScanpostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 로깅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// trace, debug, info, warn, error
    pub log_level: String,
    /// json, pretty
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 원격 스캔 서비스 엔드포인트
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 기본 URL, 엔드포인트가 뒤에 붙음 (`{base_url}/upload`)
    pub base_url: String,
    /// 상태, 결과, 헬스 호출 타임아웃
    pub request_timeout_secs: u64,
    /// 업로드 호출 타임아웃
    pub upload_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_owned(),
            request_timeout_secs: 30,
            upload_timeout_secs: 300,
        }
    }
}

/// 오케스트레이터 폴링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 상태 조회 간격
    pub poll_interval_ms: u64,
    /// 포기 전까지의 상태 조회 횟수 (120 x 1.5초 = 3분)
    pub max_poll_attempts: u32,
    /// 새 이벤트를 버리기 전까지 버퍼링할 이벤트 수
    pub event_channel_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1500,
            max_poll_attempts: 120,
            event_channel_capacity: 256,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
