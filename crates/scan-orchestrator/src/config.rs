//! 스캔 오케스트레이터 설정
//!
//! [`OrchestratorConfig`]는 core의
//! [`ScanConfig`](scanpost_core::config::ScanConfig) 섹션에서 생성됩니다.
//!
//! # 사용 예시
//! ```ignore
//! use scanpost_core::config::ScanpostConfig;
//! use scanpost_orchestrator::config::OrchestratorConfig;
//!
//! let core_config = ScanpostConfig::default();
//! let config = OrchestratorConfig::from_core(&core_config.scan);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_POLL_ATTEMPTS: u32 = 10_000;

/// 오케스트레이터 폴링 및 이벤트 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 상태 조회 간격 (ms)
    pub poll_interval_ms: u64,
    /// 타임아웃 전까지의 상태 조회 횟수
    pub max_poll_attempts: u32,
    /// 빌더가 생성하는 이벤트 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1500,
            max_poll_attempts: 120,
            event_channel_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_core(core: &scanpost_core::config::ScanConfig) -> Self {
        Self {
            poll_interval_ms: core.poll_interval_ms,
            max_poll_attempts: core.max_poll_attempts,
            event_channel_capacity: core.event_channel_capacity,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 타임아웃까지 폴링에 걸리는 최대 시간
    pub fn max_poll_duration(&self) -> Duration {
        self.poll_interval().saturating_mul(self.max_poll_attempts)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ScanError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be {MIN_POLL_INTERVAL_MS}-{MAX_POLL_INTERVAL_MS}"),
            });
        }

        if self.max_poll_attempts == 0 || self.max_poll_attempts > MAX_POLL_ATTEMPTS {
            return Err(ScanError::Config {
                field: "max_poll_attempts".to_owned(),
                reason: format!("must be 1-{MAX_POLL_ATTEMPTS}"),
            });
        }

        if self.event_channel_capacity == 0 {
            return Err(ScanError::Config {
                field: "event_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// [`OrchestratorConfig`] 빌더, `build` 시 검증합니다.
#[derive(Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<OrchestratorConfig, ScanError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
