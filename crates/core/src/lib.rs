#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 재export ---

pub use error::{ConfigError, ScanpostError, ServiceError, SessionError};

pub use config::ScanpostConfig;

pub use types::{
    CandidateFile, Phase, RemoteStatus, ResultMeta, ScanResult, SessionId, StatusIndicator, Tone,
    Verdict,
};
