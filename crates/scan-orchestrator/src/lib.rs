#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error type (`ScanError`)
//! - [`config`]: Orchestrator configuration (`OrchestratorConfig`, builder)
//! - [`validator`]: Client-side file checks (`FileValidator`)
//! - [`normalizer`]: Result shape normalization (`normalize`)
//! - [`service`]: Remote service abstraction (`ScanService` trait, `HttpScanService`)
//! - [`poller`]: Cancellable poll loop handle (`Poller`)
//! - [`session`]: Session state (`ScanSession`, `SessionSnapshot`)
//! - [`event`]: Events for the presentation layer (`ScanEvent`)
//! - [`orchestrator`]: State machine (`ScanOrchestrator`, `ScanOrchestratorBuilder`)

pub mod config;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod orchestrator;
pub mod poller;
pub mod service;
pub mod session;
pub mod validator;

// --- Public API Re-exports ---

pub use orchestrator::{ScanOrchestrator, ScanOrchestratorBuilder};

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};

pub use error::ScanError;

pub use event::ScanEvent;

pub use normalizer::normalize;

pub use service::{
    HttpScanService, ProgressFn, ScanService, ScanStartResponse, StatusReport, UploadResponse,
    validate_identifier,
};

pub use session::{SessionFailure, SessionSnapshot};

pub use validator::{FileValidator, ValidationReport, mime_for_extension};
