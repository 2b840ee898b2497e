//! CLI-specific error types and exit code mapping

use scanpost_core::error::{ConfigError, ScanpostError};
use scanpost_orchestrator::ScanError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to the process exit status, so a verdict
/// other than clean is reported through this type as well.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// One or more files were rejected by the upload rules.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The scan pipeline broke before producing a verdict.
    #[error("scan failed: {0}")]
    Scan(ScanError),

    /// The service reported the file as infected.
    #[error("file is infected{}", signature_suffix(.signature))]
    Infected { signature: Option<String> },

    /// The service finished but could not produce a trustworthy verdict.
    #[error("scan reported an error: {0}")]
    Verdict(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn signature_suffix(signature: &Option<String>) -> String {
    signature
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default()
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success, file is clean           |
    /// | 1    | General / pipeline error         |
    /// | 2    | Configuration error              |
    /// | 4    | File is infected                 |
    /// | 5    | Scan finished with error verdict |
    /// | 6    | File rejected by validation      |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Infected { .. } => 4,
            Self::Verdict(_) => 5,
            Self::Validation(_) => 6,
            Self::Io(_) => 10,
            Self::Scan(_) | Self::Command(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Validation(reasons) => Self::Validation(reasons),
            ScanError::Config { field, reason } => {
                Self::Config(format!("invalid value for '{field}': {reason}"))
            }
            other => Self::Scan(other),
        }
    }
}

impl From<ScanpostError> for CliError {
    fn from(e: ScanpostError) -> Self {
        match e {
            ScanpostError::Config(config) => Self::Config(config_message(&config)),
            ScanpostError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}

fn config_message(e: &ConfigError) -> String {
    match e {
        ConfigError::FileNotFound { path } => format!("config file not found: {path}"),
        other => other.to_string(),
    }
}
