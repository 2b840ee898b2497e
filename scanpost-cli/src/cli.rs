//! CLI argument parsing using clap derive API
//!
//! Purely declarative, no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "scanpost.toml";

/// Scanpost -- submit files to a remote malware-scanning service.
///
/// Use `scanpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "scanpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file [default: scanpost.toml, if present].
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override the scanning service base URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file and wait for the scan verdict.
    Scan(ScanArgs),

    /// Check files against the upload rules without contacting the service.
    Validate(ValidateArgs),

    /// Query the scanning service health endpoint.
    Health(HealthArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// File to scan.
    pub file: PathBuf,

    /// Declared MIME type (default: inferred from the extension).
    #[arg(long)]
    pub content_type: Option<String>,

    /// Return as soon as the scan has started instead of waiting for the verdict.
    #[arg(long)]
    pub no_wait: bool,
}

// ---- validate ----

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Files to check.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,
}

// ---- health ----

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Also fetch `/health/stats`.
    #[arg(long)]
    pub stats: bool,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + flags + defaults).
    Show {
        /// Show only a specific section (general, service, scan).
        #[arg(long)]
        section: Option<String>,
    },
}
