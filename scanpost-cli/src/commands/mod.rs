//! Command handlers -- one module per subcommand

pub mod config;
pub mod health;
pub mod scan;
pub mod validate;

use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use scanpost_core::config::ScanpostConfig;
use scanpost_core::types::CandidateFile;
use scanpost_orchestrator::mime_for_extension;

use crate::cli::DEFAULT_CONFIG_FILE;
use crate::error::CliError;

/// Effective configuration and where it came from.
#[derive(Debug)]
pub struct LoadedConfig {
    /// File path, or `"defaults"` when no file was read
    pub source: String,
    pub config: ScanpostConfig,
}

/// Flag values that take precedence over file and environment.
#[derive(Debug, Default)]
pub struct FlagOverrides<'a> {
    pub log_level: Option<&'a str>,
    pub base_url: Option<&'a str>,
}

/// Loads defaults, file, env overrides, then flags, and validates the result.
///
/// Without `--config`, a missing `scanpost.toml` is not an error: defaults
/// plus env overrides are used instead.
pub async fn load_config(
    path: Option<&Path>,
    flags: &FlagOverrides<'_>,
) -> Result<LoadedConfig, CliError> {
    let (source, mut config) = match path {
        Some(path) => (
            path.display().to_string(),
            ScanpostConfig::from_file(path).await?,
        ),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => (
            DEFAULT_CONFIG_FILE.to_owned(),
            ScanpostConfig::from_file(DEFAULT_CONFIG_FILE).await?,
        ),
        None => {
            debug!("no config file, using defaults");
            ("defaults".to_owned(), ScanpostConfig::default())
        }
    };

    // validated once, after every source has been applied
    config.apply_env_overrides();
    if let Some(level) = flags.log_level {
        config.general.log_level = level.to_owned();
    }
    if let Some(url) = flags.base_url {
        config.service.base_url = url.to_owned();
    }
    config.validate()?;

    Ok(LoadedConfig { source, config })
}

/// Reads `path` into a candidate, inferring the MIME type from the extension
/// unless `content_type` is given.
pub async fn candidate_from_path(
    path: &Path,
    content_type: Option<String>,
) -> Result<CandidateFile, CliError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut file = CandidateFile::new(name, None, Bytes::from(data));
    file.content_type =
        content_type.or_else(|| mime_for_extension(&file.extension()).map(str::to_owned));
    Ok(file)
}
