//! `scanpost config` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use super::LoadedConfig;
use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
///
/// `loaded` is the outcome of loading the effective configuration; `source`
/// names the file that was (or would have been) read.
pub fn execute(
    args: ConfigArgs,
    loaded: Result<LoadedConfig, CliError>,
    source: &str,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(loaded, source, writer),
        ConfigAction::Show { section } => execute_show(loaded?, section, writer),
    }
}

fn execute_validate(
    loaded: Result<LoadedConfig, CliError>,
    source: &str,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(source, "validating configuration");

    let report = match loaded {
        Ok(loaded) => ConfigValidationReport {
            source: loaded.source,
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: source.to_owned(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Shows the effective configuration, with credentials in `base_url` redacted.
fn execute_show(
    loaded: LoadedConfig,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let LoadedConfig { source, mut config } = loaded;
    config.service.base_url = redact_url(&config.service.base_url);

    let value = match section.as_deref() {
        None => serde_json::to_value(&config)?,
        Some("general") => serde_json::to_value(&config.general)?,
        Some("service") => serde_json::to_value(&config.service)?,
        Some("scan") => serde_json::to_value(&config.scan)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: general, service, scan)"
            )));
        }
    };
    let config_toml = toml::to_string_pretty(&value)
        .map_err(|e| CliError::Command(format!("serialization error: {e}")))?;

    writer.render(&ConfigReport {
        source,
        section,
        config: value,
        config_toml,
    })
}

/// Replaces `user:password@` in a URL with `***REDACTED***@`.
fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_owned();
    };
    let (scheme, rest) = url.split_at(scheme_end + 3);
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}***REDACTED***{}", &rest[at..]),
        None => url.to_owned(),
    }
}

/// Effective configuration.
///
/// JSON output carries the values as an object; text output prints TOML.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
