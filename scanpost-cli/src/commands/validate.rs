//! `scanpost validate` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use scanpost_orchestrator::FileValidator;

use super::candidate_from_path;
use crate::cli::ValidateArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, format_bytes};

/// Execute the `validate` command. Never contacts the service.
pub async fn execute(args: ValidateArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let validator = FileValidator::default();
    let mut entries = Vec::with_capacity(args.files.len());

    for path in &args.files {
        let file = candidate_from_path(path, None).await?;
        let report = validator.validate(Some(&file));
        info!(
            file = %file.name,
            valid = report.is_valid,
            errors = report.errors.len(),
            "validated file"
        );
        entries.push(FileEntry {
            path: path.display().to_string(),
            size: file.size(),
            content_type: file.content_type,
            valid: report.is_valid,
            errors: report.errors,
        });
    }

    let report = ValidateReport { files: entries };
    writer.render(&report)?;

    let failures = report.failures();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::Validation(failures))
    }
}

#[derive(Serialize)]
pub struct ValidateReport {
    pub files: Vec<FileEntry>,
}

impl ValidateReport {
    /// `"<path>: <reason>"` for every rejected file.
    fn failures(&self) -> Vec<String> {
        self.files
            .iter()
            .flat_map(|f| f.errors.iter().map(move |e| format!("{}: {e}", f.path)))
            .collect()
    }
}

#[derive(Serialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Render for ValidateReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for f in &self.files {
            let verdict = if f.valid {
                "OK".green().bold()
            } else {
                "REJECTED".red().bold()
            };
            writeln!(
                w,
                "{:<9} {} ({}, {})",
                verdict,
                f.path.bold(),
                format_bytes(f.size),
                f.content_type.as_deref().unwrap_or("unknown type")
            )?;
            for err in &f.errors {
                writeln!(w, "          {}", err.red())?;
            }
        }
        Ok(())
    }
}
