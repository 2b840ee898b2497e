//! `scanpost health` command handler

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use scanpost_orchestrator::HttpScanService;

use super::LoadedConfig;
use crate::cli::HealthArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `health` command.
pub async fn execute(
    args: HealthArgs,
    loaded: LoadedConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let service = HttpScanService::new(&loaded.config.service)?;
    info!(base_url = service.base_url(), "checking service health");

    let health = service.health().await?;
    let stats = if args.stats {
        Some(service.stats().await?)
    } else {
        None
    };

    let report = HealthReport {
        base_url: service.base_url().to_owned(),
        health,
        stats,
    };
    writer.render(&report)
}

#[derive(Serialize)]
pub struct HealthReport {
    pub base_url: String,
    pub health: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

impl Render for HealthReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Service: {}", self.base_url.bold())?;
        let status = self
            .health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let status = match status {
            "ok" | "healthy" | "up" => status.green().bold(),
            "unknown" => status.dimmed(),
            _ => status.yellow().bold(),
        };
        writeln!(w, "Status:  {status}")?;
        write_fields(w, &self.health, "  ")?;

        if let Some(stats) = &self.stats {
            writeln!(w)?;
            writeln!(w, "{}", "Stats".bold())?;
            write_fields(w, stats, "  ")?;
        }
        Ok(())
    }
}

/// One line per top-level field; nested values are printed as compact JSON.
fn write_fields(w: &mut dyn Write, value: &Value, indent: &str) -> std::io::Result<()> {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if key == "status" {
                    continue;
                }
                match v {
                    Value::String(s) => writeln!(w, "{indent}{key}: {s}")?,
                    other => writeln!(w, "{indent}{key}: {other}")?,
                }
            }
        }
        Value::Null => {}
        other => writeln!(w, "{indent}{other}")?,
    }
    Ok(())
}
