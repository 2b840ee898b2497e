//! `scanpost scan` command handler
//!
//! Runs one session through the orchestrator, prints phase and status
//! changes to stderr as they arrive, then renders the final report.

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use scanpost_core::types::{CandidateFile, Phase, ScanResult, SessionId, StatusIndicator, Verdict};
use scanpost_orchestrator::{
    HttpScanService, OrchestratorConfig, ScanError, ScanEvent, ScanOrchestrator,
    ScanOrchestratorBuilder, SessionFailure, SessionSnapshot,
};

use super::{LoadedConfig, candidate_from_path};
use crate::cli::{OutputFormat, ScanArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, format_bytes, tone_colored};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    loaded: LoadedConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let file = candidate_from_path(&args.file, args.content_type).await?;
    let name = file.name.clone();
    let size = file.size();

    let service = Arc::new(HttpScanService::new(&loaded.config.service)?);
    let (orchestrator, events) = ScanOrchestratorBuilder::new()
        .config(OrchestratorConfig::from_core(&loaded.config.scan))
        .service(service)
        .build()?;
    let mut events =
        events.ok_or_else(|| CliError::Command("event channel unavailable".to_owned()))?;
    let mut progress = ProgressPrinter::new(writer.format() == OutputFormat::Text);

    info!(file = %name, size, base_url = %loaded.config.service.base_url, "submitting file");

    let outcome = tokio::select! {
        outcome = run_session(&orchestrator, file, &mut events, &mut progress, args.no_wait) => {
            outcome
        }
        _ = tokio::signal::ctrl_c() => {
            orchestrator.reset();
            warn!(file = %name, "interrupted, scan abandoned");
            return Err(CliError::Command("interrupted".to_owned()));
        }
    };

    let report = ScanReport::new(name, size, orchestrator.snapshot());
    match outcome {
        Ok(Some(terminal)) => {
            writer.render(&report)?;
            exit_status(terminal)
        }
        Ok(None) => {
            // --no-wait: the scan keeps running remotely
            writer.render(&report)?;
            Ok(())
        }
        Err(e) => {
            if report.phase == Phase::Failed {
                writer.render(&report)?;
            }
            Err(e)
        }
    }
}

/// Submits `file` and, unless `no_wait`, waits for the terminal event.
async fn run_session(
    orchestrator: &ScanOrchestrator<HttpScanService>,
    file: CandidateFile,
    events: &mut mpsc::Receiver<ScanEvent>,
    progress: &mut ProgressPrinter,
    no_wait: bool,
) -> Result<Option<ScanEvent>, CliError> {
    let submit = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.submit(file).await }
    });
    let session_id = await_submit(submit, events, progress).await?;
    if no_wait {
        return Ok(None);
    }

    wait_until_settled(events, session_id, |event| progress.on_event(event))
        .await
        .map(Some)
        .ok_or_else(|| {
            CliError::Command("event channel closed before the scan settled".to_owned())
        })
}

/// Forwards events to `progress` until the submit task returns.
async fn await_submit(
    mut submit: JoinHandle<Result<SessionId, ScanError>>,
    events: &mut mpsc::Receiver<ScanEvent>,
    progress: &mut ProgressPrinter,
) -> Result<SessionId, CliError> {
    loop {
        tokio::select! {
            joined = &mut submit => {
                let outcome = joined
                    .map_err(|e| CliError::Command(format!("scan task failed: {e}")))?;
                return outcome.map_err(CliError::from);
            }
            Some(event) = events.recv() => progress.on_event(&event),
        }
    }
}

/// Drains events until `session_id` reaches `Completed` or `Failed`.
///
/// Events of other sessions are skipped. Returns `None` if the channel
/// closes first.
pub async fn wait_until_settled(
    events: &mut mpsc::Receiver<ScanEvent>,
    session_id: SessionId,
    mut on_event: impl FnMut(&ScanEvent),
) -> Option<ScanEvent> {
    while let Some(event) = events.recv().await {
        if event.session_id() != session_id {
            continue;
        }
        on_event(&event);
        if event.is_terminal() {
            return Some(event);
        }
    }
    None
}

/// Maps the terminal event to the command result.
fn exit_status(terminal: ScanEvent) -> Result<(), CliError> {
    match terminal {
        ScanEvent::Completed { result, .. } => verdict_status(result),
        ScanEvent::Failed { error, .. } => Err(CliError::from(error)),
        other => Err(CliError::Command(format!(
            "unexpected final event: {}",
            other.kind_name()
        ))),
    }
}

fn verdict_status(result: ScanResult) -> Result<(), CliError> {
    match result.status {
        Verdict::Clean => Ok(()),
        Verdict::Infected => Err(CliError::Infected {
            signature: result.signature,
        }),
        Verdict::Error => Err(CliError::Verdict(
            result
                .message
                .unwrap_or_else(|| "service returned no verdict".to_owned()),
        )),
    }
}

/// Live status lines on stderr.
struct ProgressPrinter {
    enabled: bool,
    last_quarter: u8,
    last_text: Option<String>,
}

impl ProgressPrinter {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_quarter: 0,
            last_text: None,
        }
    }

    fn on_event(&mut self, event: &ScanEvent) {
        if !self.enabled {
            return;
        }
        if let Some(line) = self.line_for(event) {
            eprintln!("{line}");
        }
    }

    /// Upload progress once per 25% crossed; indicators only when the text changes.
    fn line_for(&mut self, event: &ScanEvent) -> Option<String> {
        match event {
            ScanEvent::PhaseChanged { indicator, .. } => self.indicator_line(indicator, None),
            ScanEvent::UploadProgress { percent, .. } => {
                let quarter = percent / 25;
                if quarter <= self.last_quarter {
                    return None;
                }
                self.last_quarter = quarter;
                Some(format!("  upload {percent:>3}%"))
            }
            ScanEvent::StatusObserved {
                attempt, indicator, ..
            } => self.indicator_line(indicator, Some(*attempt)),
            ScanEvent::Completed { .. } | ScanEvent::Failed { .. } => None,
        }
    }

    fn indicator_line(
        &mut self,
        indicator: &StatusIndicator,
        attempt: Option<u32>,
    ) -> Option<String> {
        if self.last_text.as_deref() == Some(indicator.text.as_str()) {
            return None;
        }
        self.last_text = Some(indicator.text.clone());
        let text = tone_colored(&indicator.text, indicator.tone);
        Some(match attempt {
            Some(n) => format!("{text} (check #{n})"),
            None => text.to_string(),
        })
    }
}

/// Final state of the session as printed to stdout.
#[derive(Serialize)]
pub struct ScanReport {
    pub file: String,
    pub size: u64,
    pub session_id: SessionId,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    pub status_checks: u32,
    pub indicator: StatusIndicator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SessionFailure>,
}

impl ScanReport {
    pub fn new(file: String, size: u64, snapshot: SessionSnapshot) -> Self {
        Self {
            file,
            size,
            session_id: snapshot.session_id,
            phase: snapshot.phase,
            upload_id: snapshot.upload_id,
            scan_id: snapshot.scan_id,
            status_checks: snapshot.poll_attempt,
            indicator: snapshot.indicator,
            result: snapshot.result,
            failure: snapshot.failure,
        }
    }
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "File:      {} ({})", self.file.bold(), format_bytes(self.size))?;
        if let Some(scan_id) = &self.scan_id {
            writeln!(w, "Scan ID:   {scan_id}")?;
        }
        writeln!(w, "Phase:     {}", self.phase)?;
        if self.status_checks > 0 {
            writeln!(w, "Checks:    {}", self.status_checks)?;
        }
        writeln!(
            w,
            "Status:    {}",
            tone_colored(&self.indicator.text, self.indicator.tone)
        )?;

        if let Some(result) = &self.result {
            let verdict = result.status.as_str().to_uppercase();
            let verdict = match result.status {
                Verdict::Clean => verdict.green().bold(),
                Verdict::Infected | Verdict::Error => verdict.red().bold(),
            };
            writeln!(w, "Verdict:   {verdict}")?;
            if let Some(signature) = &result.signature {
                writeln!(w, "Signature: {}", signature.red())?;
            }
            if let Some(message) = &result.message {
                writeln!(w, "Message:   {message}")?;
            }
            if let Some(scanned_at) = &result.scanned_at {
                writeln!(w, "Scanned:   {scanned_at}")?;
            }
            if let Some(original) = result.meta.original_name() {
                writeln!(w, "Original:  {original}")?;
            }
        }

        if let Some(failure) = &self.failure {
            writeln!(w, "Error:     {} ({})", failure.message.red(), failure.kind)?;
        }
        Ok(())
    }
}
