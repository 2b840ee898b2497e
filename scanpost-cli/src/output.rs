//! Output formatting for text vs JSON rendering
//!
//! Command results flow through [`OutputWriter`] on stdout. Live progress
//! goes to stderr so JSON output stays machine-readable.

use std::io::Write;

use colored::{ColoredString, Colorize};
use serde::Serialize;

use scanpost_core::types::Tone;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to any writer.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering, implemented next to `Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Colors `text` by indicator tone.
pub fn tone_colored(text: &str, tone: Tone) -> ColoredString {
    match tone {
        Tone::Neutral => text.normal(),
        Tone::Warn => text.yellow(),
        Tone::Success => text.green().bold(),
        Tone::Danger => text.red().bold(),
    }
}

/// `1536` -> `"1.50 KB"`. Units are powers of 1024 up to GB.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestPayload {
        name: String,
        count: u32,
    }

    impl Render for TestPayload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "Name: {}", self.name)?;
            writeln!(w, "Count: {}", self.count)
        }
    }

    fn payload() -> TestPayload {
        TestPayload {
            name: "report.pdf".to_owned(),
            count: 3,
        }
    }

    #[test]
    fn text_format_uses_render() {
        let writer = OutputWriter::new(OutputFormat::Text);
        let mut buffer = Vec::new();
        writer.render_to(&payload(), &mut buffer).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("Name: report.pdf"));
        assert!(output.contains("Count: 3"));
    }

    #[test]
    fn json_format_is_parseable() {
        let writer = OutputWriter::new(OutputFormat::Json);
        let mut buffer = Vec::new();
        writer.render_to(&payload(), &mut buffer).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed["name"], "report.pdf");
        assert_eq!(parsed["count"], 3);
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024 * 1024), "5120.00 GB");
    }

    #[test]
    fn tone_colored_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(tone_colored("Scanning...", Tone::Warn).to_string(), "Scanning...");
    }
}
