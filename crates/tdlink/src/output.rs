//! Output formatting: JSON to stdout, colored status lines to stderr.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn render_json<T: Serialize + ?Sized>(data: &T, format: OutputFormat) -> String {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data),
        OutputFormat::JsonCompact => serde_json::to_string(data),
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
}

/// Print one rendered value to stdout. A closed pipe ends output quietly.
pub fn print_output(output: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match writeln!(stdout, "{output}").and_then(|()| stdout.flush()) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

pub fn print_success(msg: &str, color: ColorMode) {
    if should_color(color) {
        eprintln!("{} {msg}", "✓".green());
    } else {
        eprintln!("✓ {msg}");
    }
}

pub fn print_note(msg: &str, color: ColorMode) {
    if should_color(color) {
        eprintln!("{}", msg.dimmed());
    } else {
        eprintln!("{msg}");
    }
}
