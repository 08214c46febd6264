//! Scan command implementation.

use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use nusterm_core::{ScanOptions, scan_with_options};

use crate::cli::OutputFormat;
use crate::format::{DeviceSummary, FormatOptions, format_scan_json, format_scan_text};
use crate::style;

pub async fn cmd_scan(
    timeout: u64,
    format: OutputFormat,
    all_devices: bool,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    // Show spinner for text output (unless quiet)
    let spinner = if !quiet && format == OutputFormat::Text && io::stderr().is_terminal() {
        Some(style::scanning_spinner(timeout))
    } else {
        None
    };

    let mut options = ScanOptions::new().duration_secs(timeout);
    if all_devices {
        options = options.all_devices();
    }

    let result = scan_with_options(options).await;

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    let devices = result.context("Failed to scan for devices")?;
    let summaries: Vec<DeviceSummary<'_>> = devices.iter().map(DeviceSummary::from).collect();

    let content = match format {
        OutputFormat::Json => format_scan_json(&summaries, opts)?,
        OutputFormat::Text => format_scan_text(&summaries, opts),
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
