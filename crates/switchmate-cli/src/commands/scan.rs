//! Scan command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use switchmate_core::{ScanOptions, scan};

use crate::cli::OutputFormat;
use crate::format::{format_scan_json, format_scan_text};

pub async fn cmd_scan(timeout: u64, all: bool, format: OutputFormat) -> Result<()> {
    let mut options = ScanOptions::default().duration(Duration::from_secs(timeout));
    if all {
        options = options.all_devices();
    }

    let devices = scan::scan_with_options(options)
        .await
        .context("Failed to scan for devices")?;

    let content = match format {
        OutputFormat::Json => format_scan_json(&devices)?,
        OutputFormat::Text => format_scan_text(&devices),
    };
    print!("{}", content);
    Ok(())
}
