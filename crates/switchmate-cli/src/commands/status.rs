//! Status command implementation.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::format::{format_status_json, format_status_text};
use crate::util::{connect, require_device, wait_for_value};

pub async fn cmd_status(args: DeviceArgs, format: OutputFormat, config: &Config) -> Result<()> {
    let identifier = require_device(args.device, config)?;
    let wait = Duration::from_secs(args.timeout);

    let session = connect(&identifier, config, false, wait).await?;
    let handle = session.handle().clone();
    let mut outputs = handle.outputs();

    handle.poll().context("Driver stopped")?;
    wait_for_value(&mut outputs.state, wait, Option::is_some).await;
    wait_for_value(&mut outputs.battery, wait, Option::is_some).await;

    let status = handle.status().await.context("Driver stopped")?;
    session.shutdown().await.ok();

    let content = match format {
        OutputFormat::Json => format_status_json(&status)?,
        OutputFormat::Text => format_status_text(&status),
    };
    print!("{}", content);
    Ok(())
}
