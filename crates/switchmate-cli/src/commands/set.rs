//! Set command implementation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{DeviceArgs, SwitchAction};
use crate::config::Config;
use crate::format::state_label;
use crate::util::{connect, require_device, wait_for_value};

pub async fn cmd_set(action: SwitchAction, args: DeviceArgs, config: &Config) -> Result<()> {
    let identifier = require_device(args.device, config)?;
    let wait = Duration::from_secs(args.timeout);

    let session = connect(&identifier, config, false, wait).await?;
    let handle = session.handle().clone();
    let mut outputs = handle.outputs();

    let current = if action == SwitchAction::Toggle {
        handle.poll().context("Driver stopped")?;
        wait_for_value(&mut outputs.state, wait, Option::is_some).await
    } else {
        None
    };
    let Some(target) = action.target(current) else {
        session.shutdown().await.ok();
        bail!("Cannot toggle {}: current state unknown", identifier);
    };

    info!("Switching {} {}", identifier, state_label(Some(target)));
    if let Err(e) = handle.set_state(target).await {
        session.shutdown().await.ok();
        return Err(e).context("Failed to write state");
    }

    let reported = wait_for_value(&mut outputs.state, wait, |s| *s == Some(target)).await;
    session.shutdown().await.ok();

    if reported != Some(target) {
        bail!(
            "Write sent but {} still reports {}",
            identifier,
            state_label(reported)
        );
    }
    println!("{}: {}", identifier, state_label(reported));
    Ok(())
}
