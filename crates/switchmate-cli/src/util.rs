//! Shared helpers for commands that talk to a device.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tokio::time::timeout;

use switchmate_core::Session;
use switchmate_types::ConnectionState;

use crate::config::Config;

/// Resolve the device or fail with a hint.
pub fn require_device(device: Option<String>, config: &Config) -> Result<String> {
    match config.resolve_device(device) {
        Some(device) => Ok(device),
        None => bail!(
            "No device specified. Use --device, set SWITCHMATE_DEVICE, or set [device].address in the config file"
        ),
    }
}

/// Start a session and wait until the link is established.
pub async fn connect(
    identifier: &str,
    config: &Config,
    notify: bool,
    wait: Duration,
) -> Result<Session> {
    let options = config.driver_options(identifier, notify);
    let session = Session::start(identifier, &options, config.link_config())
        .context("Failed to start driver")?;

    let mut outputs = session.handle().outputs();
    let established = timeout(
        wait,
        outputs.wait_for_connection(ConnectionState::is_established),
    )
    .await;

    match established {
        Ok(Ok(_)) => Ok(session),
        Ok(Err(e)) => {
            session.shutdown().await.ok();
            Err(e).context("Driver stopped while connecting")
        }
        Err(_) => {
            let status = session.handle().status().await.ok();
            session.shutdown().await.ok();
            match status {
                Some(status) if status.warning => bail!(
                    "Timed out after {:?} waiting for {} ({}); the device may not be a Switchmate",
                    wait,
                    identifier,
                    status.connection_state
                ),
                _ => bail!("Timed out after {:?} connecting to {}", wait, identifier),
            }
        }
    }
}

/// Wait until `rx` holds a value satisfying `predicate`, up to `wait`.
///
/// Returns the last seen value when the wait times out.
pub async fn wait_for_value<T, F>(rx: &mut watch::Receiver<T>, wait: Duration, predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let reached = match timeout(wait, rx.wait_for(predicate)).await {
        Ok(Ok(value)) => Some(value.clone()),
        _ => None,
    };
    reached.unwrap_or_else(|| rx.borrow().clone())
}
