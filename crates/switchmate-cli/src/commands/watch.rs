//! Watch command implementation.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::cli::DeviceArgs;
use crate::config::Config;
use crate::format::{Change, format_change};
use crate::util::{connect, require_device};

pub async fn cmd_watch(args: DeviceArgs, notify: bool, config: &Config) -> Result<()> {
    let identifier = require_device(args.device, config)?;
    let session = connect(&identifier, config, notify, Duration::from_secs(args.timeout)).await?;
    let handle = session.handle().clone();
    let name = config.driver_options(&identifier, notify).name;
    let mut outputs = handle.outputs();

    handle.poll().ok();
    info!("Watching {} (Ctrl-C to stop)", identifier);

    loop {
        let change = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(()) = outputs.state.changed() => Change::State(*outputs.state.borrow_and_update()),
            Ok(()) = outputs.battery.changed() => Change::Battery(*outputs.battery.borrow_and_update()),
            Ok(()) = outputs.warning.changed() => Change::Warning(*outputs.warning.borrow_and_update()),
            Ok(()) = outputs.connection.changed() => Change::Connection(*outputs.connection.borrow_and_update()),
            else => break,
        };
        println!("{}", format_change(&name, change));
    }

    session.shutdown().await?;
    Ok(())
}
