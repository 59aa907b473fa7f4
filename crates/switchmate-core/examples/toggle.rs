//! Example: Toggling a Switchmate
//!
//! Connects, waits for the current state, flips it and prints the state the
//! switch reports back.
//!
//! Run with: `cargo run --example toggle -- <identifier>`

use std::env;
use std::time::Duration;

use switchmate_core::{ConnectionState, DriverOptions, LinkConfig, Session};
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let identifier = env::args()
        .nth(1)
        .ok_or("usage: toggle <name-or-address>")?;

    let options = DriverOptions::new(&identifier);
    let session = Session::start(&identifier, &options, LinkConfig::default())?;
    let handle = session.handle().clone();
    let mut outputs = handle.outputs();

    println!("Connecting to {}...", identifier);
    timeout(
        Duration::from_secs(60),
        outputs.wait_for_connection(ConnectionState::is_established),
    )
    .await??;

    handle.poll()?;
    let current = (*timeout(
        Duration::from_secs(15),
        outputs.state.wait_for(Option::is_some),
    )
    .await??)
    .unwrap_or(false);
    println!("Switch is {}", if current { "on" } else { "off" });

    handle.set_state(!current).await?;
    let reported = (*timeout(
        Duration::from_secs(15),
        outputs.state.wait_for(|s| *s == Some(!current)),
    )
    .await??)
    .unwrap_or(current);
    println!("Switch is now {}", if reported { "on" } else { "off" });

    session.shutdown().await?;
    Ok(())
}
