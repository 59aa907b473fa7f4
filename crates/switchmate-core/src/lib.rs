//! Core BLE driver for Switchmate light switches.
//!
//! A Switchmate is a battery powered relay that exposes its on/off state and
//! its battery level as GATT characteristics. This crate contains the GATT
//! client state machine that keeps both values current and lets a user flip
//! the relay, plus a btleplug backend that drives it against real hardware.
//!
//! # Features
//!
//! - **Event-driven driver**: [`PeripheralDriver`] reacts to GATT events and
//!   never blocks
//! - **Poll and notify modes**: periodic reads, optionally with notification
//!   subscriptions on top
//! - **Fault tracking**: per-characteristic fault flags and one aggregate
//!   warning
//! - **Published outputs**: switch state, battery level and warning as
//!   [`tokio::sync::watch`] channels
//! - **Auto-reconnection**: [`LinkSupervisor`] reconnects after a lost link
//! - **Testing**: [`MockGattClient`] drives the state machine without hardware
//!
//! # Quick Start
//!
//! ```no_run
//! use switchmate_core::{DriverOptions, LinkConfig, Session};
//! use switchmate_types::ConnectionState;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = DriverOptions::new("Hallway").notify(true);
//!     let session = Session::start("C4:BE:84:12:34:56", &options, LinkConfig::default())?;
//!
//!     let mut outputs = session.handle().outputs();
//!     outputs.wait_for_connection(ConnectionState::is_established).await?;
//!
//!     session.handle().set_state(true).await?;
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod link;
pub mod mock;
pub mod outputs;
pub mod runtime;
pub mod scan;
pub mod traits;
pub mod util;

pub use switchmate_types::types;

// Core exports
pub use client::BtleplugClient;
pub use config::{DriverOptions, LinkConfig};
pub use driver::{CharacteristicSlot, DriverStatus, PeripheralDriver};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use events::GattEvent;
pub use link::{LinkSupervisor, Session};
pub use mock::{MockGattClient, MockGattClientBuilder, Submission};
pub use outputs::{BatterySensor, DriverOutputs, OutputReceivers, SwitchEntity};
pub use runtime::{Command, CommandQueue, CommandSender, DriverHandle};
pub use scan::{DiscoveredDevice, ScanOptions};
pub use traits::{GattClient, SwitchController};
pub use util::{create_identifier, format_peripheral_id};

// Re-export from switchmate-types
pub use switchmate_types::uuid as uuids;
pub use switchmate_types::{
    CharHandle, Characteristic, ConnectionId, ConnectionState, GattStatus, Reading, WriteMode,
};
