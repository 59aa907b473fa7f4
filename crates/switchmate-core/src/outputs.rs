//! Values the driver publishes to the presentation layer.
//!
//! Each output is a [`tokio::sync::watch`] channel: the driver is the only
//! writer, any number of consumers can read the latest value or wait for the
//! next change. A value is only republished when it actually changes.
//!
//! [`SwitchEntity`] and [`BatterySensor`] wrap the receivers into the two
//! entities a home-automation front-end expects.

use tokio::sync::watch;

use switchmate_types::ConnectionState;

use crate::error::{Error, Result};
use crate::traits::SwitchController;

/// Writer side of all published values. Owned by the driver.
#[derive(Debug)]
pub struct DriverOutputs {
    state: watch::Sender<Option<bool>>,
    battery: watch::Sender<Option<u8>>,
    warning: watch::Sender<bool>,
    connection: watch::Sender<ConnectionState>,
}

impl Default for DriverOutputs {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverOutputs {
    /// Create outputs with every value unknown, no warning, disconnected.
    pub fn new() -> Self {
        Self {
            state: watch::channel(None).0,
            battery: watch::channel(None).0,
            warning: watch::channel(false).0,
            connection: watch::channel(ConnectionState::Disconnected).0,
        }
    }

    /// Subscribe to every output.
    pub fn subscribe(&self) -> OutputReceivers {
        OutputReceivers {
            state: self.state.subscribe(),
            battery: self.battery.subscribe(),
            warning: self.warning.subscribe(),
            connection: self.connection.subscribe(),
        }
    }

    /// Last published switch state (`None` = unknown).
    pub fn state(&self) -> Option<bool> {
        *self.state.borrow()
    }

    /// Last published battery level (`None` = unknown).
    pub fn battery(&self) -> Option<u8> {
        *self.battery.borrow()
    }

    /// Last published aggregate warning.
    pub fn warning(&self) -> bool {
        *self.warning.borrow()
    }

    pub(crate) fn publish_state(&self, value: Option<bool>) -> bool {
        replace_if_changed(&self.state, value)
    }

    pub(crate) fn publish_battery(&self, value: Option<u8>) -> bool {
        replace_if_changed(&self.battery, value)
    }

    pub(crate) fn publish_warning(&self, value: bool) -> bool {
        replace_if_changed(&self.warning, value)
    }

    pub(crate) fn publish_connection(&self, value: ConnectionState) -> bool {
        replace_if_changed(&self.connection, value)
    }
}

fn replace_if_changed<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}

/// Reader side of all published values.
#[derive(Debug, Clone)]
pub struct OutputReceivers {
    /// Switch state, `None` while unknown.
    pub state: watch::Receiver<Option<bool>>,
    /// Battery percentage, `None` while unknown.
    pub battery: watch::Receiver<Option<u8>>,
    /// Aggregate warning (any characteristic faulted).
    pub warning: watch::Receiver<bool>,
    /// Driver connection state.
    pub connection: watch::Receiver<ConnectionState>,
}

impl OutputReceivers {
    /// Wait until the connection state satisfies `predicate`.
    ///
    /// Returns [`Error::Cancelled`] if the driver is dropped first.
    pub async fn wait_for_connection<F>(&mut self, predicate: F) -> Result<ConnectionState>
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        self.connection
            .wait_for(predicate)
            .await
            .map(|state| *state)
            .map_err(|_| Error::Cancelled)
    }
}

/// A controllable on/off switch backed by a driver.
pub struct SwitchEntity<C: SwitchController> {
    controller: C,
    state: watch::Receiver<Option<bool>>,
}

impl<C: SwitchController> SwitchEntity<C> {
    /// Create a switch that writes through `controller` and mirrors `state`.
    pub fn new(controller: C, state: watch::Receiver<Option<bool>>) -> Self {
        Self { controller, state }
    }

    /// Request a new relay state.
    pub fn write_state(&mut self, on: bool) -> Result<()> {
        self.controller.write_switch_state(on)
    }

    /// Last known state, `None` while unknown.
    pub fn state(&self) -> Option<bool> {
        *self.state.borrow()
    }

    /// Whether the switch is known to be on. Unknown reads as off.
    pub fn is_on(&self) -> bool {
        self.state().unwrap_or(false)
    }

    /// Wait for the next published change.
    pub async fn changed(&mut self) -> Result<Option<bool>> {
        self.state.changed().await.map_err(|_| Error::Cancelled)?;
        Ok(*self.state.borrow_and_update())
    }
}

/// A read-only battery percentage sensor backed by a driver.
#[derive(Debug, Clone)]
pub struct BatterySensor {
    level: watch::Receiver<Option<u8>>,
}

impl BatterySensor {
    /// Create a sensor mirroring `level`.
    pub fn new(level: watch::Receiver<Option<u8>>) -> Self {
        Self { level }
    }

    /// Last known level, `None` while unknown.
    pub fn level(&self) -> Option<u8> {
        *self.level.borrow()
    }

    /// Level as a float, NaN while unknown.
    pub fn value(&self) -> f32 {
        self.level().map_or(f32::NAN, f32::from)
    }

    /// Wait for the next published change.
    pub async fn changed(&mut self) -> Result<Option<u8>> {
        self.level.changed().await.map_err(|_| Error::Cancelled)?;
        Ok(*self.level.borrow_and_update())
    }
}
