//! The Switchmate GATT client state machine.
//!
//! [`PeripheralDriver`] turns raw GATT events into validated switch and
//! battery values, and issues GATT operations in response to lifecycle
//! events, poll ticks and state commands. It is synchronous and never
//! blocks: requests are handed to a [`GattClient`] and their outcomes come
//! back later through [`PeripheralDriver::handle_event`].
//!
//! # Fault bookkeeping
//!
//! Each characteristic carries a fault flag reflecting only the most recent
//! operation on it. The aggregate warning is the OR of both flags and is
//! republished whenever either flag may have changed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use switchmate_types::types::state_payload;
use switchmate_types::{
    CharHandle, Characteristic, ConnectionId, ConnectionState, GattStatus, Reading, WriteMode,
};

use crate::config::DriverOptions;
use crate::error::{Error, Result};
use crate::events::GattEvent;
use crate::outputs::{DriverOutputs, OutputReceivers};
use crate::traits::{GattClient, SwitchController};

/// Per-characteristic bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicSlot {
    /// Handle resolved at the most recent discovery, if any.
    pub handle: Option<CharHandle>,
    /// Setup finished (subscription confirmed, or poll-only mode).
    pub ready: bool,
    /// The most recent operation on this characteristic failed.
    pub fault: bool,
}

impl CharacteristicSlot {
    fn reset(&mut self) {
        self.handle = None;
        self.ready = false;
    }
}

/// Serializable snapshot of the whole driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub name: String,
    pub notify: bool,
    pub connection_state: ConnectionState,
    pub battery: CharacteristicSlot,
    pub state: CharacteristicSlot,
    pub warning: bool,
    pub exposed_state: Option<bool>,
    pub exposed_battery: Option<u8>,
}

/// GATT client driver for one Switchmate.
pub struct PeripheralDriver<C: GattClient> {
    name: String,
    notify: bool,
    update_interval: Duration,
    client: C,
    connection_state: ConnectionState,
    battery: CharacteristicSlot,
    state: CharacteristicSlot,
    outputs: DriverOutputs,
}

impl<C: GattClient> std::fmt::Debug for PeripheralDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralDriver")
            .field("name", &self.name)
            .field("notify", &self.notify)
            .field("connection_state", &self.connection_state)
            .field("battery", &self.battery)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<C: GattClient> PeripheralDriver<C> {
    /// Create a driver for one peripheral reached through `client`.
    pub fn new(client: C, options: &DriverOptions) -> Self {
        Self {
            name: options.name.clone(),
            notify: options.notify,
            update_interval: options.update_interval,
            client,
            connection_state: ConnectionState::Disconnected,
            battery: CharacteristicSlot::default(),
            state: CharacteristicSlot::default(),
            outputs: DriverOutputs::new(),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether notify mode is enabled.
    pub fn notify_mode(&self) -> bool {
        self.notify
    }

    /// Interval between poll ticks.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// Bookkeeping for one characteristic.
    pub fn slot(&self, characteristic: Characteristic) -> &CharacteristicSlot {
        match characteristic {
            Characteristic::Battery => &self.battery,
            Characteristic::State => &self.state,
        }
    }

    fn slot_mut(&mut self, characteristic: Characteristic) -> &mut CharacteristicSlot {
        match characteristic {
            Characteristic::Battery => &mut self.battery,
            Characteristic::State => &mut self.state,
        }
    }

    /// Whether any characteristic is faulted.
    pub fn warning(&self) -> bool {
        self.battery.fault || self.state.fault
    }

    /// Last published switch state (`None` = unknown).
    pub fn exposed_state(&self) -> Option<bool> {
        self.outputs.state()
    }

    /// Last published battery level (`None` = unknown).
    pub fn exposed_battery(&self) -> Option<u8> {
        self.outputs.battery()
    }

    /// Subscribe to the published values.
    pub fn subscribe(&self) -> OutputReceivers {
        self.outputs.subscribe()
    }

    /// The GATT client this driver submits requests to.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Snapshot of the driver state.
    pub fn status(&self) -> DriverStatus {
        DriverStatus {
            name: self.name.clone(),
            notify: self.notify,
            connection_state: self.connection_state,
            battery: self.battery,
            state: self.state,
            warning: self.warning(),
            exposed_state: self.exposed_state(),
            exposed_battery: self.exposed_battery(),
        }
    }

    /// Record a lifecycle transition reported by the BLE stack.
    ///
    /// `Established` can only be reached through discovery and subscription,
    /// so a request for it is ignored.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if state == ConnectionState::Established {
            warn!(device = %self.name, "Ignoring external request to mark link established");
            return;
        }
        self.transition(state);
    }

    fn transition(&mut self, state: ConnectionState) {
        if self.connection_state != state {
            debug!(device = %self.name, from = %self.connection_state, to = %state, "Connection state changed");
            self.connection_state = state;
        }
        self.outputs.publish_connection(state);
    }

    // --- Event Correlator ---

    /// Process one asynchronous event from the BLE stack.
    pub fn handle_event(&mut self, event: GattEvent) {
        trace!(device = %self.name, kind = event.kind(), conn_id = %event.conn_id(), "GATT event");
        match event {
            GattEvent::ConnectComplete { status, .. } => self.on_connect_complete(status),
            GattEvent::Disconnect { .. } => self.on_disconnect(),
            GattEvent::DiscoveryComplete { .. } => self.on_discovery_complete(),
            GattEvent::ReadComplete {
                conn_id,
                handle,
                status,
                value,
            } => self.on_read_complete(conn_id, handle, status, &value),
            GattEvent::WriteComplete {
                conn_id,
                handle,
                status,
            } => self.on_write_complete(conn_id, handle, status),
            GattEvent::Notify {
                conn_id,
                handle,
                value,
            } => self.on_notify(conn_id, handle, &value),
            GattEvent::SubscribeConfirmed {
                conn_id,
                handle,
                status,
            } => self.on_subscribe_confirmed(conn_id, handle, status),
        }
        self.refresh_warning();
    }

    fn is_current(&self, conn_id: ConnectionId) -> bool {
        let current = self.client.connection_id();
        if conn_id != current {
            debug!(device = %self.name, %conn_id, %current, "Ignoring event for stale connection");
            return false;
        }
        true
    }

    /// Characteristics currently resolved to `handle`.
    fn characteristics_for(&self, handle: CharHandle) -> impl Iterator<Item = Characteristic> + '_ {
        Characteristic::ALL
            .into_iter()
            .filter(move |c| self.slot(*c).handle == Some(handle))
    }

    fn on_connect_complete(&mut self, status: GattStatus) {
        if status.is_ok() {
            info!(device = %self.name, "Connected successfully");
        } else {
            warn!(device = %self.name, %status, "Connection attempt failed");
        }
    }

    // --- Connection Lifecycle Tracker ---

    fn on_disconnect(&mut self) {
        warn!(device = %self.name, "Disconnected");

        for characteristic in Characteristic::ALL {
            let slot = self.slot_mut(characteristic);
            slot.reset();
            slot.fault = true;
            self.publish_unknown(characteristic);
        }
        self.transition(ConnectionState::Disconnected);
    }

    // --- Discovery Handler ---

    fn on_discovery_complete(&mut self) {
        self.transition(ConnectionState::Discovering);

        for characteristic in Characteristic::ALL {
            self.discover(characteristic);
        }

        self.try_establish();
        self.refresh_warning();
    }

    fn discover(&mut self, characteristic: Characteristic) {
        self.slot_mut(characteristic).reset();

        let service_uuid = characteristic.service_uuid();
        let char_uuid = characteristic.characteristic_uuid();
        let Some(handle) = self.client.resolve_characteristic(service_uuid, char_uuid) else {
            self.slot_mut(characteristic).fault = true;
            self.publish_unknown(characteristic);
            warn!(
                device = %self.name,
                "{} characteristic not found at service {} char {}",
                characteristic, service_uuid, char_uuid
            );
            return;
        };

        debug!(device = %self.name, %handle, "Resolved {} characteristic", characteristic);
        self.slot_mut(characteristic).handle = Some(handle);

        if self.notify {
            if let Err(e) = self.client.submit_subscribe(handle) {
                warn!(device = %self.name, error = %e, "Subscribe failed for {}", characteristic);
            }
        } else {
            self.slot_mut(characteristic).ready = true;
        }
    }

    fn try_establish(&mut self) {
        let ready = self.battery.ready
            && self.state.ready
            && self.battery.handle.is_some()
            && self.state.handle.is_some();
        if ready && self.connection_state != ConnectionState::Established {
            info!(device = %self.name, notify = self.notify, "Link established");
            self.transition(ConnectionState::Established);
        }
    }

    // --- Poll Driver ---

    /// Periodic poll: request a fresh read of both characteristics.
    ///
    /// Reads are issued even in notify mode since notifications can be lost.
    pub fn update(&mut self) {
        if !self.connection_state.is_established() {
            warn!(device = %self.name, state = %self.connection_state, "Cannot poll, not connected");
            return;
        }

        for characteristic in Characteristic::ALL {
            self.poll(characteristic);
        }

        self.refresh_warning();
    }

    fn poll(&mut self, characteristic: Characteristic) {
        let Some(handle) = self.slot(characteristic).handle else {
            warn!(device = %self.name, "Cannot poll {}, characteristic not found", characteristic);
            return;
        };

        if let Err(e) = self.client.submit_read(handle) {
            self.slot_mut(characteristic).fault = true;
            self.publish_unknown(characteristic);
            warn!(device = %self.name, error = %e, "Error sending read request for {}", characteristic);
        }
    }

    // --- Write Path ---

    /// Request the relay to be switched on or off.
    ///
    /// The exposed switch value is left unchanged; it follows the peripheral
    /// once the write is confirmed and the value re-read.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] when the link is not established
    /// - [`Error::CharacteristicNotFound`] when the state handle is absent
    /// - whatever the client returns when it refuses the write
    pub fn set_state(&mut self, on: bool) -> Result<()> {
        if !self.connection_state.is_established() {
            warn!(device = %self.name, "Cannot write state, not connected");
            return Err(Error::NotConnected);
        }
        let Some(handle) = self.state.handle else {
            warn!(device = %self.name, "Cannot write state, service or characteristic not found");
            return Err(Error::characteristic_not_found(
                Characteristic::State.characteristic_uuid().to_string(),
                0,
            ));
        };

        match self
            .client
            .submit_write(handle, &state_payload(on), WriteMode::WithResponse)
        {
            Ok(()) => {
                debug!(device = %self.name, on, "Requested state write");
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.name, error = %e, "Error writing state");
                Err(e)
            }
        }
    }

    // --- Completions ---

    fn on_read_complete(
        &mut self,
        conn_id: ConnectionId,
        handle: CharHandle,
        status: GattStatus,
        value: &[u8],
    ) {
        if !self.is_current(conn_id) {
            return;
        }
        if !status.is_ok() {
            warn!(device = %self.name, %handle, %status, "Error reading characteristic");
            return;
        }

        let matched: Vec<_> = self.characteristics_for(handle).collect();
        if matched.is_empty() {
            debug!(device = %self.name, %handle, "Read completed for unknown handle");
        }
        for characteristic in matched {
            self.accept_value(characteristic, value);
        }
        self.refresh_warning();
    }

    fn on_write_complete(&mut self, conn_id: ConnectionId, handle: CharHandle, status: GattStatus) {
        if !self.is_current(conn_id) || self.state.handle != Some(handle) {
            return;
        }
        if !status.is_ok() {
            warn!(device = %self.name, %handle, %status, "Error writing characteristic");
            return;
        }

        debug!(device = %self.name, "Successfully wrote state");
        self.state.fault = false;
        self.refresh_warning();

        self.update();
    }

    fn on_notify(&mut self, conn_id: ConnectionId, handle: CharHandle, value: &[u8]) {
        if !self.is_current(conn_id) {
            return;
        }

        let matched: Vec<_> = self.characteristics_for(handle).collect();
        for characteristic in matched {
            trace!(device = %self.name, %handle, ?value, "{} notification", characteristic);
            self.accept_value(characteristic, value);
        }
        self.refresh_warning();
    }

    fn on_subscribe_confirmed(
        &mut self,
        conn_id: ConnectionId,
        handle: CharHandle,
        status: GattStatus,
    ) {
        if !self.is_current(conn_id) {
            return;
        }
        if !status.is_ok() {
            warn!(device = %self.name, %handle, %status, "Subscription was not confirmed");
            return;
        }

        let matched: Vec<_> = self.characteristics_for(handle).collect();
        for characteristic in matched {
            debug!(device = %self.name, "Subscribed to {}", characteristic);
            self.slot_mut(characteristic).ready = true;
        }
        self.try_establish();
    }

    // --- Publishing ---

    fn accept_value(&mut self, characteristic: Characteristic, value: &[u8]) {
        match Reading::decode(characteristic, value) {
            Ok(reading) => {
                self.slot_mut(characteristic).fault = false;
                self.publish_reading(reading);
            }
            Err(e) => {
                warn!(device = %self.name, error = %e, "Discarding {} value", characteristic);
            }
        }
    }

    fn publish_reading(&self, reading: Reading) {
        match reading {
            Reading::Battery(level) => {
                if level > 100 {
                    debug!(device = %self.name, level, "Battery level above 100%");
                }
                self.outputs.publish_battery(Some(level));
            }
            Reading::State(on) => {
                self.outputs.publish_state(Some(on));
            }
        }
    }

    fn publish_unknown(&self, characteristic: Characteristic) {
        match characteristic {
            Characteristic::Battery => self.outputs.publish_battery(None),
            Characteristic::State => self.outputs.publish_state(None),
        };
    }

    fn refresh_warning(&self) {
        let warning = self.warning();
        if self.outputs.publish_warning(warning) {
            if warning {
                warn!(
                    device = %self.name,
                    battery_fault = self.battery.fault,
                    state_fault = self.state.fault,
                    "Warning raised"
                );
            } else {
                info!(device = %self.name, "Warning cleared");
            }
        }
    }
}

impl<C: GattClient> SwitchController for PeripheralDriver<C> {
    fn write_switch_state(&mut self, on: bool) -> Result<()> {
        self.set_state(on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGattClient, Submission};

    fn driver(client: &MockGattClient, notify: bool) -> PeripheralDriver<MockGattClient> {
        let options = DriverOptions::new("test").notify(notify);
        PeripheralDriver::new(client.clone(), &options)
    }

    fn discovered(client: &MockGattClient, notify: bool) -> PeripheralDriver<MockGattClient> {
        let mut driver = driver(client, notify);
        driver.handle_event(GattEvent::DiscoveryComplete {
            conn_id: client.connection_id(),
        });
        driver
    }

    fn established(client: &MockGattClient) -> PeripheralDriver<MockGattClient> {
        let driver = discovered(client, false);
        assert_eq!(driver.connection_state(), ConnectionState::Established);
        client.clear_submissions();
        driver
    }

    fn read_ok(client: &MockGattClient, handle: CharHandle, value: &[u8]) -> GattEvent {
        GattEvent::ReadComplete {
            conn_id: client.connection_id(),
            handle,
            status: GattStatus::Ok,
            value: value.to_vec(),
        }
    }

    // --- Discovery ---

    #[test]
    fn test_discovery_poll_mode_establishes_immediately() {
        let client = MockGattClient::new();
        let driver = discovered(&client, false);

        assert_eq!(driver.connection_state(), ConnectionState::Established);
        assert_eq!(driver.slot(Characteristic::Battery).handle, client.battery_handle());
        assert_eq!(driver.slot(Characteristic::State).handle, client.state_handle());
        assert!(driver.slot(Characteristic::Battery).ready);
        assert!(client.submissions().is_empty());
        assert!(!driver.warning());
    }

    #[test]
    fn test_discovery_notify_mode_waits_for_subscriptions() {
        let client = MockGattClient::new();
        let mut driver = discovered(&client, true);

        assert_eq!(driver.connection_state(), ConnectionState::Discovering);
        assert_eq!(client.subscribes().len(), 2);

        let conn_id = client.connection_id();
        driver.handle_event(GattEvent::SubscribeConfirmed {
            conn_id,
            handle: client.battery_handle().unwrap(),
            status: GattStatus::Ok,
        });
        assert_eq!(driver.connection_state(), ConnectionState::Discovering);

        driver.handle_event(GattEvent::SubscribeConfirmed {
            conn_id,
            handle: client.state_handle().unwrap(),
            status: GattStatus::Ok,
        });
        assert_eq!(driver.connection_state(), ConnectionState::Established);
    }

    #[test]
    fn test_discovery_missing_state_characteristic() {
        let client = MockGattClient::builder().without_state().build();
        let driver = discovered(&client, false);

        assert!(driver.slot(Characteristic::State).fault);
        assert_eq!(driver.slot(Characteristic::State).handle, None);
        assert_eq!(driver.exposed_state(), None);
        assert!(!driver.slot(Characteristic::Battery).fault);
        assert!(driver.slot(Characteristic::Battery).ready);
        assert_ne!(driver.connection_state(), ConnectionState::Established);
        assert!(driver.warning());
        assert!(*driver.subscribe().warning.borrow());
    }

    #[test]
    fn test_discovery_missing_battery_does_not_block_state_subscription() {
        let client = MockGattClient::builder().without_battery().build();
        let _driver = discovered(&client, true);

        assert_eq!(
            client.subscribes(),
            vec![client.state_handle().unwrap()]
        );
    }

    #[test]
    fn test_subscribe_submission_failure_does_not_set_fault() {
        let client = MockGattClient::new();
        client.fail_subscribes(true);
        let driver = discovered(&client, true);

        assert!(!driver.slot(Characteristic::Battery).fault);
        assert!(!driver.slot(Characteristic::State).fault);
        assert!(!driver.slot(Characteristic::State).ready);
        assert_eq!(driver.connection_state(), ConnectionState::Discovering);
    }

    #[test]
    fn test_rediscovery_resets_ready_flags() {
        let client = MockGattClient::new();
        let mut driver = discovered(&client, false);
        assert_eq!(driver.connection_state(), ConnectionState::Established);

        client.remove_state();
        driver.handle_event(GattEvent::DiscoveryComplete {
            conn_id: client.connection_id(),
        });
        assert!(!driver.slot(Characteristic::State).ready);
        assert_ne!(driver.connection_state(), ConnectionState::Established);
    }

    #[test]
    fn test_failed_subscription_confirmation_keeps_not_ready() {
        let client = MockGattClient::new();
        let mut driver = discovered(&client, true);
        driver.handle_event(GattEvent::SubscribeConfirmed {
            conn_id: client.connection_id(),
            handle: client.state_handle().unwrap(),
            status: GattStatus::AttError(0x05),
        });
        assert!(!driver.slot(Characteristic::State).ready);
    }

    // --- Lifecycle ---

    #[test]
    fn test_disconnect_marks_everything_unknown() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.handle_event(read_ok(&client, client.battery_handle().unwrap(), &[0x55]));
        driver.handle_event(read_ok(&client, client.state_handle().unwrap(), &[0x01]));
        assert_eq!(driver.exposed_battery(), Some(85));
        assert_eq!(driver.exposed_state(), Some(true));

        driver.handle_event(GattEvent::Disconnect {
            conn_id: client.connection_id(),
        });

        assert!(driver.slot(Characteristic::Battery).fault);
        assert!(driver.slot(Characteristic::State).fault);
        assert_eq!(driver.exposed_battery(), None);
        assert_eq!(driver.exposed_state(), None);
        assert_eq!(driver.slot(Characteristic::State).handle, None);
        assert_eq!(driver.connection_state(), ConnectionState::Disconnected);
        assert!(driver.warning());
    }

    #[test]
    fn test_connect_complete_changes_nothing() {
        let client = MockGattClient::new();
        let mut d = driver(&client, false);
        let before = d.status();
        d.handle_event(GattEvent::ConnectComplete {
            conn_id: client.connection_id(),
            status: GattStatus::Ok,
        });
        assert_eq!(d.status(), before);
    }

    #[test]
    fn test_external_cannot_force_established() {
        let client = MockGattClient::new();
        let mut d = driver(&client, false);
        d.set_connection_state(ConnectionState::Connecting);
        assert_eq!(d.connection_state(), ConnectionState::Connecting);
        d.set_connection_state(ConnectionState::Established);
        assert_eq!(d.connection_state(), ConnectionState::Connecting);
    }

    // --- Poll ---

    #[test]
    fn test_poll_skipped_when_not_established() {
        let client = MockGattClient::new();
        let mut d = driver(&client, false);
        d.update();
        assert!(client.submissions().is_empty());
    }

    #[test]
    fn test_poll_reads_both_characteristics() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.update();
        assert_eq!(
            client.reads(),
            vec![client.battery_handle().unwrap(), client.state_handle().unwrap()]
        );
    }

    #[test]
    fn test_poll_reads_in_notify_mode_too() {
        let client = MockGattClient::new();
        let mut driver = discovered(&client, true);
        for handle in [client.battery_handle(), client.state_handle()] {
            driver.handle_event(GattEvent::SubscribeConfirmed {
                conn_id: client.connection_id(),
                handle: handle.unwrap(),
                status: GattStatus::Ok,
            });
        }
        client.clear_submissions();
        driver.update();
        assert_eq!(client.reads().len(), 2);
    }

    #[test]
    fn test_poll_read_submission_failure_sets_fault() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.handle_event(read_ok(&client, client.battery_handle().unwrap(), &[50]));
        assert_eq!(driver.exposed_battery(), Some(50));

        client.fail_reads(true);
        driver.update();

        assert!(driver.slot(Characteristic::Battery).fault);
        assert!(driver.slot(Characteristic::State).fault);
        assert_eq!(driver.exposed_battery(), None);
        assert!(driver.warning());
    }

    // --- Write path ---

    #[test]
    fn test_set_state_rejected_when_not_connected() {
        let client = MockGattClient::new();
        let mut d = driver(&client, false);
        assert!(matches!(d.set_state(true), Err(Error::NotConnected)));
        assert!(client.writes().is_empty());
    }

    #[test]
    fn test_set_state_writes_single_byte() {
        let client = MockGattClient::new();
        let mut driver = established(&client);

        driver.set_state(true).unwrap();
        driver.set_state(false).unwrap();

        let handle = client.state_handle().unwrap();
        assert_eq!(
            client.submissions(),
            vec![
                Submission::Write {
                    handle,
                    value: vec![0x01],
                    mode: WriteMode::WithResponse
                },
                Submission::Write {
                    handle,
                    value: vec![0x00],
                    mode: WriteMode::WithResponse
                },
            ]
        );
        assert_eq!(driver.exposed_state(), None);
    }

    #[test]
    fn test_set_state_submission_failure_leaves_state_unchanged() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.handle_event(read_ok(&client, client.state_handle().unwrap(), &[0x00]));

        client.fail_writes(true);
        assert!(driver.set_state(true).is_err());
        assert_eq!(driver.exposed_state(), Some(false));
        assert!(!driver.slot(Characteristic::State).fault);
    }

    #[test]
    fn test_write_complete_triggers_single_repoll() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.set_state(true).unwrap();
        client.clear_submissions();

        driver.handle_event(GattEvent::WriteComplete {
            conn_id: client.connection_id(),
            handle: client.state_handle().unwrap(),
            status: GattStatus::Ok,
        });

        assert_eq!(
            client.reads(),
            vec![client.battery_handle().unwrap(), client.state_handle().unwrap()]
        );
        assert_eq!(client.submissions().len(), 2);
    }

    #[test]
    fn test_write_complete_clears_state_fault() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        client.fail_reads(true);
        driver.update();
        assert!(driver.slot(Characteristic::State).fault);

        client.fail_reads(false);
        driver.handle_event(GattEvent::WriteComplete {
            conn_id: client.connection_id(),
            handle: client.state_handle().unwrap(),
            status: GattStatus::Ok,
        });

        assert!(!driver.slot(Characteristic::State).fault);
        assert!(driver.slot(Characteristic::Battery).fault);
        assert!(driver.warning());
    }

    #[test]
    fn test_write_complete_failure_only_logs() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.handle_event(GattEvent::WriteComplete {
            conn_id: client.connection_id(),
            handle: client.state_handle().unwrap(),
            status: GattStatus::AttError(0x03),
        });
        assert!(client.submissions().is_empty());
    }

    #[test]
    fn test_write_complete_for_other_handle_is_ignored() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.handle_event(GattEvent::WriteComplete {
            conn_id: client.connection_id(),
            handle: client.battery_handle().unwrap(),
            status: GattStatus::Ok,
        });
        assert!(client.submissions().is_empty());
    }

    // --- Values ---

    #[test]
    fn test_read_values_are_published() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        let battery = client.battery_handle().unwrap();
        let state = client.state_handle().unwrap();

        driver.handle_event(read_ok(&client, battery, &[0x55]));
        assert_eq!(driver.exposed_battery(), Some(85));

        driver.handle_event(read_ok(&client, state, &[0x00]));
        assert_eq!(driver.exposed_state(), Some(false));

        driver.handle_event(read_ok(&client, state, &[0x01]));
        assert_eq!(driver.exposed_state(), Some(true));
    }

    #[test]
    fn test_failed_read_does_not_clear_fault() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        client.fail_reads(true);
        driver.update();
        assert!(driver.slot(Characteristic::Battery).fault);

        client.fail_reads(false);
        driver.handle_event(GattEvent::ReadComplete {
            conn_id: client.connection_id(),
            handle: client.battery_handle().unwrap(),
            status: GattStatus::Timeout,
            value: vec![0x55],
        });
        assert!(driver.slot(Characteristic::Battery).fault);
        assert_eq!(driver.exposed_battery(), None);
        assert!(driver.warning());
    }

    #[test]
    fn test_empty_read_value_is_discarded() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        client.fail_reads(true);
        driver.update();
        assert!(driver.slot(Characteristic::Battery).fault);

        driver.handle_event(read_ok(&client, client.battery_handle().unwrap(), &[]));
        assert!(driver.slot(Characteristic::Battery).fault);
    }

    #[test]
    fn test_stale_connection_events_are_ignored() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.handle_event(GattEvent::Notify {
            conn_id: ConnectionId(client.connection_id().0 + 1),
            handle: client.battery_handle().unwrap(),
            value: vec![10],
        });
        assert_eq!(driver.exposed_battery(), None);
    }

    #[test]
    fn test_notify_clears_fault_and_publishes() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        client.fail_reads(true);
        driver.update();
        assert!(driver.warning());

        let conn_id = client.connection_id();
        driver.handle_event(GattEvent::Notify {
            conn_id,
            handle: client.battery_handle().unwrap(),
            value: vec![0x55],
        });
        assert!(!driver.slot(Characteristic::Battery).fault);
        assert_eq!(driver.exposed_battery(), Some(85));
        assert!(driver.warning());

        driver.handle_event(GattEvent::Notify {
            conn_id,
            handle: client.state_handle().unwrap(),
            value: vec![0x01],
        });
        assert_eq!(driver.exposed_state(), Some(true));
        assert!(!driver.warning());
    }

    // --- Warning ---

    #[test]
    fn test_warning_follows_fault_flags() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        let warning = driver.subscribe().warning;

        driver.battery.fault = true;
        driver.refresh_warning();
        assert!(*warning.borrow());

        driver.handle_event(read_ok(&client, client.battery_handle().unwrap(), &[90]));
        assert!(!*warning.borrow());
    }

    #[test]
    fn test_switch_controller_delegates_to_set_state() {
        let client = MockGattClient::new();
        let mut driver = established(&client);
        driver.write_switch_state(true).unwrap();
        assert_eq!(client.writes().len(), 1);
    }
}
