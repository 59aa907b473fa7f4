//! Mock GATT client for testing.
//!
//! This module provides a [`MockGattClient`] that can be used for unit
//! testing the driver without requiring actual BLE hardware.
//!
//! # Features
//!
//! - **Submission recording**: every accepted read, write and subscribe is
//!   recorded and can be asserted on
//! - **Failure injection**: refuse reads, writes or subscribes synchronously
//! - **Missing characteristics**: simulate a peripheral without one of the
//!   two characteristics
//! - **Simulated peripheral**: with a [`CommandSender`] attached, accepted
//!   requests complete asynchronously like on a real stack
//!
//! # Example
//!
//! ```
//! use switchmate_core::{DriverOptions, GattEvent, MockGattClient, PeripheralDriver};
//! use switchmate_core::GattClient;
//!
//! let client = MockGattClient::new();
//! let mut driver = PeripheralDriver::new(client.clone(), &DriverOptions::default());
//! driver.handle_event(GattEvent::DiscoveryComplete { conn_id: client.connection_id() });
//! assert!(driver.connection_state().is_established());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use switchmate_types::types::parse_state;
use switchmate_types::{CharHandle, Characteristic, ConnectionId, GattStatus, WriteMode};

use crate::error::{Error, Result};
use crate::events::GattEvent;
use crate::runtime::CommandSender;
use crate::traits::GattClient;

const BATTERY_HANDLE: u16 = 0x0010;
const STATE_HANDLE: u16 = 0x0020;

/// A request accepted by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Read(CharHandle),
    Write {
        handle: CharHandle,
        value: Vec<u8>,
        mode: WriteMode,
    },
    Subscribe(CharHandle),
}

#[derive(Debug)]
struct MockState {
    conn_id: ConnectionId,
    has_battery: bool,
    has_state: bool,
    battery_level: u8,
    switch_on: bool,
    fail_reads: bool,
    fail_writes: bool,
    fail_subscribes: bool,
    submissions: Vec<Submission>,
    responder: Option<CommandSender>,
}

/// A scriptable [`GattClient`].
///
/// Clones share state, so a test can keep one clone while the driver owns
/// another.
#[derive(Debug, Clone)]
pub struct MockGattClient {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGattClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGattClient {
    /// A client exposing both characteristics.
    pub fn new() -> Self {
        MockGattClientBuilder::new().build()
    }

    /// Start building a client with custom settings.
    pub fn builder() -> MockGattClientBuilder {
        MockGattClientBuilder::new()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle of the battery characteristic, if present.
    pub fn battery_handle(&self) -> Option<CharHandle> {
        self.handle_of(Characteristic::Battery)
    }

    /// Handle of the state characteristic, if present.
    pub fn state_handle(&self) -> Option<CharHandle> {
        self.handle_of(Characteristic::State)
    }

    fn handle_of(&self, characteristic: Characteristic) -> Option<CharHandle> {
        let state = self.lock();
        match characteristic {
            Characteristic::Battery if state.has_battery => CharHandle::new(BATTERY_HANDLE),
            Characteristic::State if state.has_state => CharHandle::new(STATE_HANDLE),
            _ => None,
        }
    }

    fn characteristic_at(&self, handle: CharHandle) -> Option<Characteristic> {
        Characteristic::ALL
            .into_iter()
            .find(|c| self.handle_of(*c) == Some(handle))
    }

    /// Simulate a firmware without the state characteristic from now on.
    pub fn remove_state(&self) {
        self.lock().has_state = false;
    }

    /// Simulate a firmware without the battery characteristic from now on.
    pub fn remove_battery(&self) {
        self.lock().has_battery = false;
    }

    /// Refuse read submissions.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Refuse write submissions.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Refuse subscribe submissions.
    pub fn fail_subscribes(&self, fail: bool) {
        self.lock().fail_subscribes = fail;
    }

    /// Battery level the simulated peripheral reports.
    pub fn set_battery_level(&self, level: u8) {
        self.lock().battery_level = level;
    }

    /// Relay state of the simulated peripheral.
    pub fn switch_on(&self) -> bool {
        self.lock().switch_on
    }

    /// Flip the relay from the peripheral side, e.g. the physical button.
    pub fn set_switch_on(&self, on: bool) {
        self.lock().switch_on = on;
    }

    /// All accepted submissions, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    /// Handles of accepted reads.
    pub fn reads(&self) -> Vec<CharHandle> {
        self.submissions()
            .into_iter()
            .filter_map(|s| match s {
                Submission::Read(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    /// Payloads of accepted writes.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.submissions()
            .into_iter()
            .filter_map(|s| match s {
                Submission::Write { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Handles of accepted subscriptions.
    pub fn subscribes(&self) -> Vec<CharHandle> {
        self.submissions()
            .into_iter()
            .filter_map(|s| match s {
                Submission::Subscribe(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded submissions.
    pub fn clear_submissions(&self) {
        self.lock().submissions.clear();
    }

    /// Complete accepted requests asynchronously through `sender`.
    pub fn attach_responder(&self, sender: CommandSender) {
        self.lock().responder = Some(sender);
    }

    fn respond(&self, event: GattEvent) {
        let responder = self.lock().responder.clone();
        if let Some(responder) = responder {
            // A closed queue only happens after shutdown.
            let _ = responder.post_event(event);
        }
    }

    /// Simulate a new connection: bumps the connection id and, with a
    /// responder attached, reports connect and discovery completion.
    pub fn connect(&self) -> ConnectionId {
        let conn_id = {
            let mut state = self.lock();
            state.conn_id = state.conn_id.next();
            state.conn_id
        };
        self.respond(GattEvent::ConnectComplete {
            conn_id,
            status: GattStatus::Ok,
        });
        self.respond(GattEvent::DiscoveryComplete { conn_id });
        conn_id
    }

    /// Simulate the link dropping.
    pub fn disconnect(&self) {
        let conn_id = self.connection_id();
        self.respond(GattEvent::Disconnect { conn_id });
    }

    /// Push the current value of `characteristic` as a notification.
    pub fn notify(&self, characteristic: Characteristic) {
        let Some(handle) = self.handle_of(characteristic) else {
            return;
        };
        let conn_id = self.connection_id();
        let value = self.current_value(characteristic);
        self.respond(GattEvent::Notify {
            conn_id,
            handle,
            value,
        });
    }

    fn current_value(&self, characteristic: Characteristic) -> Vec<u8> {
        let state = self.lock();
        match characteristic {
            Characteristic::Battery => vec![state.battery_level],
            Characteristic::State => vec![u8::from(state.switch_on)],
        }
    }
}

impl GattClient for MockGattClient {
    fn connection_id(&self) -> ConnectionId {
        self.lock().conn_id
    }

    fn resolve_characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharHandle> {
        Characteristic::ALL
            .into_iter()
            .find(|c| c.service_uuid() == service && c.characteristic_uuid() == characteristic)
            .and_then(|c| self.handle_of(c))
    }

    fn submit_read(&self, handle: CharHandle) -> Result<()> {
        {
            let mut state = self.lock();
            if state.fail_reads {
                return Err(Error::submit_failed("read", "injected failure"));
            }
            state.submissions.push(Submission::Read(handle));
        }

        let conn_id = self.connection_id();
        let (status, value) = match self.characteristic_at(handle) {
            Some(c) => (GattStatus::Ok, self.current_value(c)),
            None => (GattStatus::AttError(0x01), Vec::new()),
        };
        self.respond(GattEvent::ReadComplete {
            conn_id,
            handle,
            status,
            value,
        });
        Ok(())
    }

    fn submit_write(&self, handle: CharHandle, value: &[u8], mode: WriteMode) -> Result<()> {
        {
            let mut state = self.lock();
            if state.fail_writes {
                return Err(Error::submit_failed("write", "injected failure"));
            }
            state.submissions.push(Submission::Write {
                handle,
                value: value.to_vec(),
                mode,
            });
        }

        let status = match (self.characteristic_at(handle), parse_state(value)) {
            (Some(Characteristic::State), Ok(on)) => {
                self.set_switch_on(on);
                GattStatus::Ok
            }
            _ => GattStatus::AttError(0x03),
        };
        if mode == WriteMode::WithResponse {
            let conn_id = self.connection_id();
            self.respond(GattEvent::WriteComplete {
                conn_id,
                handle,
                status,
            });
        }
        Ok(())
    }

    fn submit_subscribe(&self, handle: CharHandle) -> Result<()> {
        {
            let mut state = self.lock();
            if state.fail_subscribes {
                return Err(Error::submit_failed("subscribe", "injected failure"));
            }
            state.submissions.push(Submission::Subscribe(handle));
        }

        let conn_id = self.connection_id();
        self.respond(GattEvent::SubscribeConfirmed {
            conn_id,
            handle,
            status: GattStatus::Ok,
        });
        Ok(())
    }
}

/// Builder for creating mock clients with custom settings.
#[derive(Debug)]
pub struct MockGattClientBuilder {
    has_battery: bool,
    has_state: bool,
    battery_level: u8,
    switch_on: bool,
}

impl Default for MockGattClientBuilder {
    fn default() -> Self {
        Self {
            has_battery: true,
            has_state: true,
            battery_level: 100,
            switch_on: false,
        }
    }
}

impl MockGattClientBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Omit the battery characteristic.
    #[must_use]
    pub fn without_battery(mut self) -> Self {
        self.has_battery = false;
        self
    }

    /// Omit the state characteristic.
    #[must_use]
    pub fn without_state(mut self) -> Self {
        self.has_state = false;
        self
    }

    /// Initial battery level.
    #[must_use]
    pub fn battery_level(mut self, level: u8) -> Self {
        self.battery_level = level;
        self
    }

    /// Initial relay state.
    #[must_use]
    pub fn switch_on(mut self, on: bool) -> Self {
        self.switch_on = on;
        self
    }

    /// Build the client.
    pub fn build(self) -> MockGattClient {
        MockGattClient {
            state: Arc::new(Mutex::new(MockState {
                conn_id: ConnectionId(1),
                has_battery: self.has_battery,
                has_state: self.has_state,
                battery_level: self.battery_level,
                switch_on: self.switch_on,
                fail_reads: false,
                fail_writes: false,
                fail_subscribes: false,
                submissions: Vec::new(),
                responder: None,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchmate_types::uuids;

    #[test]
    fn test_resolves_both_characteristics() {
        let client = MockGattClient::new();
        assert_eq!(
            client.resolve_characteristic(uuids::BATTERY_SERVICE, uuids::BATTERY_LEVEL),
            client.battery_handle()
        );
        assert_eq!(
            client.resolve_characteristic(uuids::STATE_SERVICE, uuids::STATE),
            client.state_handle()
        );
        assert_eq!(
            client.resolve_characteristic(uuids::STATE_SERVICE, uuids::BATTERY_LEVEL),
            None
        );
    }

    #[test]
    fn test_builder_without_state() {
        let client = MockGattClient::builder().without_state().build();
        assert!(client.battery_handle().is_some());
        assert!(client.state_handle().is_none());
    }

    #[test]
    fn test_injected_failures_are_not_recorded() {
        let client = MockGattClient::new();
        let handle = client.state_handle().unwrap();
        client.fail_writes(true);
        assert!(client.submit_write(handle, &[1], WriteMode::WithResponse).is_err());
        assert!(client.submissions().is_empty());
        assert!(!client.switch_on());
    }

    #[test]
    fn test_write_updates_simulated_relay() {
        let client = MockGattClient::new();
        let handle = client.state_handle().unwrap();
        client.submit_write(handle, &[1], WriteMode::WithResponse).unwrap();
        assert!(client.switch_on());
        assert_eq!(client.writes(), vec![vec![1]]);
    }

    #[test]
    fn test_connect_bumps_connection_id() {
        let client = MockGattClient::new();
        let before = client.connection_id();
        let after = client.connect();
        assert_ne!(before, after);
        assert_eq!(client.connection_id(), after);
    }
}
