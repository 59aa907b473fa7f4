//! Trait abstractions at the driver's seams.
//!
//! [`GattClient`] is what the driver consumes from the BLE stack. It is
//! implemented by the btleplug backend ([`crate::BtleplugClient`]) and by
//! [`crate::MockGattClient`] for tests. [`SwitchController`] is the narrow
//! capability the driver offers to a presentation-layer switch.

use uuid::Uuid;

use switchmate_types::{CharHandle, ConnectionId, WriteMode};

use crate::error::Result;

/// Non-blocking access to a GATT client connection.
///
/// Every `submit_*` method only hands the request to the stack and returns.
/// An `Ok(())` means the request was accepted; its outcome arrives later as a
/// [`crate::GattEvent`]. An `Err` means the request was refused synchronously
/// and no completion event will follow.
///
/// # Example
///
/// ```ignore
/// use switchmate_core::{GattClient, uuids};
///
/// fn read_battery<C: GattClient>(client: &C) -> switchmate_core::Result<()> {
///     if let Some(handle) = client.resolve_characteristic(uuids::BATTERY_SERVICE, uuids::BATTERY_LEVEL) {
///         client.submit_read(handle)?;
///     }
///     Ok(())
/// }
/// ```
pub trait GattClient {
    /// Identifier of the current (or most recent) connection.
    fn connection_id(&self) -> ConnectionId;

    /// Look up a characteristic in the most recent discovery result.
    fn resolve_characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharHandle>;

    /// Request a read of `handle`. Completes with `GattEvent::ReadComplete`.
    fn submit_read(&self, handle: CharHandle) -> Result<()>;

    /// Request a write to `handle`. Completes with `GattEvent::WriteComplete`.
    fn submit_write(&self, handle: CharHandle, value: &[u8], mode: WriteMode) -> Result<()>;

    /// Request notifications for `handle`. Completes with
    /// `GattEvent::SubscribeConfirmed`.
    fn submit_subscribe(&self, handle: CharHandle) -> Result<()>;
}

/// Something that can drive the relay of a switch.
///
/// A presentation-layer switch only needs this one capability, so it is kept
/// apart from the rest of the driver API.
pub trait SwitchController {
    /// Request the relay to be switched on or off.
    fn write_switch_state(&mut self, on: bool) -> Result<()>;
}
