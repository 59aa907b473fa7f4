//! Core types for the Switchmate GATT protocol.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Payload written to the state characteristic to switch the relay off.
pub const STATE_OFF: [u8; 1] = [0x00];

/// Payload written to the state characteristic to switch the relay on.
pub const STATE_ON: [u8; 1] = [0x01];

/// Connection lifecycle of a driven peripheral.
///
/// `Established` is only ever entered by the driver itself, once both
/// characteristics have completed their setup path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionState {
    /// No link to the peripheral.
    #[default]
    Disconnected,
    /// The BLE stack is establishing a link.
    Connecting,
    /// Link is up, services and characteristics are being resolved.
    Discovering,
    /// Both characteristics are resolved and ready.
    Established,
}

impl ConnectionState {
    /// Whether GATT operations may be issued in this state.
    #[must_use]
    pub fn is_established(&self) -> bool {
        matches!(self, ConnectionState::Established)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Discovering => "discovering",
            ConnectionState::Established => "established",
        };
        f.write_str(s)
    }
}

/// Opaque reference to a resolved characteristic.
///
/// A raw value of 0 means "not found" on most stacks, so it can never be
/// wrapped in a `CharHandle`; absence is expressed as `Option<CharHandle>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharHandle(u16);

impl CharHandle {
    /// Wrap a raw attribute handle. Returns `None` for the reserved value 0.
    ///
    /// ```
    /// use switchmate_types::CharHandle;
    ///
    /// assert!(CharHandle::new(0).is_none());
    /// assert_eq!(CharHandle::new(0x2a).map(|h| h.raw()), Some(0x2a));
    /// ```
    #[must_use]
    pub const fn new(raw: u16) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// The raw attribute handle.
    #[must_use]
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for CharHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Identifier of one physical connection.
///
/// Every asynchronous event carries the id of the connection it belongs to so
/// completions from a previous link can be told apart from current ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// The id following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Completion status reported by the BLE stack for an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum GattStatus {
    /// Operation completed successfully.
    Ok,
    /// Peripheral answered with an ATT error code.
    AttError(u8),
    /// The stack gave up waiting for the peripheral.
    Timeout,
    /// Any other stack-level failure.
    Failed,
}

impl GattStatus {
    /// Whether the operation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, GattStatus::Ok)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GattStatus::Ok => f.write_str("ok"),
            GattStatus::AttError(code) => write!(f, "att error 0x{:02x}", code),
            GattStatus::Timeout => f.write_str("timeout"),
            GattStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Write semantics requested for a characteristic write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WriteMode {
    /// Write request, acknowledged by the peripheral.
    #[default]
    WithResponse,
    /// Write command, not acknowledged.
    WithoutResponse,
}

/// The two characteristics a Switchmate driver works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Characteristic {
    /// Standard battery level (percent).
    Battery,
    /// Vendor relay state (on/off).
    State,
}

impl Characteristic {
    /// Both characteristics, in discovery order.
    pub const ALL: [Characteristic; 2] = [Characteristic::Battery, Characteristic::State];

    /// UUID of the service hosting this characteristic.
    #[must_use]
    pub fn service_uuid(&self) -> uuid::Uuid {
        match self {
            Characteristic::Battery => crate::uuid::BATTERY_SERVICE,
            Characteristic::State => crate::uuid::STATE_SERVICE,
        }
    }

    /// UUID of the characteristic itself.
    #[must_use]
    pub fn characteristic_uuid(&self) -> uuid::Uuid {
        match self {
            Characteristic::Battery => crate::uuid::BATTERY_LEVEL,
            Characteristic::State => crate::uuid::STATE,
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Characteristic::Battery => f.write_str("battery level"),
            Characteristic::State => f.write_str("state"),
        }
    }
}

/// Encode a relay state as the one-byte write payload.
///
/// ```
/// use switchmate_types::types::{state_payload, STATE_ON};
///
/// assert_eq!(state_payload(true), STATE_ON);
/// ```
#[must_use]
pub fn state_payload(on: bool) -> [u8; 1] {
    if on { STATE_ON } else { STATE_OFF }
}

/// Decode a state characteristic value. Any non-zero first byte means on.
pub fn parse_state(value: &[u8]) -> ParseResult<bool> {
    value
        .first()
        .map(|b| *b != 0)
        .ok_or(ParseError::Empty)
}

/// Decode a battery level characteristic value (raw percentage byte).
pub fn parse_battery(value: &[u8]) -> ParseResult<u8> {
    value.first().copied().ok_or(ParseError::Empty)
}

/// A decoded value for one of the two characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value", rename_all = "snake_case"))]
pub enum Reading {
    /// Battery level in percent.
    Battery(u8),
    /// Relay state.
    State(bool),
}

impl Reading {
    /// Decode a raw value read from or notified by `characteristic`.
    pub fn decode(characteristic: Characteristic, value: &[u8]) -> ParseResult<Self> {
        match characteristic {
            Characteristic::Battery => parse_battery(value).map(Reading::Battery),
            Characteristic::State => parse_state(value).map(Reading::State),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Decoding arbitrary bytes never panics and only fails on empty input.
        #[test]
        fn decode_never_panics(data: Vec<u8>) {
            for characteristic in Characteristic::ALL {
                let result = Reading::decode(characteristic, &data);
                prop_assert_eq!(result.is_err(), data.is_empty());
            }
        }

        /// The state payload always decodes back to the same state.
        #[test]
        fn state_payload_decodes(on: bool) {
            prop_assert_eq!(parse_state(&state_payload(on)).unwrap(), on);
        }
    }
}
