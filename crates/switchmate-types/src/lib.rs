//! Platform-agnostic types for Switchmate BLE light switches.
//!
//! This crate provides the protocol constants and value types shared by the
//! driver (switchmate-core) and any front-end.
//!
//! # Features
//!
//! - Service and characteristic UUIDs
//! - Connection lifecycle, handle and status types
//! - State write payloads and value decoding
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use switchmate_types::{Characteristic, Reading};
//!
//! let reading = Reading::decode(Characteristic::Battery, &[0x55]).unwrap();
//! assert_eq!(reading, Reading::Battery(85));
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    CharHandle, Characteristic, ConnectionId, ConnectionState, GattStatus, Reading, WriteMode,
    STATE_OFF, STATE_ON,
};
pub use uuid as uuids;
