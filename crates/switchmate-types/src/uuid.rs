//! Bluetooth UUIDs for Switchmate devices.
//!
//! This module contains the service and characteristic UUIDs needed to
//! drive a Switchmate over Bluetooth Low Energy. They are protocol constants
//! and must match the peripheral bit-for-bit.

use uuid::{Uuid, uuid};

// --- Standard BLE Service UUIDs ---

/// Battery service (16-bit `0x180F`).
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

// --- Battery Characteristic UUIDs ---

/// Battery level characteristic (16-bit `0x2A19`).
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

// --- Switchmate Service UUIDs ---

/// Switchmate vendor service carrying the relay state.
pub const STATE_SERVICE: Uuid = uuid!("a22bd383-ebdd-49ac-b2e7-40eb55f5d0ab");

// --- Switchmate Characteristic UUIDs ---

/// Relay state characteristic (read / write / notify, one byte).
pub const STATE: Uuid = uuid!("a22b0090-ebdd-49ac-b2e7-40eb55f5d0ab");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_service_uuid() {
        assert_eq!(
            BATTERY_SERVICE.to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_battery_level_uuid() {
        assert_eq!(
            BATTERY_LEVEL.to_string(),
            "00002a19-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_state_service_uuid() {
        assert_eq!(
            STATE_SERVICE.to_string(),
            "a22bd383-ebdd-49ac-b2e7-40eb55f5d0ab"
        );
    }

    #[test]
    fn test_state_uuid() {
        assert_eq!(STATE.to_string(), "a22b0090-ebdd-49ac-b2e7-40eb55f5d0ab");
    }

    #[test]
    fn test_state_uuids_match_little_endian_wire_layout() {
        // The peripheral advertises these in little-endian byte order.
        let service_le: [u8; 16] = [
            0xAB, 0xD0, 0xF5, 0x55, 0xEB, 0x40, 0xE7, 0xB2, 0xAC, 0x49, 0xDD, 0xEB, 0x83, 0xD3,
            0x2B, 0xA2,
        ];
        let state_le: [u8; 16] = [
            0xAB, 0xD0, 0xF5, 0x55, 0xEB, 0x40, 0xE7, 0xB2, 0xAC, 0x49, 0xDD, 0xEB, 0x90, 0x00,
            0x2B, 0xA2,
        ];
        assert_eq!(Uuid::from_bytes_le(service_le), STATE_SERVICE);
        assert_eq!(Uuid::from_bytes_le(state_le), STATE);
    }

    #[test]
    fn test_uuids_are_distinct() {
        assert_ne!(BATTERY_SERVICE, STATE_SERVICE);
        assert_ne!(BATTERY_LEVEL, STATE);
    }
}
