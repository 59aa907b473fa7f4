//! Output formatting.

use anyhow::Result;
use serde::Serialize;

use switchmate_core::{DiscoveredDevice, DriverStatus};
use switchmate_types::ConnectionState;

/// `on`, `off` or `unknown`.
pub fn state_label(state: Option<bool>) -> &'static str {
    match state {
        Some(true) => "on",
        Some(false) => "off",
        None => "unknown",
    }
}

/// `85%` or `unknown`.
pub fn battery_label(level: Option<u8>) -> String {
    level.map_or_else(|| "unknown".to_string(), |l| format!("{}%", l))
}

pub fn format_status_text(status: &DriverStatus) -> String {
    let mut out = format!(
        "{}: {}, battery {}",
        status.name,
        state_label(status.exposed_state),
        battery_label(status.exposed_battery)
    );
    if status.warning {
        let mut faulted = Vec::new();
        if status.state.fault {
            faulted.push("state");
        }
        if status.battery.fault {
            faulted.push("battery");
        }
        out.push_str(&format!(" [warning: {}]", faulted.join(", ")));
    }
    if status.connection_state != ConnectionState::Established {
        out.push_str(&format!(" ({})", status.connection_state));
    }
    out.push('\n');
    out
}

#[derive(Serialize)]
struct StatusJson<'a> {
    name: &'a str,
    state: Option<bool>,
    battery: Option<u8>,
    warning: bool,
    state_fault: bool,
    battery_fault: bool,
    connection: ConnectionState,
}

pub fn format_status_json(status: &DriverStatus) -> Result<String> {
    let json = StatusJson {
        name: &status.name,
        state: status.exposed_state,
        battery: status.exposed_battery,
        warning: status.warning,
        state_fault: status.state.fault,
        battery_fault: status.battery.fault,
        connection: status.connection_state,
    };
    Ok(serde_json::to_string_pretty(&json)? + "\n")
}

pub fn format_scan_text(devices: &[DiscoveredDevice]) -> String {
    if devices.is_empty() {
        return "No devices found.\n".to_string();
    }

    let mut out = format!("Found {} device(s):\n", devices.len());
    for device in devices {
        let name = device.name.as_deref().unwrap_or("Unknown");
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_switchmate { "*" } else { " " };
        out.push_str(&format!(
            "{} {:<24} {:<40} {}\n",
            marker, name, device.identifier, rssi
        ));
    }
    out
}

pub fn format_scan_json(devices: &[DiscoveredDevice]) -> Result<String> {
    Ok(serde_json::to_string_pretty(devices)? + "\n")
}

/// One published value change, as printed by `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    State(Option<bool>),
    Battery(Option<u8>),
    Warning(bool),
    Connection(ConnectionState),
}

pub fn format_change(name: &str, change: Change) -> String {
    match change {
        Change::State(state) => format!("{}: switch {}", name, state_label(state)),
        Change::Battery(level) => format!("{}: battery {}", name, battery_label(level)),
        Change::Warning(true) => format!("{}: warning raised", name),
        Change::Warning(false) => format!("{}: warning cleared", name),
        Change::Connection(state) => format!("{}: {}", name, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchmate_core::CharacteristicSlot;

    fn status(state: Option<bool>, battery: Option<u8>) -> DriverStatus {
        DriverStatus {
            name: "Hallway".to_string(),
            notify: false,
            connection_state: ConnectionState::Established,
            battery: CharacteristicSlot::default(),
            state: CharacteristicSlot::default(),
            warning: false,
            exposed_state: state,
            exposed_battery: battery,
        }
    }

    #[test]
    fn test_status_text() {
        let text = format_status_text(&status(Some(true), Some(85)));
        assert_eq!(text, "Hallway: on, battery 85%\n");
    }

    #[test]
    fn test_status_text_with_warning() {
        let mut s = status(None, Some(85));
        s.warning = true;
        s.state.fault = true;
        s.connection_state = ConnectionState::Discovering;
        let text = format_status_text(&s);
        assert!(text.contains("unknown"));
        assert!(text.contains("[warning: state]"));
        assert!(text.contains("(discovering)"));
    }

    #[test]
    fn test_status_json() {
        let json = format_status_json(&status(Some(false), None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["state"], false);
        assert!(value["battery"].is_null());
        assert_eq!(value["warning"], false);
    }

    #[test]
    fn test_format_change() {
        assert_eq!(format_change("a", Change::State(Some(true))), "a: switch on");
        assert_eq!(format_change("a", Change::Battery(None)), "a: battery unknown");
        assert_eq!(format_change("a", Change::Warning(true)), "a: warning raised");
    }

    #[test]
    fn test_empty_scan() {
        assert_eq!(format_scan_text(&[]), "No devices found.\n");
    }
}
