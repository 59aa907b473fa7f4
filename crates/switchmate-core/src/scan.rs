//! Device discovery and scanning.
//!
//! This module finds Switchmate devices using Bluetooth Low Energy
//! advertisements.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use switchmate_types::uuids::STATE_SERVICE;

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::util::{create_identifier, format_peripheral_id, matches_identifier};

/// Information about a discovered device.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    /// The advertised name, if any.
    pub name: Option<String>,
    /// The peripheral ID for connecting.
    #[serde(skip)]
    pub id: PeripheralId,
    /// The BLE address as a string (may be zeros on macOS, use `id` instead).
    pub address: String,
    /// A connection identifier (peripheral ID on macOS, address on other platforms).
    pub identifier: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
    /// Whether the advertisement looks like a Switchmate.
    pub is_switchmate: bool,
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
    /// Only return devices that appear to be Switchmates.
    pub filter_switchmate_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            filter_switchmate_only: true,
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Scan for all BLE devices, not just Switchmates.
    #[must_use]
    pub fn all_devices(mut self) -> Self {
        self.filter_switchmate_only = false;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Scan for devices with custom options.
///
/// An empty list means nothing was found, not an error.
///
/// # Errors
///
/// Returns an error if:
/// - No Bluetooth adapter is available
/// - The scan could not be started or stopped
pub async fn scan_with_options(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, options).await
}

/// Scan for devices using a specific adapter.
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!("Starting BLE scan for {:?}...", options.duration);

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let peripherals = adapter.peripherals().await?;
    let mut discovered = Vec::new();

    for peripheral in peripherals {
        match process_peripheral(&peripheral, options.filter_switchmate_only).await {
            Ok(Some(device)) => {
                debug!("Found device: {:?}", device.name);
                discovered.push(device);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Error processing peripheral: {}", e);
            }
        }
    }

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

async fn process_peripheral(
    peripheral: &Peripheral,
    filter_switchmate_only: bool,
) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let is_switchmate = is_switchmate_device(&properties);
    if filter_switchmate_only && !is_switchmate {
        return Ok(None);
    }

    let id = peripheral.id();
    let address = properties.address.to_string();
    let identifier = create_identifier(&address, &id);

    Ok(Some(DiscoveredDevice {
        name: properties.local_name,
        id,
        address,
        identifier,
        rssi: properties.rssi,
        is_switchmate,
    }))
}

/// Whether an advertisement looks like a Switchmate: it advertises the
/// state service or carries "switchmate" in its name.
pub fn is_switchmate_device(properties: &PeripheralProperties) -> bool {
    if properties.services.contains(&STATE_SERVICE)
        || properties.service_data.contains_key(&STATE_SERVICE)
    {
        return true;
    }

    properties
        .local_name
        .as_ref()
        .is_some_and(|name| name.to_lowercase().contains("switchmate"))
}

/// Find a specific device by name, address or peripheral ID on `adapter`.
///
/// Checks peripherals the adapter already knows first, then scans up to
/// three times with growing durations since advertisements are easily missed.
pub async fn find_device_with_adapter(
    adapter: &Adapter,
    identifier: &str,
    scan_duration: Duration,
) -> Result<Peripheral> {
    let identifier_lower = identifier.to_lowercase();

    if let Some(peripheral) = find_peripheral_by_identifier(adapter, &identifier_lower).await? {
        debug!("Found {} in adapter cache", identifier);
        return Ok(peripheral);
    }

    let max_attempts: u32 = 3;
    let base_duration = (scan_duration / 2).max(Duration::from_secs(2));

    for attempt in 1..=max_attempts {
        let duration = base_duration * attempt;
        info!("Scan attempt {}/{} ({:?})...", attempt, max_attempts, duration);

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(duration).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) = find_peripheral_by_identifier(adapter, &identifier_lower).await? {
            info!("Found {} on attempt {}", identifier, attempt);
            return Ok(peripheral);
        }
    }

    warn!("Device not found after {} attempts: {}", max_attempts, identifier);
    Err(Error::device_not_found(identifier))
}

async fn find_peripheral_by_identifier(
    adapter: &Adapter,
    identifier_lower: &str,
) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        if let Ok(Some(props)) = peripheral.properties().await {
            let address = props.address.to_string();
            let peripheral_id = format_peripheral_id(&peripheral.id());
            if matches_identifier(
                identifier_lower,
                &address,
                &peripheral_id,
                props.local_name.as_deref(),
            ) {
                return Ok(Some(peripheral));
            }
        }
    }

    Ok(None)
}
