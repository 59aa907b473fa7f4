//! Example: Scanning for Switchmate devices
//!
//! Lists every advertising Switchmate in range.
//!
//! Run with: `cargo run --example scan_devices`

use std::time::Duration;

use switchmate_core::scan::{self, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Scanning for Switchmate devices...");
    println!();

    let options = ScanOptions::default().duration(Duration::from_secs(10));
    let devices = scan::scan_with_options(options).await?;

    if devices.is_empty() {
        println!("No Switchmate devices found.");
        println!();
        println!("Make sure:");
        println!("  - The switch has a charged battery");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The switch is not connected to another controller");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    println!();
    for device in &devices {
        let name = device.name.as_deref().unwrap_or("Unknown");
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());

        println!("  {}", name);
        println!("    Identifier: {}", device.identifier);
        println!("    RSSI: {}", rssi);
        println!();
    }

    Ok(())
}
