//! Example: Scanning for NUS Devices
//!
//! Lists nearby peripherals that advertise the Nordic UART Service.
//! Pass `--all` to list every BLE device instead.
//!
//! Run with: `cargo run --example scan_devices [-- --all]`

use nusterm_core::scan::{self, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let all = std::env::args().any(|a| a == "--all");
    let mut options = ScanOptions::default().duration_secs(10);
    if all {
        options = options.all_devices();
    }

    println!("Scanning for {}...", if all { "BLE devices" } else { "NUS devices" });
    println!();

    let devices = scan::scan_with_options(options).await?;

    if devices.is_empty() {
        println!("No devices found.");
        println!();
        println!("Make sure:");
        println!("  - The peripheral is powered on and advertising");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The device is within range");
    } else {
        println!("Found {} device(s):", devices.len());
        println!();

        for device in &devices {
            let rssi = device
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "N/A".to_string());

            println!("  {}", device.name.as_deref().unwrap_or("Unknown"));
            println!("    Identifier: {}", device.identifier);
            println!("    RSSI: {}", rssi);
            println!("    Advertises NUS: {}", device.advertises_service);
            println!();
        }
    }

    Ok(())
}
