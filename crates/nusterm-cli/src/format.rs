//! Output formatting for scan results.

use anyhow::Result;
use nusterm_core::DiscoveredDevice;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// The columns of a scan result shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSummary<'a> {
    pub name: Option<&'a str>,
    pub address: &'a str,
    pub identifier: &'a str,
    pub rssi: Option<i16>,
    pub nus: bool,
}

impl<'a> From<&'a DiscoveredDevice> for DeviceSummary<'a> {
    fn from(d: &'a DiscoveredDevice) -> Self {
        Self {
            name: d.name.as_deref(),
            address: &d.address,
            identifier: &d.identifier,
            rssi: d.rssi,
            nus: d.advertises_service,
        }
    }
}

pub fn format_scan_json(devices: &[DeviceSummary<'_>], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct ScanResult<'a> {
        count: usize,
        devices: Vec<DeviceJson<'a>>,
    }

    #[derive(Serialize)]
    struct DeviceJson<'a> {
        name: Option<&'a str>,
        address: &'a str,
        identifier: &'a str,
        rssi: Option<i16>,
        nus: bool,
    }

    let result = ScanResult {
        count: devices.len(),
        devices: devices
            .iter()
            .map(|d| DeviceJson {
                name: d.name,
                address: d.address,
                identifier: d.identifier,
                rssi: d.rssi,
                nus: d.nus,
            })
            .collect(),
    };

    opts.to_json(&result)
}

pub fn format_scan_text(devices: &[DeviceSummary<'_>], opts: &FormatOptions) -> String {
    use tabled::{Table, Tabled};

    if devices.is_empty() {
        return "No NUS devices found.\n".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "NUS")]
        nus: &'static str,
        #[tabled(rename = "Signal")]
        signal: String,
        #[tabled(rename = "Identifier")]
        identifier: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| {
            let name = d.name.unwrap_or("Unknown");
            DeviceRow {
                name: if opts.no_color {
                    name.to_string()
                } else {
                    format!("{}", name.cyan())
                },
                nus: if d.nus { "yes" } else { "-" },
                signal: style::format_signal_bar(d.rssi, opts.no_color),
                identifier: d.identifier.to_string(),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    style::apply_table_style(&mut table);
    format!("{}\n", table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: Option<&'static str>, rssi: Option<i16>, nus: bool) -> DeviceSummary<'static> {
        DeviceSummary {
            name,
            address: "01:02:03:04:05:06",
            identifier: "01:02:03:04:05:06",
            rssi,
            nus,
        }
    }

    #[test]
    fn test_scan_text_empty() {
        assert_eq!(
            format_scan_text(&[], &FormatOptions::new(true)),
            "No NUS devices found.\n"
        );
    }

    #[test]
    fn test_scan_text_lists_devices() {
        let devices = [device(Some("Zephyr UART"), Some(-50), true), device(None, None, false)];
        let text = format_scan_text(&devices, &FormatOptions::new(true));
        assert!(text.contains("Zephyr UART"));
        assert!(text.contains("Unknown"));
        assert!(text.contains("01:02:03:04:05:06"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn test_scan_json() {
        let devices = [device(Some("Zephyr UART"), Some(-50), true)];
        let json = format_scan_json(&devices, &FormatOptions::new(true)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["devices"][0]["name"], "Zephyr UART");
        assert_eq!(value["devices"][0]["rssi"], -50);
        assert_eq!(value["devices"][0]["nus"], true);
    }
}
