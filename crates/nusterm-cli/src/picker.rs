//! Device pickers used by the connect sequence.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use async_trait::async_trait;
use dialoguer::{Select, theme::ColorfulTheme};
use nusterm_core::{
    DeviceNotFoundReason, DevicePicker, DiscoveredDevice, Error, MatchPicker, Result,
};
use tracing::{info, warn};

/// One line in a picker list.
pub fn picker_label(device: &DiscoveredDevice) -> String {
    let name = device.name.as_deref().unwrap_or("Unknown");
    match device.rssi {
        Some(rssi) => format!("{}  ({})  {} dBm", name, device.identifier, rssi),
        None => format!("{}  ({})", name, device.identifier),
    }
}

/// Prompts on the controlling terminal with a dialoguer list.
///
/// A lone candidate is taken without asking. Without a terminal the first
/// (strongest) candidate is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPicker;

#[async_trait]
impl DevicePicker for DialoguerPicker {
    async fn pick(&self, mut candidates: Vec<DiscoveredDevice>) -> Result<DiscoveredDevice> {
        if candidates.is_empty() {
            return Err(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange));
        }
        if candidates.len() == 1 || !io::stderr().is_terminal() {
            info!("Picking {} without a prompt", picker_label(&candidates[0]));
            return Ok(candidates.swap_remove(0));
        }

        let items: Vec<String> = candidates.iter().map(picker_label).collect();
        let selection = tokio::task::spawn_blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select a device (Esc to cancel)")
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await;

        match selection {
            Ok(Ok(Some(index))) if index < candidates.len() => Ok(candidates.swap_remove(index)),
            Ok(Ok(_)) => Err(Error::Cancelled),
            Ok(Err(e)) => {
                warn!("Device prompt failed: {}", e);
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!("Device prompt task failed: {}", e);
                Err(Error::Cancelled)
            }
        }
    }
}

/// `MatchPicker` for `--device`, otherwise the given interactive picker.
pub fn picker_for(device: Option<&str>, interactive: Arc<dyn DevicePicker>) -> Arc<dyn DevicePicker> {
    match device {
        Some(needle) => Arc::new(MatchPicker::new(needle)),
        None => interactive,
    }
}
