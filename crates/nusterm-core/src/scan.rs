//! Device discovery and the device request.
//!
//! [`BleTransport`] is the btleplug implementation of [`Transport`]: it scans,
//! hands the candidates to a [`DevicePicker`], and wraps the chosen
//! peripheral in a [`BleDevice`].

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nusterm_types::uuids::NUS_SERVICE;

use crate::device::{BleDevice, ConnectionConfig};
use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::traits::{RemoteDevice, RequestOptions, Transport};
use crate::util::{create_identifier, matches_identifier};

/// Information about a discovered device.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// The advertised local name.
    pub name: Option<String>,
    /// The peripheral ID for connecting.
    pub id: PeripheralId,
    /// The BLE address as a string (may be zeros on macOS, use `id` instead).
    pub address: String,
    /// A connection identifier (peripheral ID on macOS, address on other platforms).
    pub identifier: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
    /// Whether the advertisement lists the requested service.
    pub advertises_service: bool,
}

impl DiscoveredDevice {
    /// Name for display, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
    /// Only return devices advertising this service.
    pub service_filter: Option<Uuid>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            service_filter: Some(NUS_SERVICE),
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

    /// Set scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Only return devices advertising `service`.
    #[must_use]
    pub fn service_filter(mut self, service: Uuid) -> Self {
        self.service_filter = Some(service);
        self
    }

    /// Scan for all BLE devices.
    #[must_use]
    pub fn all_devices(mut self) -> Self {
        self.service_filter = None;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await.map_err(|e| {
        warn!("Bluetooth manager unavailable: {}", e);
        Error::AdapterUnavailable
    })?;
    let adapters = manager.adapters().await.map_err(|e| {
        warn!("Failed to list Bluetooth adapters: {}", e);
        Error::AdapterUnavailable
    })?;

    adapters.into_iter().next().ok_or(Error::AdapterUnavailable)
}

/// Scan for devices with custom options.
///
/// An empty list indicates no devices were found (not an error).
pub async fn scan_with_options(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, &options).await
}

/// Scan for devices using a specific adapter.
///
/// Results are ordered strongest signal first.
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: &ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!(
        "Starting BLE scan for {} seconds...",
        options.duration.as_secs()
    );

    let filter = ScanFilter {
        services: options.service_filter.into_iter().collect(),
    };
    adapter.start_scan(filter).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let peripherals = adapter.peripherals().await?;
    let mut discovered = Vec::new();

    for peripheral in peripherals {
        match process_peripheral(&peripheral, options.service_filter).await {
            Ok(Some(device)) => {
                debug!("Found device: {:?} ({})", device.name, device.identifier);
                discovered.push(device);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Error processing peripheral: {}", e);
            }
        }
    }

    discovered.sort_by_key(|d| Reverse(d.rssi.unwrap_or(i16::MIN)));
    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

async fn process_peripheral(
    peripheral: &Peripheral,
    service_filter: Option<Uuid>,
) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let advertises_service = service_filter.is_some_and(|service| {
        properties.services.contains(&service) || properties.service_data.contains_key(&service)
    });
    if service_filter.is_some() && !advertises_service {
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
        advertises_service,
    }))
}

/// Chooses one device out of the scan results.
///
/// This is the device picker of the connect sequence. Implementations either
/// ask the user or select by rule.
#[async_trait]
pub trait DevicePicker: Send + Sync {
    /// Pick a device. Return [`Error::Cancelled`] if the user backs out.
    async fn pick(&self, candidates: Vec<DiscoveredDevice>) -> Result<DiscoveredDevice>;
}

/// Picks the first candidate matching a name or address.
#[derive(Debug, Clone)]
pub struct MatchPicker {
    needle: String,
}

impl MatchPicker {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

#[async_trait]
impl DevicePicker for MatchPicker {
    async fn pick(&self, candidates: Vec<DiscoveredDevice>) -> Result<DiscoveredDevice> {
        candidates
            .into_iter()
            .find(|d| matches_identifier(&self.needle, d.name.as_deref(), &d.identifier))
            .ok_or_else(|| Error::device_not_found(&self.needle))
    }
}

/// btleplug-backed [`Transport`].
pub struct BleTransport {
    picker: Arc<dyn DevicePicker>,
    scan_duration: Duration,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("scan_duration", &self.scan_duration)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Create a transport that asks `picker` to choose among scan results.
    pub fn new(picker: Arc<dyn DevicePicker>) -> Self {
        Self {
            picker,
            scan_duration: ScanOptions::default().duration,
            config: ConnectionConfig::default(),
        }
    }

    /// Set how long each device request scans.
    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set link timeouts for devices handed out by this transport.
    #[must_use]
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl Transport for BleTransport {
    #[tracing::instrument(level = "info", skip_all, fields(accept_all = options.accept_all_devices))]
    async fn request_device(&self, options: &RequestOptions) -> Result<Arc<dyn RemoteDevice>> {
        let adapter = get_adapter().await?;

        let mut scan = ScanOptions::new()
            .duration(self.scan_duration)
            .service_filter(options.ids.service);
        if options.accept_all_devices {
            scan = scan.all_devices();
        }

        let candidates = scan_with_adapter(&adapter, &scan).await?;
        if candidates.is_empty() {
            return Err(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange));
        }

        let picked = self.picker.pick(candidates).await?;
        info!("Found {}", picked.display_name());

        let peripheral = adapter.peripheral(&picked.id).await.map_err(|e| {
            debug!("Picked peripheral lookup failed: {}", e);
            Error::DeviceNotFound(DeviceNotFoundReason::Vanished {
                identifier: picked.identifier.clone(),
            })
        })?;

        Ok(Arc::new(BleDevice::new(
            adapter,
            peripheral,
            picked.name,
            picked.identifier,
            self.config.clone(),
        )))
    }
}
