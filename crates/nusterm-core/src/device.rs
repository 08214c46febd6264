//! btleplug-backed peripheral.
//!
//! [`BleDevice`] implements [`RemoteDevice`] for a peripheral found by
//! [`crate::BleTransport`]. Link operations carry the timeouts from
//! [`ConnectionConfig`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use futures::{FutureExt, StreamExt};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::{DisconnectSignal, Endpoint, NotificationStream, RemoteDevice, Service};

/// Default timeout for opening the link.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single write.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE link timeouts.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use nusterm_core::device::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .write_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// A peripheral reachable through btleplug.
///
/// Does not implement `Clone`; share it as `Arc<BleDevice>` (the transport
/// hands it out as `Arc<dyn RemoteDevice>`).
///
/// Call [`RemoteDevice::close`] before dropping an opened device. Dropping it
/// while open logs a warning and spawns a best-effort disconnect.
pub struct BleDevice {
    /// Kept alive for the lifetime of the peripheral and used for link-loss
    /// events.
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
    identifier: String,
    /// Characteristics keyed by (service, characteristic), filled on open.
    characteristics_cache: RwLock<HashMap<(Uuid, Uuid), Characteristic>>,
    opened: AtomicBool,
    closed: AtomicBool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleDevice")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field("opened", &self.opened.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl BleDevice {
    /// Wrap a discovered peripheral. No link activity happens until
    /// [`RemoteDevice::open`].
    pub fn new(
        adapter: Adapter,
        peripheral: Peripheral,
        name: Option<String>,
        identifier: String,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            adapter,
            peripheral,
            name,
            identifier,
            characteristics_cache: RwLock::new(HashMap::new()),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            config,
        }
    }

    async fn find_characteristic(&self, service: Uuid, uuid: Uuid) -> Result<Characteristic> {
        self.characteristics_cache
            .read()
            .await
            .get(&(service, uuid))
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(uuid, service))
    }
}

fn endpoint_from(characteristic: &Characteristic) -> Endpoint {
    let props = characteristic.properties;
    Endpoint {
        service: characteristic.service_uuid,
        uuid: characteristic.uuid,
        write: props.contains(CharPropFlags::WRITE),
        write_without_response: props.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: props.intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE),
    }
}

/// Acknowledged writes where the endpoint allows them.
fn write_type_for(endpoint: &Endpoint) -> WriteType {
    if endpoint.write {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    }
}

#[async_trait]
impl RemoteDevice for BleDevice {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    #[tracing::instrument(level = "info", skip(self), fields(device = %self.identifier))]
    async fn open(&self) -> Result<()> {
        info!("Connecting to device...");
        timeout(self.config.connection_timeout, self.peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", self.config.connection_timeout))??;
        self.opened.store(true, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        info!("Connected!");

        info!("Discovering services...");
        timeout(
            self.config.discovery_timeout,
            self.peripheral.discover_services(),
        )
        .await
        .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;

        let services = self.peripheral.services();
        debug!("Found {} services", services.len());

        let mut cache = self.characteristics_cache.write().await;
        cache.clear();
        for service in &services {
            debug!("  Service: {}", service.uuid);
            for char in &service.characteristics {
                debug!("    Characteristic: {} {:?}", char.uuid, char.properties);
                cache.insert((service.uuid, char.uuid), char.clone());
            }
        }
        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    #[tracing::instrument(level = "info", skip(self), fields(device = %self.identifier))]
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if !self.is_open().await {
            debug!("Link already closed");
            return Ok(());
        }
        info!("Disconnecting from device...");
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn disconnect_signal(&self) -> Result<DisconnectSignal> {
        let id = self.peripheral.id();
        let mut events = self.adapter.events().await?;
        Ok(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(peripheral_id) = event
                    && peripheral_id == id
                {
                    return;
                }
            }
            debug!("Adapter event stream ended");
        }
        .boxed())
    }

    async fn resolve_service(&self, uuid: Uuid) -> Result<Service> {
        self.peripheral
            .services()
            .iter()
            .find(|s| s.uuid == uuid)
            .map(|s| Service { uuid: s.uuid })
            .ok_or(Error::ServiceNotFound { uuid })
    }

    async fn resolve_endpoint(&self, service: &Service, uuid: Uuid) -> Result<Endpoint> {
        let characteristic = self.find_characteristic(service.uuid, uuid).await?;
        Ok(endpoint_from(&characteristic))
    }

    async fn start_notifications(&self, endpoint: &Endpoint) -> Result<NotificationStream> {
        let characteristic = self.find_characteristic(endpoint.service, endpoint.uuid).await?;

        // Take the stream before subscribing so the first notification is not missed
        let stream = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&characteristic).await?;

        let char_uuid = characteristic.uuid;
        Ok(stream
            .filter_map(move |notification| {
                futures::future::ready((notification.uuid == char_uuid).then_some(notification.value))
            })
            .boxed())
    }

    async fn write(&self, endpoint: &Endpoint, data: &[u8]) -> Result<()> {
        let characteristic = self.find_characteristic(endpoint.service, endpoint.uuid).await?;
        timeout(
            self.config.write_timeout,
            self.peripheral
                .write(&characteristic, data, write_type_for(endpoint)),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", endpoint.uuid),
                self.config.write_timeout,
            )
        })?
        .map_err(|e| Error::WriteFailed {
            uuid: endpoint.uuid,
            reason: e.to_string(),
        })
    }
}

impl Drop for BleDevice {
    fn drop(&mut self) {
        if self.opened.load(Ordering::SeqCst) && !self.closed.swap(true, Ordering::SeqCst) {
            warn!(
                device = %self.identifier,
                "Device dropped without close() - performing best-effort disconnect"
            );

            let peripheral = self.peripheral.clone();
            let identifier = self.identifier.clone();

            // Runtime may already be shutting down
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = peripheral.disconnect().await {
                        debug!(device = %identifier, error = %e, "Best-effort disconnect failed");
                    }
                });
            }
        }
    }
}
