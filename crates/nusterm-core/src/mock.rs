//! In-memory transport for testing.
//!
//! [`MockTransport`] and [`MockDevice`] implement the transport traits without
//! BLE hardware, so the whole connect chain can run in unit and integration
//! tests.
//!
//! # Features
//!
//! - **Write capture**: every payload written to the device is recorded
//! - **Notification injection**: push inbound payloads with [`MockDevice::notify`]
//! - **Link loss**: simulate an unsolicited drop with [`MockDevice::drop_link`]
//! - **Failure injection**: fail any step of the connect chain, or writes
//! - **Latency simulation**: delay the device request

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use futures::{FutureExt, StreamExt};
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use nusterm_types::ServiceIds;

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::traits::{
    DisconnectSignal, Endpoint, NotificationStream, RemoteDevice, RequestOptions, Service,
    Transport,
};

/// A mock NUS peripheral.
///
/// # Example
///
/// ```
/// use nusterm_core::{MockDevice, RemoteDevice};
///
/// #[tokio::main]
/// async fn main() {
///     let device = MockDevice::new("Zephyr Shell");
///     device.open().await.unwrap();
///     assert!(device.is_open().await);
/// }
/// ```
pub struct MockDevice {
    name: Option<String>,
    identifier: String,
    ids: ServiceIds,
    link: watch::Sender<bool>,
    writes: Mutex<Vec<Vec<u8>>>,
    subscriber: Mutex<Option<UnboundedSender<Vec<u8>>>>,
    /// RX advertises acknowledged writes.
    rx_write_with_response: AtomicBool,
    fail_open: AtomicBool,
    fail_writes: AtomicBool,
    has_service: AtomicBool,
    missing_endpoint: Mutex<Option<Uuid>>,
    open_count: AtomicU32,
    close_count: AtomicU32,
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .field("open", &*self.link.borrow())
            .finish()
    }
}

impl MockDevice {
    /// Create a mock device exposing NUS.
    pub fn new(name: &str) -> Self {
        let mut device = Self::unnamed();
        device.name = Some(name.to_string());
        device
    }

    /// Create a mock device that advertises no name.
    pub fn unnamed() -> Self {
        let (link, _) = watch::channel(false);
        Self {
            name: None,
            identifier: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
            ids: ServiceIds::nus(),
            link,
            writes: Mutex::new(Vec::new()),
            subscriber: Mutex::new(None),
            rx_write_with_response: AtomicBool::new(true),
            fail_open: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            has_service: AtomicBool::new(true),
            missing_endpoint: Mutex::new(None),
            open_count: AtomicU32::new(0),
            close_count: AtomicU32::new(0),
        }
    }

    /// Push an inbound payload to the notification stream.
    ///
    /// Returns `false` if notifications have not been started or the
    /// consumer is gone.
    pub fn notify(&self, data: &[u8]) -> bool {
        self.subscriber
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|tx| tx.unbounded_send(data.to_vec()).is_ok()))
            .unwrap_or(false)
    }

    /// Simulate the platform reporting that the link dropped.
    pub fn drop_link(&self) {
        self.link.send_replace(false);
    }

    /// Every payload written, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// All written payloads concatenated and decoded as UTF-8.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.writes().concat()).into_owned()
    }

    pub fn clear_writes(&self) {
        if let Ok(mut writes) = self.writes.lock() {
            writes.clear();
        }
    }

    pub fn open_count(&self) -> u32 {
        self.open_count.load(Ordering::Relaxed)
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::Relaxed)
    }

    /// Make `open` fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }

    /// Make every write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Hide the NUS service from service resolution.
    pub fn set_service_missing(&self, missing: bool) {
        self.has_service.store(!missing, Ordering::Relaxed);
    }

    /// Hide one characteristic from endpoint resolution.
    pub fn set_endpoint_missing(&self, uuid: Option<Uuid>) {
        if let Ok(mut missing) = self.missing_endpoint.lock() {
            *missing = uuid;
        }
    }

    /// Whether RX advertises acknowledged writes (default `true`).
    pub fn set_rx_write_with_response(&self, supported: bool) {
        self.rx_write_with_response.store(supported, Ordering::Relaxed);
    }

    fn link_open(&self) -> bool {
        *self.link.borrow()
    }
}

#[async_trait]
impl RemoteDevice for MockDevice {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    async fn open(&self) -> Result<()> {
        self.open_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(Error::timeout("connect to device", Duration::from_secs(15)));
        }
        self.link.send_replace(true);
        Ok(())
    }

    async fn is_open(&self) -> bool {
        self.link_open()
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::Relaxed);
        self.link.send_replace(false);
        if let Ok(mut subscriber) = self.subscriber.lock() {
            subscriber.take();
        }
        Ok(())
    }

    async fn disconnect_signal(&self) -> Result<DisconnectSignal> {
        let mut rx = self.link.subscribe();
        Ok(async move {
            // Sender dropped counts as the link going away
            let _ = rx.wait_for(|open| !*open).await;
        }
        .boxed())
    }

    async fn resolve_service(&self, uuid: Uuid) -> Result<Service> {
        if !self.link_open() {
            return Err(Error::NotConnected);
        }
        if uuid == self.ids.service && self.has_service.load(Ordering::Relaxed) {
            Ok(Service { uuid })
        } else {
            Err(Error::ServiceNotFound { uuid })
        }
    }

    async fn resolve_endpoint(&self, service: &Service, uuid: Uuid) -> Result<Endpoint> {
        let missing = self.missing_endpoint.lock().ok().and_then(|m| *m);
        if missing == Some(uuid) {
            return Err(Error::characteristic_not_found(uuid, service.uuid));
        }

        if uuid == self.ids.rx {
            Ok(Endpoint {
                service: service.uuid,
                uuid,
                write: self.rx_write_with_response.load(Ordering::Relaxed),
                write_without_response: true,
                notify: false,
            })
        } else if uuid == self.ids.tx {
            Ok(Endpoint {
                service: service.uuid,
                uuid,
                write: false,
                write_without_response: false,
                notify: true,
            })
        } else {
            Err(Error::characteristic_not_found(uuid, service.uuid))
        }
    }

    async fn start_notifications(&self, endpoint: &Endpoint) -> Result<NotificationStream> {
        if !endpoint.notify {
            return Err(Error::invalid_config(format!(
                "characteristic {} does not support notifications",
                endpoint.uuid
            )));
        }
        let (tx, rx) = unbounded();
        if let Ok(mut subscriber) = self.subscriber.lock() {
            *subscriber = Some(tx);
        }
        Ok(rx.boxed())
    }

    async fn write(&self, endpoint: &Endpoint, data: &[u8]) -> Result<()> {
        if !self.link_open() {
            return Err(Error::WriteFailed {
                uuid: endpoint.uuid,
                reason: "link closed".to_string(),
            });
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Error::WriteFailed {
                uuid: endpoint.uuid,
                reason: "mock write failure".to_string(),
            });
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(data.to_vec());
        }
        Ok(())
    }
}

/// What the next device request returns.
#[derive(Debug, Clone)]
pub enum MockRequest {
    /// Hand out this device.
    Device(Arc<MockDevice>),
    /// The user dismisses the picker.
    Cancel,
    /// Nothing in range.
    NoDevices,
    /// No Bluetooth on this host.
    NoAdapter,
}

/// A mock transport that answers device requests from a script.
#[derive(Debug)]
pub struct MockTransport {
    next: RwLock<MockRequest>,
    request_count: AtomicU32,
    /// Simulated request latency in milliseconds (0 = no delay).
    request_latency_ms: AtomicU64,
    last_options: Mutex<Option<RequestOptions>>,
}

impl MockTransport {
    /// A transport that always offers `device`.
    pub fn with_device(device: Arc<MockDevice>) -> Self {
        Self::new(MockRequest::Device(device))
    }

    pub fn new(next: MockRequest) -> Self {
        Self {
            next: RwLock::new(next),
            request_count: AtomicU32::new(0),
            request_latency_ms: AtomicU64::new(0),
            last_options: Mutex::new(None),
        }
    }

    /// Change what subsequent requests return.
    pub async fn set_next(&self, next: MockRequest) {
        *self.next.write().await = next;
    }

    pub fn set_request_latency(&self, latency: Duration) {
        self.request_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Options passed to the most recent request.
    pub fn last_options(&self) -> Option<RequestOptions> {
        self.last_options.lock().ok().and_then(|o| o.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request_device(&self, options: &RequestOptions) -> Result<Arc<dyn RemoteDevice>> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_options.lock() {
            *last = Some(options.clone());
        }

        let latency = self.request_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        match &*self.next.read().await {
            MockRequest::Device(device) => Ok(Arc::clone(device) as Arc<dyn RemoteDevice>),
            MockRequest::Cancel => Err(Error::Cancelled),
            MockRequest::NoDevices => Err(Error::DeviceNotFound(
                DeviceNotFoundReason::NoDevicesInRange,
            )),
            MockRequest::NoAdapter => Err(Error::AdapterUnavailable),
        }
    }
}
