//! Trait abstractions over the platform wireless transport.
//!
//! The session layer only talks to these traits, so the same connect chain
//! runs against btleplug ([`crate::BleTransport`]) and the in-memory mock
//! ([`crate::MockTransport`]).

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use uuid::Uuid;

use nusterm_types::ServiceIds;

use crate::error::Result;

/// Inbound notification payloads, in delivery order.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

/// Resolves once the platform reports that the link dropped.
pub type DisconnectSignal = BoxFuture<'static, ()>;

/// Constraints for the device request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Identifiers the session will resolve. Also used as the scan filter.
    pub ids: ServiceIds,
    /// Offer every device, not only those advertising `ids.service`.
    pub accept_all_devices: bool,
}

impl RequestOptions {
    /// Create request options with defaults (NUS, filtered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to offer devices that do not advertise the service.
    #[must_use]
    pub fn accept_all_devices(mut self, accept: bool) -> Self {
        self.accept_all_devices = accept;
        self
    }

    /// Use custom service identifiers.
    #[must_use]
    pub fn ids(mut self, ids: ServiceIds) -> Self {
        self.ids = ids;
        self
    }
}

/// A resolved service on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
}

/// A resolved characteristic within a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Service the endpoint belongs to.
    pub service: Uuid,
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Supports acknowledged writes.
    pub write: bool,
    /// Supports unacknowledged writes.
    pub write_without_response: bool,
    /// Supports notifications.
    pub notify: bool,
}

impl Endpoint {
    /// Whether data can be written to this endpoint at all.
    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

/// The platform side of device discovery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask the platform (and through it, the user) for one device.
    ///
    /// Returns [`crate::Error::Cancelled`] when the user dismisses the
    /// picker.
    async fn request_device(&self, options: &RequestOptions) -> Result<Arc<dyn RemoteDevice>>;
}

/// A peripheral handed out by a [`Transport`].
///
/// Methods mirror the connect chain: open the link, subscribe to link loss,
/// resolve the service, resolve endpoints, start notifications, write.
#[async_trait]
pub trait RemoteDevice: Send + Sync {
    /// Advertised name, if any.
    fn name(&self) -> Option<String>;

    /// Address or platform identifier.
    fn identifier(&self) -> String;

    /// Name for display, falling back to the identifier.
    fn display_name(&self) -> String {
        self.name().unwrap_or_else(|| self.identifier())
    }

    /// Open the link.
    async fn open(&self) -> Result<()>;

    /// Whether the platform reports the link as open.
    async fn is_open(&self) -> bool;

    /// Close the link. Closing a closed link is not an error.
    async fn close(&self) -> Result<()>;

    /// Subscribe to platform-initiated link loss.
    async fn disconnect_signal(&self) -> Result<DisconnectSignal>;

    /// Resolve a primary service.
    async fn resolve_service(&self, uuid: Uuid) -> Result<Service>;

    /// Resolve a characteristic within a resolved service.
    async fn resolve_endpoint(&self, service: &Service, uuid: Uuid) -> Result<Endpoint>;

    /// Enable notifications on an endpoint and return its payload stream.
    async fn start_notifications(&self, endpoint: &Endpoint) -> Result<NotificationStream>;

    /// Write one payload to an endpoint.
    async fn write(&self, endpoint: &Endpoint, data: &[u8]) -> Result<()>;
}
