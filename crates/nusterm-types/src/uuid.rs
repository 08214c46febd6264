//! Bluetooth UUIDs for the Nordic UART Service.
//!
//! RX and TX are named from the peripheral's point of view: the central
//! writes to RX and receives notifications on TX.

use uuid::{Uuid, uuid};

/// Nordic UART Service.
pub const NUS_SERVICE: Uuid = uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e");

/// RX characteristic (write, central -> peripheral).
pub const NUS_RX: Uuid = uuid!("6e400002-b5a3-f393-e0a9-e50e24dcca9e");

/// TX characteristic (notify, peripheral -> central).
pub const NUS_TX: Uuid = uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

/// The service and endpoint identifiers a session resolves.
///
/// Defaults to the Nordic UART Service. Vendors that clone NUS under their
/// own base UUID can override all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceIds {
    /// Service that groups both endpoints.
    pub service: Uuid,
    /// Outbound (write) endpoint.
    pub rx: Uuid,
    /// Inbound (notify) endpoint.
    pub tx: Uuid,
}

impl Default for ServiceIds {
    fn default() -> Self {
        Self::nus()
    }
}

impl ServiceIds {
    /// The standard Nordic UART Service identifiers.
    pub const fn nus() -> Self {
        Self {
            service: NUS_SERVICE,
            rx: NUS_RX,
            tx: NUS_TX,
        }
    }

    /// Whether these are the stock NUS identifiers.
    pub fn is_nus(&self) -> bool {
        *self == Self::nus()
    }
}
