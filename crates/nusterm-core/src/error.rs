//! Error types for nusterm-core.
//!
//! Every failure is terminal for the operation that hit it: nothing in this
//! crate retries. The session controller prints the error's display text to
//! the output surface, so messages are written for the person at the
//! terminal.
//!
//! | Error | Raised by | Outcome |
//! |-------|-----------|---------|
//! | [`Error::AdapterUnavailable`] | device request | stays disconnected |
//! | [`Error::Cancelled`] | device picker | stays disconnected |
//! | [`Error::DeviceNotFound`] | device request | stays disconnected |
//! | [`Error::ServiceNotFound`] | connect chain | link torn down |
//! | [`Error::CharacteristicNotFound`] | connect chain | link torn down |
//! | [`Error::Timeout`] | connect chain | link torn down |
//! | [`Error::NotConnected`] | outbound bridge | data dropped |
//! | [`Error::Busy`] | overlapping connect | ignored |

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while talking to a NUS peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The host has no usable Bluetooth stack or adapter.
    #[error("Bluetooth is not available on this host. Check that an adapter is present and powered on.")]
    AdapterUnavailable,

    /// Device not found during the device request.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// The user dismissed the device picker.
    #[error("Device selection cancelled")]
    Cancelled,

    /// The peripheral does not expose the requested service.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The service UUID that was not found.
        uuid: Uuid,
    },

    /// Required characteristic not found in the resolved service.
    #[error("Characteristic not found: {uuid} (in service {service})")]
    CharacteristicNotFound {
        /// The characteristic UUID that was not found.
        uuid: Uuid,
        /// The service that was searched.
        service: Uuid,
    },

    /// Operation attempted while not connected to a device.
    #[error("Not connected to a device yet.")]
    NotConnected,

    /// A connection attempt is already in progress or established.
    #[error("A connection is already in progress")]
    Busy,

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: Uuid,
        /// The reason for the failure.
        reason: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Payload could not be prepared for the wire.
    #[error(transparent)]
    Codec(#[from] nusterm_types::CodecError),
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No devices found during scan.
    NoDevicesInRange,
    /// Device with specified name/address not found.
    NotFound { identifier: String },
    /// The picked device disappeared before it could be used.
    Vanished { identifier: String },
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevicesInRange => write!(f, "no devices in range"),
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::Vanished { identifier } => {
                write!(f, "device '{}' is no longer available", identifier)
            }
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: Uuid, service: Uuid) -> Self {
        Self::CharacteristicNotFound { uuid, service }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the error came from the user rather than the device.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using nusterm-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
