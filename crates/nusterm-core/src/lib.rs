//! Transport and session layer for Nordic UART Service (NUS) terminals.
//!
//! This crate connects to a Bluetooth Low Energy peripheral that exposes the
//! Nordic UART Service and bridges it to a text surface: typed lines go out
//! as writes to the RX characteristic, notifications from the TX
//! characteristic come back as text.
//!
//! # Features
//!
//! - **Device discovery**: Scan for nearby devices advertising NUS
//! - **Linear connect chain**: request, open, resolve service and endpoints,
//!   start notifications, with a typed [`Error`] for every failure
//! - **Byte bridges**: outbound UTF-8 writes, inbound byte-per-char decoding
//! - **Link loss detection**: unsolicited drops tear the session down
//! - **Lifecycle events**: broadcast [`SessionEvent`]s for UI state
//! - **Mock transport**: run the whole chain without hardware
//!
//! # Platform Differences
//!
//! - **macOS**: Devices are identified by a UUID assigned by CoreBluetooth.
//!   It is stable for a given device on a given Mac, but differs between Macs.
//! - **Linux/Windows**: Devices are identified by their Bluetooth MAC address
//!   (e.g., `AA:BB:CC:DD:EE:FF`).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use nusterm_core::{BleTransport, BufferSink, MatchPicker, SessionConfig, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = BleTransport::new(Arc::new(MatchPicker::new("Zephyr")));
//!     let output = BufferSink::new();
//!     let controller = SessionController::new(
//!         Arc::new(transport),
//!         Arc::new(output.clone()),
//!         SessionConfig::new(),
//!     );
//!
//!     controller.connect().await?;
//!     controller.send_text("kernel version\n").await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     print!("{}", output.contents());
//!     controller.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod events;
pub mod mock;
pub mod output;
pub mod scan;
pub mod session;
pub mod traits;
pub mod util;

// Core exports
pub use device::{BleDevice, ConnectionConfig};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use events::{DeviceId, DisconnectReason, EventDispatcher, EventReceiver, SessionEvent};
pub use mock::{MockDevice, MockRequest, MockTransport};
pub use output::{BufferSink, OutputSink};
pub use scan::{
    BleTransport, DevicePicker, DiscoveredDevice, MatchPicker, ScanOptions, get_adapter,
    scan_with_adapter, scan_with_options,
};
pub use session::{Session, SessionConfig, SessionController, SessionState};
pub use traits::{
    DisconnectSignal, Endpoint, NotificationStream, RemoteDevice, RequestOptions, Service,
    Transport,
};
pub use util::{create_identifier, format_peripheral_id, matches_identifier};

// Re-export from nusterm-types
pub use nusterm_types::uuids;
pub use nusterm_types::{
    CodecError, DEFAULT_CHUNK_SIZE, LineBuffer, LineEdit, PRIMER, ServiceIds, decode_fragment,
    encode_text,
};
