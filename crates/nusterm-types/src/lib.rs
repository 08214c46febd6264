//! Platform-agnostic types for Nordic UART Service terminals.
//!
//! This crate provides the pieces of a NUS serial console that do not depend
//! on a Bluetooth stack, so they can be shared by the native terminal and any
//! other front-end.
//!
//! # Features
//!
//! - UUID constants for the service and its RX/TX characteristics
//! - The byte codec: UTF-8 outbound, byte-per-character inbound, chunking
//! - The input line buffer and its keystroke policy
//!
//! # Example
//!
//! ```
//! use nusterm_types::{LineBuffer, LineEdit, encode_text};
//!
//! let mut line = LineBuffer::new();
//! for key in ["l", "s", "\r"] {
//!     if let LineEdit::Submit(text) = line.feed(key) {
//!         assert_eq!(encode_text(&text).as_ref(), b"ls\n");
//!     }
//! }
//! ```

pub mod codec;
pub mod error;
pub mod line;
pub mod uuid;

pub use codec::{DEFAULT_CHUNK_SIZE, PRIMER, chunk, decode_fragment, encode_text};
pub use error::{CodecError, CodecResult};
pub use line::{BACKSPACE, DELETE, LineBuffer, LineEdit, TERMINATOR};
pub use self::uuid::ServiceIds;
pub use self::uuid as uuids;
