//! Error types for the byte codec in nusterm-types.

use thiserror::Error;

/// Errors that can occur when preparing payloads for the wire.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in nusterm-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Chunk size must be at least one byte.
    #[error("Invalid chunk size: {0} (must be at least 1 byte)")]
    InvalidChunkSize(usize),
}

/// Result type alias using nusterm-types' CodecError type.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
