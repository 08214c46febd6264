//! Byte codec for the UART bridge.
//!
//! Outbound text is sent as raw UTF-8 with no header or length framing.
//! Inbound notifications are decoded one byte per character (`u8 as char`),
//! which matches what most firmware shells emit but is not UTF-8 aware:
//! a multi-byte sequence arrives as several Latin-1 characters.

use bytes::Bytes;

use crate::error::{CodecError, CodecResult};

/// Payload size used when chunked writes are enabled without an explicit size.
///
/// Peripherals that never negotiate a larger ATT MTU only accept 20 bytes;
/// pass a smaller size for those.
pub const DEFAULT_CHUNK_SIZE: usize = 40;

/// Carriage return sent once after connecting to wake the remote shell.
pub const PRIMER: &str = "\r";

/// Encode outbound text as a single UTF-8 payload.
pub fn encode_text(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

/// Decode an inbound notification, mapping every byte to its character code.
pub fn decode_fragment(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

/// Split a payload into consecutive chunks of at most `size` bytes.
///
/// The chunks share the payload's buffer. An empty payload yields no chunks.
pub fn chunk(payload: &Bytes, size: usize) -> CodecResult<Vec<Bytes>> {
    if size == 0 {
        return Err(CodecError::InvalidChunkSize(size));
    }

    let mut chunks = Vec::with_capacity(payload.len().div_ceil(size));
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + size).min(payload.len());
        chunks.push(payload.slice(offset..end));
        offset = end;
    }
    Ok(chunks)
}
