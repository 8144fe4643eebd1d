//! Extract `*<28 hex>;` frames from a raw byte stream.
//!
//! The feed has no length prefix and no escaping. A frame is the start
//! marker `*`, exactly 28 ASCII hex characters, and the terminator `;`.
//! Bytes are consumed unconditionally, so a malformed frame costs exactly
//! the bytes read while attempting it and scanning resumes at the next `*`.

use std::io::Read;

use crate::types::{AdsbError, FramingError, Result};

pub const START_MARKER: u8 = b'*';
pub const TERMINATOR: u8 = b';';

/// Hex characters in one 112-bit frame.
pub const FRAME_HEX_LEN: usize = 28;

/// Default number of bytes scanned for a start marker before giving up.
pub const DEFAULT_SCAN_LIMIT: usize = 64;

/// One framed message: 28 validated ASCII hex characters, uppercased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    hex: [u8; FRAME_HEX_LEN],
}

impl RawFrame {
    /// Build from a 28-char hex string (no markers).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let bytes = hex.as_bytes();
        if bytes.len() != FRAME_HEX_LEN || !bytes.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let mut buf = [0u8; FRAME_HEX_LEN];
        buf.copy_from_slice(bytes);
        buf.make_ascii_uppercase();
        Some(RawFrame { hex: buf })
    }

    pub fn as_str(&self) -> &str {
        // Only ever holds ASCII hex digits.
        std::str::from_utf8(&self.hex).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.hex
    }
}

impl std::fmt::Display for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "*{};", self.as_str())
    }
}

/// Stateless frame extractor with a bounded start-marker scan.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    scan_limit: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Framer::new(DEFAULT_SCAN_LIMIT)
    }
}

impl Framer {
    pub fn new(scan_limit: usize) -> Self {
        Framer {
            scan_limit: scan_limit.max(1),
        }
    }

    /// Read the next frame from `stream`.
    ///
    /// Errors:
    /// - `AdsbError::Framing`: start marker not found within the scan limit,
    ///   wrong terminator, or non-hex payload. Recoverable; call again.
    /// - `AdsbError::Io`: the stream closed (EOF) or failed. Fatal.
    pub fn next_frame<R: Read>(&self, stream: &mut R) -> Result<RawFrame> {
        let mut byte = [0u8; 1];
        let mut scanned = 0;
        loop {
            if scanned == self.scan_limit {
                return Err(FramingError::NoStartMarker { scanned }.into());
            }
            stream.read_exact(&mut byte)?;
            scanned += 1;
            if byte[0] == START_MARKER {
                break;
            }
        }

        let mut body = [0u8; FRAME_HEX_LEN + 1];
        stream.read_exact(&mut body)?;

        let found = body[FRAME_HEX_LEN];
        if found != TERMINATOR {
            return Err(FramingError::BadTerminator { found }.into());
        }

        let mut hex = [0u8; FRAME_HEX_LEN];
        hex.copy_from_slice(&body[..FRAME_HEX_LEN]);
        if !hex.iter().all(u8::is_ascii_hexdigit) {
            return Err(AdsbError::Framing(FramingError::InvalidPayload));
        }
        hex.make_ascii_uppercase();
        Ok(RawFrame { hex })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
