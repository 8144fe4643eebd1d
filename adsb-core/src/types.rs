//! Shared types, error enums, and small hex/ICAO helpers for adsb-core.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by adsb-core.
///
/// Everything except `Io` is recoverable: the pipeline drops the offending
/// frame (or leaves a field unset) and moves on to the next one.
#[derive(Debug, Error)]
pub enum AdsbError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("CRC check failed (remainder {remainder:06X})")]
    Crc { remainder: u32 },
    #[error("undecodable downlink format: {0}")]
    UndecodableFormat(u8),
    #[error("field decode failed: {0}")]
    FieldDecode(#[from] FieldError),
    #[error("position unresolved: {0}")]
    PositionUnresolved(#[from] Unresolved),
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("invalid frame length: expected {expected} bits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdsbError {
    /// True unless the underlying stream itself failed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AdsbError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, AdsbError>;

/// Wire-level framing failures. The Framer has already consumed the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("no start marker within {scanned} bytes")]
    NoStartMarker { scanned: usize },
    #[error("bad terminator byte 0x{found:02X}")]
    BadTerminator { found: u8 },
    #[error("payload is not 28 hex characters")]
    InvalidPayload,
}

/// Per-field decode failure. Never surfaced past the pipeline: the field
/// is simply left unset (or at its previous value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{field} not carried by type code {tc}")]
    TypeCode { field: &'static str, tc: u8 },
    #[error("{field} not carried by downlink format {df}")]
    DownlinkFormat { field: &'static str, df: u8 },
    #[error("altitude Q-bit clear")]
    QBitClear,
    #[error("{0} not available")]
    Unavailable(&'static str),
}

/// Reasons a CPR position could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unresolved {
    #[error("message does not carry a position")]
    NotPosition,
    #[error("no opposite-parity frame buffered")]
    NoPair,
    #[error("frame pair too far apart in time")]
    PairTooOld,
    #[error("latitude zone mismatch between frames")]
    ZoneMismatch,
    #[error("cannot pair surface and airborne frames")]
    MixedSurface,
    #[error("surface decode needs a reference position")]
    NoReference,
}

// ---------------------------------------------------------------------------
// ICAO address helpers
// ---------------------------------------------------------------------------

/// 3-byte ICAO address. Stored as raw bytes to avoid per-frame String allocation.
pub type Icao = [u8; 3];

/// Format ICAO address as 6-char uppercase hex string.
pub fn icao_to_string(icao: &Icao) -> String {
    format!("{:02X}{:02X}{:02X}", icao[0], icao[1], icao[2])
}

/// Build ICAO from a 24-bit integer.
pub fn icao_from_u32(val: u32) -> Icao {
    [
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ]
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ADS-B callsign character set
// ---------------------------------------------------------------------------

/// 6-bit callsign alphabet. `#` marks an invalid symbol, `_` a space.
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ#####_###############0123456789######";

// ---------------------------------------------------------------------------
// Small enums shared across modules
// ---------------------------------------------------------------------------

/// CPR format flag (bit 53 of a position message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn from_bit(bit: u64) -> Self {
        if bit == 1 {
            Parity::Odd
        } else {
            Parity::Even
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Parity::Even => Parity::Odd,
            Parity::Odd => Parity::Even,
        }
    }
}

/// Where an altitude value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeSource {
    Barometric,
    Gnss,
}

/// Speed type for velocity messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedType {
    Ground,
    IAS,
    TAS,
}

impl std::fmt::Display for SpeedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedType::Ground => write!(f, "ground"),
            SpeedType::IAS => write!(f, "IAS"),
            SpeedType::TAS => write!(f, "TAS"),
        }
    }
}

/// True for type codes that carry a CPR position (surface or airborne).
pub fn is_position_tc(tc: u8) -> bool {
    matches!(tc, 5..=18 | 20..=22)
}

/// True for surface position type codes.
pub fn is_surface_tc(tc: u8) -> bool {
    (5..=8).contains(&tc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icao_to_string() {
        assert_eq!(icao_to_string(&[0x48, 0x40, 0xD6]), "4840D6");
    }

    #[test]
    fn test_icao_from_u32() {
        assert_eq!(icao_from_u32(0x4840D6), [0x48, 0x40, 0xD6]);
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("4840d6"), Some(vec![0x48, 0x40, 0xD6]));
        assert_eq!(hex_decode("odd"), None);
        assert_eq!(hex_decode("ZZZZ"), None);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x48, 0x40, 0xD6]), "4840D6");
    }

    #[test]
    fn test_position_type_codes() {
        for tc in [5, 8, 9, 18, 20, 22] {
            assert!(is_position_tc(tc), "TC {tc} carries a position");
        }
        for tc in [0, 1, 4, 19, 23, 31] {
            assert!(!is_position_tc(tc), "TC {tc} carries no position");
        }
        assert!(is_surface_tc(6));
        assert!(!is_surface_tc(11));
    }

    #[test]
    fn test_parity() {
        assert_eq!(Parity::from_bit(0), Parity::Even);
        assert_eq!(Parity::from_bit(1), Parity::Odd);
        assert_eq!(Parity::Odd.opposite(), Parity::Even);
    }

    #[test]
    fn test_only_io_is_fatal() {
        let io = AdsbError::Io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(!io.is_recoverable());
        assert!(AdsbError::Crc { remainder: 1 }.is_recoverable());
        assert!(AdsbError::UndecodableFormat(4).is_recoverable());
        assert!(AdsbError::from(FramingError::InvalidPayload).is_recoverable());
    }
}
