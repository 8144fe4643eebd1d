//! Typed bit-field accessors over a Mode S message.
//!
//! Bits are numbered from the most significant bit of the first byte,
//! starting at 0. For a 112-bit DF17 message:
//!
//! ```text
//!  0      5    8                        32                              88                    112
//!  | DF:5 |CA:3|      ICAO address:24    |        ME payload:56          |    parity/CRC:24    |
//! ```
//!
//! Within the ME payload the type code sits at bits 32-36.

use crate::framer::RawFrame;
use crate::types::*;

/// Length of an extended squitter in bits.
pub const LONG_MSG_BITS: usize = 112;

/// Minimum length needed to read the ICAO address (DF + CA + AA).
const MIN_ICAO_BITS: usize = 32;

/// CPR format flag.
pub const BIT_CPR_FORMAT: usize = 53;
/// 17-bit CPR latitude.
pub const BIT_CPR_LAT: usize = 54;
/// 17-bit CPR longitude.
pub const BIT_CPR_LON: usize = 71;

/// A Mode S message viewed as a fixed-width bit buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    raw: Vec<u8>,
    hex: String,
}

impl DecodedMessage {
    /// Parse any even-length hex string. Length is checked by the accessors,
    /// not here, so short messages still expose the fields they do carry.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        let raw = hex_decode(hex).ok_or_else(|| AdsbError::InvalidHex(hex.to_string()))?;
        if raw.is_empty() {
            return Err(AdsbError::InvalidLength {
                expected: LONG_MSG_BITS,
                actual: 0,
            });
        }
        Ok(DecodedMessage {
            hex: hex_encode(&raw),
            raw,
        })
    }

    /// View a framed message. Frames are always 28 hex characters.
    pub fn from_frame(frame: &RawFrame) -> Result<Self> {
        DecodedMessage::from_hex(frame.as_str())
    }

    pub fn bit_len(&self) -> usize {
        self.raw.len() * 8
    }

    pub fn is_long(&self) -> bool {
        self.bit_len() == LONG_MSG_BITS
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Uppercase hex text of the whole message.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Read `len` bits (1..=64) starting at bit `start`.
    /// Returns `None` if the field runs past the end of the message.
    pub fn field(&self, start: usize, len: usize) -> Option<u64> {
        if len == 0 || len > 64 || start + len > self.bit_len() {
            return None;
        }
        let mut value = 0u64;
        for pos in start..start + len {
            let bit = (self.raw[pos / 8] >> (7 - pos % 8)) & 1;
            value = (value << 1) | bit as u64;
        }
        Some(value)
    }

    /// Single bit as bool. Out-of-range reads as false.
    pub fn flag(&self, pos: usize) -> bool {
        self.field(pos, 1) == Some(1)
    }

    /// Downlink Format: top 5 bits of byte 0.
    pub fn downlink_format(&self) -> u8 {
        self.raw[0] >> 3
    }

    /// Capability: bottom 3 bits of byte 0.
    pub fn capability(&self) -> u8 {
        self.raw[0] & 0x07
    }

    /// ICAO address from bits 8-31, or `None` for messages shorter than 32 bits.
    pub fn icao(&self) -> Option<Icao> {
        if self.bit_len() < MIN_ICAO_BITS {
            return None;
        }
        Some([self.raw[1], self.raw[2], self.raw[3]])
    }

    /// ICAO address as a 6-character hex string.
    pub fn icao_str(&self) -> Option<String> {
        self.icao().map(|icao| icao_to_string(&icao))
    }

    /// Type code from bits 32-36. `None` unless the message is exactly 112 bits.
    pub fn type_code(&self) -> Option<u8> {
        if !self.is_long() {
            return None;
        }
        self.field(32, 5).map(|tc| tc as u8)
    }

    /// The 56-bit ME payload as a string of `0`/`1` characters.
    pub fn payload_bits(&self) -> Option<String> {
        if !self.is_long() {
            return None;
        }
        Some(
            (32..88)
                .map(|pos| if self.flag(pos) { '1' } else { '0' })
                .collect(),
        )
    }

    /// CPR odd/even flag. Only meaningful for position type codes.
    pub fn parity(&self) -> Option<Parity> {
        if !self.type_code().is_some_and(is_position_tc) {
            return None;
        }
        self.field(BIT_CPR_FORMAT, 1).map(Parity::from_bit)
    }

    /// Raw 17-bit CPR latitude.
    pub fn cpr_lat(&self) -> Option<u32> {
        self.field(BIT_CPR_LAT, 17).map(|v| v as u32)
    }

    /// Raw 17-bit CPR longitude.
    pub fn cpr_lon(&self) -> Option<u32> {
        self.field(BIT_CPR_LON, 17).map(|v| v as u32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(hex: &str) -> DecodedMessage {
        DecodedMessage::from_hex(hex).expect("valid hex")
    }

    #[test]
    fn test_identification_fields() {
        let m = msg("8D4840D6202CC371C32CE0576098");
        assert_eq!(m.downlink_format(), 17);
        assert_eq!(m.capability(), 5);
        assert_eq!(m.icao_str().as_deref(), Some("4840D6"));
        assert_eq!(m.type_code(), Some(4));
        assert!(m.is_long());
    }

    #[test]
    fn test_position_fields() {
        let m = msg("8D40621D58C382D690C8AC2863A7");
        assert_eq!(m.icao_str().as_deref(), Some("40621D"));
        assert_eq!(m.type_code(), Some(11));
        assert_eq!(m.parity(), Some(Parity::Even));
        assert_eq!(m.cpr_lat(), Some(93000));
        assert_eq!(m.cpr_lon(), Some(51372));

        let m = msg("8D40621D58C386435CC412692AD6");
        assert_eq!(m.parity(), Some(Parity::Odd));
        assert_eq!(m.cpr_lat(), Some(74158));
        assert_eq!(m.cpr_lon(), Some(50194));
    }

    #[test]
    fn test_velocity_type_code() {
        let m = msg("8D485020994409940838175B284F");
        assert_eq!(m.type_code(), Some(19));
        assert_eq!(m.parity(), None);
    }

    #[test]
    fn test_field_bit_numbering() {
        // 0x8D = 1000_1101
        let m = msg("8D4840D6202CC371C32CE0576098");
        assert_eq!(m.field(0, 1), Some(1));
        assert_eq!(m.field(1, 3), Some(0));
        assert_eq!(m.field(4, 4), Some(0xD));
        assert_eq!(m.field(0, 8), Some(0x8D));
        assert_eq!(m.field(8, 24), Some(0x4840D6));
        assert_eq!(m.field(88, 24), Some(0x576098));
        assert_eq!(m.field(100, 13), None);
        assert_eq!(m.field(0, 0), None);
    }

    #[test]
    fn test_short_message() {
        let m = msg("5D4840D6");
        assert_eq!(m.downlink_format(), 11);
        assert_eq!(m.icao_str().as_deref(), Some("4840D6"));
        assert_eq!(m.type_code(), None);
        assert_eq!(m.payload_bits(), None);

        let m = msg("8D48");
        assert_eq!(m.icao(), None);
    }

    #[test]
    fn test_payload_bits() {
        let bits = msg("8D4840D6202CC371C32CE0576098").payload_bits().unwrap();
        assert_eq!(bits.len(), 56);
        // ME starts with 0x20 = 0010_0000 → TC 4
        assert!(bits.starts_with("00100000"));
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            DecodedMessage::from_hex("ZZZZ"),
            Err(AdsbError::InvalidHex(_))
        ));
        assert!(DecodedMessage::from_hex("").is_err());
    }

    #[test]
    fn test_from_frame() {
        let frame = RawFrame::from_hex("8d4840d6202cc371c32ce0576098").unwrap();
        let m = DecodedMessage::from_frame(&frame).unwrap();
        assert_eq!(m.hex(), "8D4840D6202CC371C32CE0576098");
    }
}
