//! CRC-24 validation for Mode S messages.
//!
//! ICAO standard polynomial: x^24 + x^23 + x^22 + ... + x^10 + x^3 + 1
//! Generator (25 bits): 0x1FFF409, stored left-aligned in a 32-bit window.
//!
//! For DF17 (ADS-B): last 24 bits are pure CRC. Valid frames → remainder 0.
//! For DF20/21 (Comm-B): last 24 bits are CRC XOR'd with the ICAO address,
//! so the remainder *is* the address rather than a validity signal.

use crate::types::{hex_decode, icao_from_u32, Icao};

/// Generator pattern `FF FA 04 80`: the 25 polynomial bits followed by padding.
const GENERATOR: u32 = 0xFFFA_0480;

/// Number of trailing parity bytes.
const PARITY_BYTES: usize = 3;

/// Mode S CRC-24 by long division.
///
/// Slides the generator across every bit of the data bytes (all but the
/// final 3). Whenever the leading bit is set, the 4-byte window starting at
/// that byte is XOR'd with the generator shifted to line up with it. What
/// is left in the last 3 bytes is the remainder.
///
/// Returns `(remainder, valid)`; `valid` is true iff the remainder is 0.
pub fn crc24(data: &[u8]) -> (u32, bool) {
    let remainder = remainder(data);
    (remainder, remainder == 0)
}

/// Remainder of the division, without the validity flag.
pub fn remainder(data: &[u8]) -> u32 {
    if data.len() <= PARITY_BYTES {
        return data.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32) & 0xFF_FFFF;
    }

    let mut buf = data.to_vec();
    let data_len = buf.len() - PARITY_BYTES;

    for i in 0..data_len {
        for bit in 0..8 {
            if buf[i] & (0x80 >> bit) == 0 {
                continue;
            }
            let window = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]])
                ^ (GENERATOR >> bit);
            buf[i..i + 4].copy_from_slice(&window.to_be_bytes());
        }
    }

    let n = buf.len();
    (buf[n - 3] as u32) << 16 | (buf[n - 2] as u32) << 8 | buf[n - 1] as u32
}

/// Validate a Mode S message (hex string). Returns true if CRC remainder is 0.
pub fn validate(msg_hex: &str) -> bool {
    match hex_decode(msg_hex) {
        Some(data) if data.len() > PARITY_BYTES => crc24(&data).1,
        _ => false,
    }
}

/// Recover the ICAO address from an Address/Parity field (DF20/21).
///
/// The transponder XORs its address into the parity, so the remainder of a
/// clean message is the address itself.
pub fn address_parity(data: &[u8]) -> Icao {
    icao_from_u32(remainder(data))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{hex_decode, hex_encode};

    const VALID_FRAMES: &[&str] = &[
        "8D4840D6202CC371C32CE0576098",
        "8D40621D58C382D690C8AC2863A7",
        "8D40621D58C386435CC412692AD6",
        "8D485020994409940838175B284F",
        "8D406B902015A678D4D220AA4BDA",
    ];

    #[test]
    fn test_valid_df17_remainder_zero() {
        for hex in VALID_FRAMES {
            let data = hex_decode(hex).unwrap();
            assert_eq!(crc24(&data), (0, true), "CRC should be 0 for valid DF17: {hex}");
        }
    }

    #[test]
    fn test_validate_hex() {
        for hex in VALID_FRAMES {
            assert!(validate(hex), "validate() should return true for: {hex}");
        }
        assert!(validate(&VALID_FRAMES[0].to_lowercase()));
    }

    #[test]
    fn test_every_single_bit_flip_detected() {
        let clean = hex_decode(VALID_FRAMES[0]).unwrap();
        for bit in 0..112 {
            let mut data = clean.clone();
            data[bit / 8] ^= 0x80 >> (bit % 8);
            let (rem, valid) = crc24(&data);
            assert!(!valid, "flipping bit {bit} left remainder zero");
            assert_ne!(rem, 0);
        }
    }

    #[test]
    fn test_parity_bit_flip_shows_in_remainder() {
        // Errors confined to the parity bytes pass straight through.
        let mut data = hex_decode(VALID_FRAMES[1]).unwrap();
        data[13] ^= 0x01;
        assert_eq!(remainder(&data), 0x000001);
    }

    #[test]
    fn test_validate_corrupted() {
        let mut data = hex_decode(VALID_FRAMES[0]).unwrap();
        data[5] ^= 0x01;
        assert!(!validate(&hex_encode(&data)));
    }

    #[test]
    fn test_validate_garbage() {
        assert!(!validate(""));
        assert!(!validate("8D48"));
        assert!(!validate("not hex at all!"));
    }

    #[test]
    fn test_address_parity_recovers_xored_address() {
        // Build a Comm-B style message: take a valid DF17 frame, XOR an
        // address into its parity and check we get that address back.
        let mut data = hex_decode(VALID_FRAMES[0]).unwrap();
        let icao = [0xAB, 0xCD, 0xEF];
        data[11] ^= icao[0];
        data[12] ^= icao[1];
        data[13] ^= icao[2];
        assert_eq!(address_parity(&data), icao);
    }

    #[test]
    fn test_short_input() {
        assert_eq!(remainder(&[0x01, 0x02, 0x03]), 0x010203);
        assert_eq!(remainder(&[]), 0);
    }
}
