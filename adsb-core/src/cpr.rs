//! Compact Position Reporting: global decode from an even/odd frame pair.
//!
//! Airborne frames encode latitude in 60 (even) or 59 (odd) zones over 360°;
//! surface frames use the same zone counts over 90°, so the surface decode
//! needs a reference position to pick the quadrant.
//!
//! Key constants:
//! - NZ = 15 (latitude zones per hemisphere for even frames)
//! - Nb = 17 (bits per coordinate)
//! - Dlat_even = 360 / (4 * NZ) = 6.0 degrees
//! - Dlat_odd = 360 / (4 * NZ - 1) ≈ 6.1017 degrees

use serde::Serialize;

use crate::buffer::{FrameBufferEntry, DEFAULT_TTL_MS};
use crate::message::DecodedMessage;
use crate::types::*;

/// Number of latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Bits per CPR coordinate.
const NB: u32 = 17;

/// 2^17, the scale of a raw CPR coordinate.
const CPR_MAX: f64 = (1u32 << NB) as f64;

/// A resolved position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// One CPR-encoded frame: raw 17-bit lat/lon plus its format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprFrame {
    pub lat: u32,
    pub lon: u32,
    pub parity: Parity,
}

impl CprFrame {
    pub fn from_message(msg: &DecodedMessage) -> Option<Self> {
        Some(CprFrame {
            lat: msg.cpr_lat()?,
            lon: msg.cpr_lon()?,
            parity: msg.parity()?,
        })
    }

    fn lat_frac(&self) -> f64 {
        self.lat as f64 / CPR_MAX
    }

    fn lon_frac(&self) -> f64 {
        self.lon as f64 / CPR_MAX
    }
}

/// Number of longitude zones at a given latitude (NL function).
///
/// Ranges from 59 at the equator down to 1 near the poles.
pub fn nl(lat: f64) -> i32 {
    if lat.abs() >= 87.0 {
        return 1;
    }

    let a = 1.0 - (std::f64::consts::PI / (2.0 * NZ)).cos();
    let b = (std::f64::consts::PI / 180.0 * lat.abs()).cos().powi(2);
    let nl_val = (2.0 * std::f64::consts::PI / (1.0 - a / b).acos()).floor() as i32;
    nl_val.max(1)
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Latitude zone index shared by both decodes.
fn zone_index(even: &CprFrame, odd: &CprFrame) -> f64 {
    (59.0 * even.lat_frac() - 60.0 * odd.lat_frac() + 0.5).floor()
}

/// Longitude from the newer frame of a pair, over a `span` of 360° or 90°.
fn longitude(even: &CprFrame, odd: &CprFrame, lat: f64, even_newest: bool, span: f64) -> f64 {
    let nl_val = nl(lat);
    let m = (even.lon_frac() * (nl_val - 1) as f64 - odd.lon_frac() * nl_val as f64 + 0.5).floor();
    let (ni, frac) = if even_newest {
        (nl_val.max(1), even.lon_frac())
    } else {
        ((nl_val - 1).max(1), odd.lon_frac())
    };
    span / ni as f64 * (modulo(m, ni as f64) + frac)
}

/// Airborne global decode. `even_newest` picks which frame's longitude
/// (and latitude) is reported.
pub fn airborne_global(
    even: &CprFrame,
    odd: &CprFrame,
    even_newest: bool,
) -> std::result::Result<Position, Unresolved> {
    let dlat_even = 360.0 / (4.0 * NZ);
    let dlat_odd = 360.0 / (4.0 * NZ - 1.0);

    let j = zone_index(even, odd);
    let mut lat_e = dlat_even * (modulo(j, 60.0) + even.lat_frac());
    let mut lat_o = dlat_odd * (modulo(j, 59.0) + odd.lat_frac());

    // Southern hemisphere comes out in [270, 360)
    if lat_e >= 270.0 {
        lat_e -= 360.0;
    }
    if lat_o >= 270.0 {
        lat_o -= 360.0;
    }

    if nl(lat_e) != nl(lat_o) {
        return Err(Unresolved::ZoneMismatch);
    }

    let lat = if even_newest { lat_e } else { lat_o };
    let mut lon = longitude(even, odd, lat, even_newest, 360.0);
    if lon >= 180.0 {
        lon -= 360.0;
    }

    Ok(Position {
        latitude: round6(lat),
        longitude: round6(lon),
    })
}

/// Surface global decode. Zones span 90°, so the receiver reference picks
/// the hemisphere and the nearest of the four longitude candidates.
pub fn surface_global(
    even: &CprFrame,
    odd: &CprFrame,
    even_newest: bool,
    reference: (f64, f64),
) -> std::result::Result<Position, Unresolved> {
    let (ref_lat, ref_lon) = reference;
    let dlat_even = 90.0 / (4.0 * NZ);
    let dlat_odd = 90.0 / (4.0 * NZ - 1.0);

    let j = zone_index(even, odd);
    let mut lat_e = dlat_even * (modulo(j, 60.0) + even.lat_frac());
    let mut lat_o = dlat_odd * (modulo(j, 59.0) + odd.lat_frac());
    if ref_lat <= 0.0 {
        lat_e -= 90.0;
        lat_o -= 90.0;
    }

    if nl(lat_e) != nl(lat_o) {
        return Err(Unresolved::ZoneMismatch);
    }

    let lat = if even_newest { lat_e } else { lat_o };
    let base = longitude(even, odd, lat, even_newest, 90.0);
    let lon = (0..4)
        .map(|k| modulo(base + 90.0 * k as f64 + 180.0, 360.0) - 180.0)
        .min_by(|a, b| (a - ref_lon).abs().total_cmp(&(b - ref_lon).abs()))
        .unwrap_or(base);

    Ok(Position {
        latitude: round6(lat),
        longitude: round6(lon),
    })
}

/// Pairs the current frame with a buffered one and runs the matching decode.
#[derive(Debug, Clone, Copy)]
pub struct PositionResolver {
    max_pair_age_ms: u64,
    reference: Option<(f64, f64)>,
}

impl Default for PositionResolver {
    fn default() -> Self {
        PositionResolver::new(DEFAULT_TTL_MS, None)
    }
}

impl PositionResolver {
    /// `reference` is the receiver location, needed only for surface frames.
    pub fn new(max_pair_age_ms: u64, reference: Option<(f64, f64)>) -> Self {
        PositionResolver {
            max_pair_age_ms,
            reference,
        }
    }

    /// Resolve `current` (received at `now`) against a buffered opposite-parity frame.
    pub fn resolve(
        &self,
        current: &DecodedMessage,
        now: u64,
        paired: &FrameBufferEntry,
    ) -> std::result::Result<Position, Unresolved> {
        let tc = current
            .type_code()
            .filter(|&tc| is_position_tc(tc))
            .ok_or(Unresolved::NotPosition)?;
        let cur = CprFrame::from_message(current).ok_or(Unresolved::NotPosition)?;
        let other = CprFrame::from_message(&paired.message).ok_or(Unresolved::NotPosition)?;

        if cur.parity == other.parity || current.icao() != Some(paired.icao) {
            return Err(Unresolved::NoPair);
        }
        if now.abs_diff(paired.timestamp) > self.max_pair_age_ms {
            return Err(Unresolved::PairTooOld);
        }
        let surface = is_surface_tc(tc);
        if surface != is_surface_tc(paired.type_code) {
            return Err(Unresolved::MixedSurface);
        }

        // The current frame is the newer one unless the buffer says otherwise.
        let current_newest = now >= paired.timestamp;
        let (even, odd, even_newest) = match cur.parity {
            Parity::Even => (cur, other, current_newest),
            Parity::Odd => (other, cur, !current_newest),
        };

        if surface {
            let reference = self.reference.ok_or(Unresolved::NoReference)?;
            surface_global(&even, &odd, even_newest, reference)
        } else {
            airborne_global(&even, &odd, even_newest)
        }
    }
}

/// Round to 6 decimal places.
fn round6(val: f64) -> f64 {
    (val * 1_000_000.0).round() / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EVEN: &str = "8D40621D58C382D690C8AC2863A7";
    const ODD: &str = "8D40621D58C386435CC412692AD6";
    const SURF_EVEN: &str = "8CC8200A3AC8F009BCDEF2000000";
    const SURF_ODD: &str = "8FC8200A3AB8F5F893096B000000";

    fn msg(hex: &str) -> DecodedMessage {
        DecodedMessage::from_hex(hex).unwrap()
    }

    fn entry(hex: &str, ts: u64) -> FrameBufferEntry {
        FrameBufferEntry::from_message(&msg(hex), ts).unwrap()
    }

    fn frame(lat: u32, lon: u32, parity: Parity) -> CprFrame {
        CprFrame { lat, lon, parity }
    }

    fn assert_close(pos: Position, lat: f64, lon: f64) {
        assert!(
            (pos.latitude - lat).abs() < 1e-4 && (pos.longitude - lon).abs() < 1e-4,
            "expected ({lat}, {lon}), got ({}, {})",
            pos.latitude,
            pos.longitude
        );
    }

    #[test]
    fn test_nl_equator() {
        assert_eq!(nl(0.0), 59);
    }

    #[test]
    fn test_nl_poles() {
        assert_eq!(nl(87.0), 1);
        assert_eq!(nl(-87.0), 1);
        assert_eq!(nl(90.0), 1);
    }

    #[test]
    fn test_nl_mid_latitude() {
        assert_eq!(nl(52.2572), 36);
        assert_eq!(nl(-52.2572), 36);
    }

    #[test]
    fn test_airborne_global_known_pair() {
        // "The 1090MHz Riddle": even 93000/51372, odd 74158/50194
        let even = frame(93000, 51372, Parity::Even);
        let odd = frame(74158, 50194, Parity::Odd);

        let pos = airborne_global(&even, &odd, true).unwrap();
        assert_close(pos, 52.257202, 3.919373);

        let pos = airborne_global(&even, &odd, false).unwrap();
        assert_close(pos, 52.26578, 3.938913);
    }

    #[test]
    fn test_surface_global_known_pair() {
        let even = CprFrame::from_message(&msg(SURF_EVEN)).unwrap();
        let odd = CprFrame::from_message(&msg(SURF_ODD)).unwrap();
        assert_eq!(even.parity, Parity::Even);
        assert_eq!(odd.parity, Parity::Odd);

        let pos = surface_global(&even, &odd, false, (-43.5, 172.5)).unwrap();
        assert_close(pos, -43.485644, 172.539417);
    }

    #[test]
    fn test_resolve_even_current() {
        let resolver = PositionResolver::default();
        let pos = resolver
            .resolve(&msg(EVEN), 1_000, &entry(ODD, 0))
            .unwrap();
        assert_close(pos, 52.2572, 3.9194);
    }

    #[test]
    fn test_resolve_odd_current() {
        let resolver = PositionResolver::default();
        let pos = resolver
            .resolve(&msg(ODD), 1_000, &entry(EVEN, 0))
            .unwrap();
        assert_close(pos, 52.26578, 3.938913);
    }

    #[test]
    fn test_resolve_same_parity() {
        let resolver = PositionResolver::default();
        assert_eq!(
            resolver.resolve(&msg(EVEN), 1_000, &entry(EVEN, 0)),
            Err(Unresolved::NoPair)
        );
    }

    #[test]
    fn test_resolve_pair_too_old() {
        let resolver = PositionResolver::new(10_000, None);
        assert_eq!(
            resolver.resolve(&msg(EVEN), 10_001, &entry(ODD, 0)),
            Err(Unresolved::PairTooOld)
        );
    }

    #[test]
    fn test_resolve_not_position() {
        let resolver = PositionResolver::default();
        assert_eq!(
            resolver.resolve(&msg("8D4840D6202CC371C32CE0576098"), 1_000, &entry(ODD, 0)),
            Err(Unresolved::NotPosition)
        );
    }

    #[test]
    fn test_resolve_surface_needs_reference() {
        let paired = entry(SURF_EVEN, 0);
        assert_eq!(
            PositionResolver::default().resolve(&msg(SURF_ODD), 2_000, &paired),
            Err(Unresolved::NoReference)
        );

        let resolver = PositionResolver::new(10_000, Some((-43.5, 172.5)));
        let pos = resolver.resolve(&msg(SURF_ODD), 2_000, &paired).unwrap();
        assert_close(pos, -43.485644, 172.539417);
    }

    #[test]
    fn test_zone_mismatch() {
        // Candidates land at -58.875 and -58.824, either side of the NL 30/31 edge.
        let even = frame(24_576, 0, Parity::Even);
        let odd = frame(47_104, 0, Parity::Odd);
        assert_eq!(
            airborne_global(&even, &odd, true),
            Err(Unresolved::ZoneMismatch)
        );
    }

    #[test]
    fn test_modulo_negative() {
        assert!((modulo(-1.0, 60.0) - 59.0).abs() < 1e-10);
        assert!((modulo(7.0, 3.0) - 1.0).abs() < 1e-10);
    }
}
