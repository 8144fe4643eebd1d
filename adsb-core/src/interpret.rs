//! Semantic decoders for the fields of a Mode S message.
//!
//! Dispatch is by Downlink Format, then by Type Code for DF17:
//! - DF17 TC 1-4:   Aircraft identification (callsign)
//! - DF17 TC 5-8:   Surface position (movement + track, CPR lat/lon)
//! - DF17 TC 9-18:  Airborne position (barometric alt + CPR lat/lon)
//! - DF17 TC 19:    Airborne velocity (ground speed or airspeed + heading)
//! - DF17 TC 20-22: Airborne position (GNSS altitude)
//! - DF20:          Comm-B altitude reply
//! - DF21:          Comm-B identity reply (squawk)
//!
//! DF20/21 replies also carry a BDS 6,0 heading when the MB field holds one.
//!
//! Individual fields fail with a [`FieldError`] instead of a magic value, so
//! a message can still update the fields it did carry.

use serde::Serialize;

use crate::message::DecodedMessage;
use crate::types::*;

const FEET_PER_METER: f64 = 3.28084;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// An altitude reading with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Altitude {
    pub feet: i32,
    pub source: AltitudeSource,
}

/// TC 19 airborne velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Velocity {
    pub subtype: u8,
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
    pub speed_type: SpeedType,
}

/// TC 5-8 ground movement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceMovement {
    pub speed_kts: Option<f64>,
    pub track_deg: Option<f64>,
}

/// Fields carried by a position message (TC 5-18, 20-22).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub type_code: u8,
    pub parity: Parity,
    pub cpr_lat: u32,
    pub cpr_lon: u32,
    pub altitude: std::result::Result<Altitude, FieldError>,
    pub movement: Option<SurfaceMovement>,
}

impl PositionReport {
    pub fn is_surface(&self) -> bool {
        is_surface_tc(self.type_code)
    }
}

/// What a single message says, before it is merged into aircraft state.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Identification {
        category: u8,
        callsign: std::result::Result<String, FieldError>,
    },
    Position(PositionReport),
    Velocity(std::result::Result<Velocity, FieldError>),
    CommBAltitude {
        altitude: std::result::Result<i32, FieldError>,
        heading: std::result::Result<f64, FieldError>,
    },
    CommBIdentity {
        squawk: String,
        heading: std::result::Result<f64, FieldError>,
    },
    /// DF17 with a type code this pipeline does not interpret.
    Other { type_code: u8 },
}

// ---------------------------------------------------------------------------
// Callsign
// ---------------------------------------------------------------------------

/// Decode TC 1-4: eight 6-bit characters starting at bit 40.
///
/// Invalid (`#`) and padding (`_`) symbols are dropped, so the result is
/// plain alphanumeric.
pub fn decode_callsign(msg: &DecodedMessage) -> std::result::Result<String, FieldError> {
    let tc = msg.type_code().ok_or(FieldError::Unavailable("callsign"))?;
    if !(1..=4).contains(&tc) {
        return Err(FieldError::TypeCode {
            field: "callsign",
            tc,
        });
    }

    let mut callsign = String::with_capacity(8);
    for i in 0..8 {
        let idx = msg
            .field(40 + i * 6, 6)
            .ok_or(FieldError::Unavailable("callsign"))? as usize;
        match CALLSIGN_CHARSET[idx] {
            b'#' | b'_' => {}
            c => callsign.push(c as char),
        }
    }

    if callsign.is_empty() {
        return Err(FieldError::Unavailable("callsign"));
    }
    Ok(callsign)
}

/// Emitter category (bits 37-39) of an identification message.
pub fn decode_category(msg: &DecodedMessage) -> u8 {
    msg.field(37, 3).unwrap_or(0) as u8
}

// ---------------------------------------------------------------------------
// Altitude
// ---------------------------------------------------------------------------

/// Decode a 12-bit airborne altitude code (bits 40-51 of the message).
///
/// Only the 25 ft mode is accepted: with the Q-bit set, removing it leaves an
/// 11-bit count `n` and the altitude is `25n - 1000` feet.
pub fn altitude_from_code(alt_code: u16) -> std::result::Result<i32, FieldError> {
    let q_bit = (alt_code >> 4) & 1;
    if q_bit == 0 {
        return Err(FieldError::QBitClear);
    }
    let n = ((alt_code >> 5) << 4) | (alt_code & 0x0F);
    Ok(n as i32 * 25 - 1000)
}

/// Barometric altitude for TC 9-18. Q-bit is bit 47.
pub fn decode_altitude(msg: &DecodedMessage) -> std::result::Result<Altitude, FieldError> {
    let tc = msg.type_code().ok_or(FieldError::Unavailable("altitude"))?;
    if !(9..=18).contains(&tc) {
        return Err(FieldError::TypeCode {
            field: "altitude",
            tc,
        });
    }
    let code = msg.field(40, 12).ok_or(FieldError::Unavailable("altitude"))? as u16;
    Ok(Altitude {
        feet: altitude_from_code(code)?,
        source: AltitudeSource::Barometric,
    })
}

/// GNSS height for TC 20-22: the same 12 bits, in meters.
pub fn decode_gnss_altitude(msg: &DecodedMessage) -> std::result::Result<Altitude, FieldError> {
    let tc = msg.type_code().ok_or(FieldError::Unavailable("altitude"))?;
    if !(20..=22).contains(&tc) {
        return Err(FieldError::TypeCode {
            field: "gnss altitude",
            tc,
        });
    }
    let meters = msg.field(40, 12).ok_or(FieldError::Unavailable("altitude"))?;
    if meters == 0 {
        return Err(FieldError::Unavailable("gnss altitude"));
    }
    Ok(Altitude {
        feet: (meters as f64 * FEET_PER_METER).round() as i32,
        source: AltitudeSource::Gnss,
    })
}

/// Decode a 13-bit altitude code from DF20 (bits 19-31).
///
/// Layout: C1 A1 C2 A2 C4 A4 M B1 Q B2 D2 B4 D4
/// - M=1: metric, not supported
/// - Q=1: 25 ft increments
/// - Q=0: 100 ft Gillham code
pub fn decode_commb_altitude(msg: &DecodedMessage) -> std::result::Result<i32, FieldError> {
    let df = msg.downlink_format();
    if df != 20 {
        return Err(FieldError::DownlinkFormat {
            field: "altitude",
            df,
        });
    }
    let code = msg.field(19, 13).ok_or(FieldError::Unavailable("altitude"))? as u16;
    altitude_from_ac13(code)
}

/// 13-bit AC field to feet.
pub fn altitude_from_ac13(code: u16) -> std::result::Result<i32, FieldError> {
    if code == 0 {
        return Err(FieldError::Unavailable("altitude"));
    }
    if (code >> 6) & 1 == 1 {
        return Err(FieldError::Unavailable("metric altitude"));
    }
    if (code >> 4) & 1 == 1 {
        let n = ((code & 0x1F80) >> 2) | ((code & 0x0020) >> 1) | (code & 0x000F);
        return Ok(n as i32 * 25 - 1000);
    }
    gillham_altitude(code)
}

/// 100 ft Gillham (Gray) code, M and Q clear.
fn gillham_altitude(code: u16) -> std::result::Result<i32, FieldError> {
    let bit = |pos: u16| (code >> pos) & 1 == 1;
    let (c1, a1, c2, a2, c4, a4) = (bit(12), bit(11), bit(10), bit(9), bit(8), bit(7));
    let (b1, b2, d2, b4, d4) = (bit(5), bit(3), bit(2), bit(1), bit(0));

    if !(c1 || c2 || c4) {
        return Err(FieldError::Unavailable("gillham altitude"));
    }

    let mut hundreds: i32 = 0;
    if c1 {
        hundreds ^= 0x7;
    }
    if c2 {
        hundreds ^= 0x3;
    }
    if c4 {
        hundreds ^= 0x1;
    }
    // 7 and 5 are swapped in the Gray sequence
    if hundreds & 5 == 5 {
        hundreds ^= 2;
    }
    if hundreds > 5 {
        return Err(FieldError::Unavailable("gillham altitude"));
    }

    let mut five_hundreds: i32 = 0;
    for (set, mask) in [
        (d2, 0xFF),
        (d4, 0x7F),
        (a1, 0x3F),
        (a2, 0x1F),
        (a4, 0x0F),
        (b1, 0x07),
        (b2, 0x03),
        (b4, 0x01),
    ] {
        if set {
            five_hundreds ^= mask;
        }
    }

    if five_hundreds & 1 == 1 {
        hundreds = 6 - hundreds;
    }

    Ok((five_hundreds * 5 + hundreds - 13) * 100)
}

// ---------------------------------------------------------------------------
// Squawk
// ---------------------------------------------------------------------------

/// Decode DF21 identity code (bits 19-31) into a 4-digit octal squawk.
pub fn decode_squawk(msg: &DecodedMessage) -> std::result::Result<String, FieldError> {
    let df = msg.downlink_format();
    if df != 21 {
        return Err(FieldError::DownlinkFormat {
            field: "squawk",
            df,
        });
    }
    let code = msg.field(19, 13).ok_or(FieldError::Unavailable("squawk"))? as u16;
    Ok(squawk_from_code(code))
}

/// Bits are labeled C1 A1 C2 A2 C4 A4 _ B1 D1 B2 D2 B4 D4
pub fn squawk_from_code(id_code: u16) -> String {
    let b = |pos: u16| (id_code >> pos) & 1;
    let a = b(7) * 4 + b(9) * 2 + b(11);
    let bb = b(1) * 4 + b(3) * 2 + b(5);
    let c = b(8) * 4 + b(10) * 2 + b(12);
    let d = b(0) * 4 + b(2) * 2 + b(4);
    format!("{a}{bb}{c}{d}")
}

// ---------------------------------------------------------------------------
// Comm-B heading (BDS 6,0)
// ---------------------------------------------------------------------------

/// First bit of the 56-bit MB field in a DF20/21 reply.
const MB_START: usize = 32;

/// `len` bits from MB bit `pos` (1-indexed, as in the register layout).
fn mb_field(msg: &DecodedMessage, pos: usize, len: usize) -> u64 {
    msg.field(MB_START + pos - 1, len).unwrap_or(0)
}

/// Sign bit at MB `pos`, two's-complement magnitude in the next `len` bits.
fn mb_signed(msg: &DecodedMessage, pos: usize, len: usize) -> i64 {
    let value = mb_field(msg, pos + 1, len) as i64;
    if mb_field(msg, pos, 1) == 1 {
        value - (1 << len)
    } else {
        value
    }
}

/// True when the MB field plausibly holds a BDS 6,0 heading and speed report.
///
/// A clear status bit must come with an all-zero value, and whatever is
/// present must be physically reasonable: IAS at most 500 kt, Mach at most 1,
/// vertical rates within 6000 ft/min.
pub fn is_bds60(msg: &DecodedMessage) -> bool {
    // (status bit, first value bit, value width)
    const GROUPS: [(usize, usize, usize); 5] =
        [(1, 2, 11), (13, 14, 10), (24, 25, 10), (35, 36, 10), (46, 47, 10)];

    if !matches!(msg.downlink_format(), 20 | 21) || !msg.is_long() {
        return false;
    }
    if mb_field(msg, 1, 56) == 0 {
        return false;
    }
    let bad_status = GROUPS.iter().any(|&(status, first, width)| {
        mb_field(msg, status, 1) == 0 && mb_field(msg, first, width) != 0
    });
    if bad_status {
        return false;
    }

    if mb_field(msg, 13, 1) == 1 && mb_field(msg, 14, 10) > 500 {
        return false;
    }
    if mb_field(msg, 24, 1) == 1 && mb_field(msg, 25, 10) as f64 * 2.048 / 512.0 > 1.0 {
        return false;
    }
    [35, 46].iter().all(|&status| {
        mb_field(msg, status, 1) == 0 || (mb_signed(msg, status + 1, 9) * 32).abs() <= 6000
    })
}

/// Magnetic heading from a BDS 6,0 reply, in degrees [0, 360).
pub fn decode_commb_heading(msg: &DecodedMessage) -> std::result::Result<f64, FieldError> {
    let df = msg.downlink_format();
    if !matches!(df, 20 | 21) {
        return Err(FieldError::DownlinkFormat {
            field: "heading",
            df,
        });
    }
    if !is_bds60(msg) || mb_field(msg, 1, 1) == 0 {
        return Err(FieldError::Unavailable("heading"));
    }
    let heading = mb_signed(msg, 2, 10) as f64 * 90.0 / 512.0;
    Ok(round2(heading.rem_euclid(360.0)))
}

// ---------------------------------------------------------------------------
// Velocity
// ---------------------------------------------------------------------------

/// Decode TC 19: airborne velocity.
///
/// Subtypes 1/2 carry signed east-west and north-south components (offset by
/// one, 0 = unavailable); 3/4 carry heading and airspeed directly. Subtypes 2
/// and 4 are supersonic and scale speeds by 4.
pub fn decode_velocity(msg: &DecodedMessage) -> std::result::Result<Velocity, FieldError> {
    let tc = msg.type_code().ok_or(FieldError::Unavailable("velocity"))?;
    if tc != 19 {
        return Err(FieldError::TypeCode {
            field: "velocity",
            tc,
        });
    }
    let get = |start, len| msg.field(start, len).unwrap_or(0);

    let subtype = get(37, 3) as u8;
    let vertical_rate_fpm = decode_vertical_rate(get(68, 1), get(69, 9));

    match subtype {
        1 | 2 => {
            let scale = if subtype == 2 { 4.0 } else { 1.0 };
            let ew_west = get(45, 1) == 1;
            let ew_raw = get(46, 10);
            let ns_south = get(56, 1) == 1;
            let ns_raw = get(57, 10);

            let (speed, heading) = if ew_raw > 0 && ns_raw > 0 {
                let mut vx = (ew_raw - 1) as f64 * scale;
                let mut vy = (ns_raw - 1) as f64 * scale;
                if ew_west {
                    vx = -vx;
                }
                if ns_south {
                    vy = -vy;
                }
                let spd = (vx * vx + vy * vy).sqrt();
                let hdg = vx.atan2(vy).to_degrees().rem_euclid(360.0);
                (Some(round2(spd)), Some(round2(hdg)))
            } else {
                (None, None)
            };

            Ok(Velocity {
                subtype,
                speed_kts: speed,
                heading_deg: heading,
                vertical_rate_fpm,
                speed_type: SpeedType::Ground,
            })
        }
        3 | 4 => {
            let scale = if subtype == 4 { 4.0 } else { 1.0 };
            let heading = (get(45, 1) == 1).then(|| round2(get(46, 10) as f64 * 360.0 / 1024.0));
            let airspeed_raw = get(57, 10);
            let speed = (airspeed_raw > 0).then(|| (airspeed_raw - 1) as f64 * scale);

            Ok(Velocity {
                subtype,
                speed_kts: speed,
                heading_deg: heading,
                vertical_rate_fpm,
                speed_type: if get(56, 1) == 1 {
                    SpeedType::TAS
                } else {
                    SpeedType::IAS
                },
            })
        }
        _ => Err(FieldError::Unavailable("velocity subtype")),
    }
}

/// Sign bit plus 9-bit magnitude (offset by one) in 64 ft/min steps.
fn decode_vertical_rate(sign: u64, raw: u64) -> Option<i32> {
    if raw == 0 {
        return None;
    }
    let rate = (raw as i32 - 1) * 64;
    Some(if sign == 1 { -rate } else { rate })
}

// ---------------------------------------------------------------------------
// Surface movement
// ---------------------------------------------------------------------------

/// Decode TC 5-8 movement (bits 37-43) and ground track (bits 44-51).
pub fn decode_surface_movement(
    msg: &DecodedMessage,
) -> std::result::Result<SurfaceMovement, FieldError> {
    let tc = msg.type_code().ok_or(FieldError::Unavailable("movement"))?;
    if !is_surface_tc(tc) {
        return Err(FieldError::TypeCode {
            field: "movement",
            tc,
        });
    }
    let movement = msg.field(37, 7).unwrap_or(0) as u8;
    let track_deg = msg
        .flag(44)
        .then(|| round2(msg.field(45, 7).unwrap_or(0) as f64 * 360.0 / 128.0));

    Ok(SurfaceMovement {
        speed_kts: movement_speed(movement),
        track_deg,
    })
}

/// Quantized ground speed. Each row: first code, speed at that code, step.
fn movement_speed(code: u8) -> Option<f64> {
    const STEPS: [(u8, f64, f64); 6] = [
        (2, 0.125, 0.125),
        (9, 1.0, 0.25),
        (13, 2.0, 0.5),
        (39, 15.0, 1.0),
        (94, 70.0, 2.0),
        (109, 100.0, 5.0),
    ];
    match code {
        0 | 125..=u8::MAX => None,
        1 => Some(0.0),
        124 => Some(175.0),
        _ => STEPS
            .iter()
            .rev()
            .find(|(first, _, _)| code >= *first)
            .map(|(first, base, step)| base + (code - first) as f64 * step),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Interpret a message whose integrity has already been established.
///
/// Fails only with `UndecodableFormat` (DF not in {17, 20, 21}) or
/// `InvalidLength`. Field-level problems are carried inside the report.
pub fn interpret(msg: &DecodedMessage) -> Result<Report> {
    if !msg.is_long() {
        return Err(AdsbError::InvalidLength {
            expected: crate::message::LONG_MSG_BITS,
            actual: msg.bit_len(),
        });
    }

    match msg.downlink_format() {
        17 => {
            let tc = msg.type_code().unwrap_or(0);
            Ok(match tc {
                1..=4 => Report::Identification {
                    category: decode_category(msg),
                    callsign: decode_callsign(msg),
                },
                5..=18 | 20..=22 => Report::Position(position_report(msg, tc)),
                19 => Report::Velocity(decode_velocity(msg)),
                _ => Report::Other { type_code: tc },
            })
        }
        20 => Ok(Report::CommBAltitude {
            altitude: decode_commb_altitude(msg),
            heading: decode_commb_heading(msg),
        }),
        21 => Ok(Report::CommBIdentity {
            squawk: decode_squawk(msg)?,
            heading: decode_commb_heading(msg),
        }),
        df => Err(AdsbError::UndecodableFormat(df)),
    }
}

fn position_report(msg: &DecodedMessage, tc: u8) -> PositionReport {
    let altitude = match tc {
        9..=18 => decode_altitude(msg),
        20..=22 => decode_gnss_altitude(msg),
        _ => Err(FieldError::TypeCode {
            field: "altitude",
            tc,
        }),
    };

    PositionReport {
        type_code: tc,
        parity: msg.parity().unwrap_or(Parity::Even),
        cpr_lat: msg.cpr_lat().unwrap_or(0),
        cpr_lon: msg.cpr_lon().unwrap_or(0),
        altitude,
        movement: decode_surface_movement(msg).ok(),
    }
}

/// Round to 2 decimal places.
fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(hex: &str) -> DecodedMessage {
        DecodedMessage::from_hex(hex).expect("valid hex")
    }

    /// Overwrite `len` bits at `start` in a hex message.
    fn with_field(hex: &str, start: usize, len: usize, value: u64) -> DecodedMessage {
        let mut raw = hex_decode(hex).unwrap();
        for i in 0..len {
            let pos = start + i;
            let bit = (value >> (len - 1 - i)) & 1;
            let mask = 0x80u8 >> (pos % 8);
            if bit == 1 {
                raw[pos / 8] |= mask;
            } else {
                raw[pos / 8] &= !mask;
            }
        }
        parse(&hex_encode(&raw))
    }

    // -- Identification --

    #[test]
    fn test_decode_callsign_klm() {
        let m = parse("8D4840D6202CC371C32CE0576098");
        assert_eq!(decode_callsign(&m).unwrap(), "KLM1023");
    }

    #[test]
    fn test_decode_callsign_ezy() {
        let m = parse("8D406B902015A678D4D220AA4BDA");
        let cs = decode_callsign(&m).unwrap();
        assert_eq!(cs, "EZY85MH");
        assert!(cs.len() <= 8);
        assert!(!cs.contains('#') && !cs.ends_with(' ') && !cs.ends_with('_'));
    }

    #[test]
    fn test_callsign_wrong_type_code() {
        let m = parse("8D40621D58C382D690C8AC2863A7");
        assert_eq!(
            decode_callsign(&m),
            Err(FieldError::TypeCode {
                field: "callsign",
                tc: 11
            })
        );
    }

    #[test]
    fn test_callsign_drops_padding_inside() {
        // Fourth character → '_' (index 32): "KLM_023" reads "KLM023".
        let m = with_field("8D4840D6202CC371C32CE0576098", 58, 6, 32);
        let cs = decode_callsign(&m).unwrap();
        assert_eq!(cs, "KLM023");
        assert!(cs.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_callsign_strips_invalid_symbols() {
        // Last two characters → '#' (index 0) and '_' (index 32).
        let m = with_field("8D4840D6202CC371C32CE0576098", 76, 12, 0b000000_100000);
        assert_eq!(decode_callsign(&m).unwrap(), "KLM102");
    }

    // -- Altitude --

    #[test]
    fn test_decode_altitude_known_frame() {
        let m = parse("8D40621D58C382D690C8AC2863A7");
        let alt = decode_altitude(&m).unwrap();
        assert_eq!(alt.feet, 38000);
        assert_eq!(alt.source, AltitudeSource::Barometric);
    }

    #[test]
    fn test_altitude_from_code_exact() {
        // n = 1536 → 25 * 1536 - 1000 = 37400
        let n: u16 = 1536;
        let code = ((n >> 4) << 5) | (1 << 4) | (n & 0x0F);
        assert_eq!(altitude_from_code(code), Ok(37400));
        assert_eq!(altitude_from_code(0xC38), Ok(38000));
    }

    #[test]
    fn test_altitude_q_bit_clear() {
        assert_eq!(altitude_from_code(0xC28), Err(FieldError::QBitClear));
        // Q-bit is message bit 47.
        let m = with_field("8D40621D58C382D690C8AC2863A7", 47, 1, 0);
        assert_eq!(decode_altitude(&m), Err(FieldError::QBitClear));
    }

    #[test]
    fn test_altitude_wrong_type_code() {
        let m = parse("8D4840D6202CC371C32CE0576098");
        assert!(matches!(
            decode_altitude(&m),
            Err(FieldError::TypeCode { tc: 4, .. })
        ));
    }

    #[test]
    fn test_gnss_altitude() {
        // Turn the airborne position into TC 20 with 1000 m height.
        let m = with_field("8D40621D58C382D690C8AC2863A7", 32, 5, 20);
        let m = with_field(m.hex(), 40, 12, 1000);
        let alt = decode_gnss_altitude(&m).unwrap();
        assert_eq!(alt.feet, 3281);
        assert_eq!(alt.source, AltitudeSource::Gnss);
        assert!(decode_altitude(&m).is_err());
    }

    #[test]
    fn test_ac13_25ft_mode() {
        // Q-bit set, M clear: n = 1560 → 38000 ft
        // 11-bit n split as 6 | M | 1 | Q | 4 bits.
        let n: u16 = 1560;
        let code = ((n & 0x7E0) << 2) | ((n & 0x010) << 1) | (1 << 4) | (n & 0x0F);
        assert_eq!(altitude_from_ac13(code), Ok(38000));
    }

    #[test]
    fn test_ac13_metric_and_zero() {
        assert!(altitude_from_ac13(0).is_err());
        assert!(altitude_from_ac13(1 << 6).is_err());
    }

    #[test]
    fn test_gillham_sequence() {
        const C1: u16 = 1 << 12;
        const C2: u16 = 1 << 10;
        const C4: u16 = 1 << 8;
        const B4: u16 = 1 << 1;
        assert_eq!(altitude_from_ac13(C4), Ok(-1200));
        assert_eq!(altitude_from_ac13(C2 | C4), Ok(-1100));
        assert_eq!(altitude_from_ac13(C2), Ok(-1000));
        assert_eq!(altitude_from_ac13(C1 | C2), Ok(-900));
        assert_eq!(altitude_from_ac13(C1), Ok(-800));
        assert_eq!(altitude_from_ac13(B4 | C1), Ok(-700));
        assert_eq!(altitude_from_ac13(B4 | C4), Ok(-300));
    }

    #[test]
    fn test_gillham_range() {
        let mut valid = 0;
        for code in 0..0x2000u16 {
            if (code >> 4) & 1 == 1 || (code >> 6) & 1 == 1 {
                continue;
            }
            if let Ok(alt) = altitude_from_ac13(code) {
                assert_eq!(alt % 100, 0);
                assert!((-1200..=126_700).contains(&alt), "0x{code:04X} → {alt}");
                valid += 1;
            }
        }
        assert!(valid > 0);
    }

    // -- Squawk --

    #[test]
    fn test_squawk_codes() {
        assert_eq!(squawk_from_code(0b0_1_0_1_0_1_0_1_0_0_0_1_0), "7500");
        assert_eq!(squawk_from_code(0b0_1_0_1_0_1_0_0_0_1_0_1_0), "7600");
        assert_eq!(squawk_from_code(0b0_1_0_1_0_1_0_1_0_1_0_1_0), "7700");
        assert_eq!(squawk_from_code(0), "0000");
    }

    #[test]
    fn test_commb_dispatch() {
        // DF21 (0xA8) with identity 7700 in bits 19-31.
        let m = with_field(
            &format!("A8{}", "0".repeat(26)),
            19,
            13,
            0b0_1_0_1_0_1_0_1_0_1_0_1_0,
        );
        assert_eq!(m.downlink_format(), 21);
        assert_eq!(
            interpret(&m).unwrap(),
            Report::CommBIdentity {
                squawk: "7700".into(),
                heading: Err(FieldError::Unavailable("heading")),
            }
        );
        assert!(decode_commb_altitude(&m).is_err());
    }

    // -- Comm-B heading --

    const BDS60: &str = "A00004128F39F91A7E27C46ADC21";

    #[test]
    fn test_commb_heading_known_reply() {
        let m = parse(BDS60);
        assert_eq!(m.downlink_format(), 20);
        assert!(is_bds60(&m));
        assert_eq!(decode_commb_heading(&m), Ok(42.71));

        match interpret(&m).unwrap() {
            Report::CommBAltitude { heading, .. } => assert_eq!(heading, Ok(42.71)),
            other => panic!("expected Comm-B altitude, got {other:?}"),
        }
    }

    #[test]
    fn test_commb_heading_negative_wraps() {
        // Sign bit set: (243 - 1024) * 90 / 512 = -137.29 → 222.71
        let m = with_field(BDS60, 33, 1, 1);
        assert_eq!(decode_commb_heading(&m), Ok(222.71));
    }

    #[test]
    fn test_commb_heading_rejects_inconsistent_status() {
        // IAS status cleared while its value is still non-zero.
        let m = with_field(BDS60, 44, 1, 0);
        assert!(!is_bds60(&m));
        assert_eq!(
            decode_commb_heading(&m),
            Err(FieldError::Unavailable("heading"))
        );
    }

    #[test]
    fn test_commb_heading_rejects_implausible_speed() {
        // IAS 1000 kt
        let m = with_field(BDS60, 45, 10, 1000);
        assert!(!is_bds60(&m));
    }

    #[test]
    fn test_commb_heading_requires_commb() {
        assert_eq!(
            decode_commb_heading(&parse("8D4840D6202CC371C32CE0576098")),
            Err(FieldError::DownlinkFormat {
                field: "heading",
                df: 17
            })
        );
    }

    // -- Velocity --

    #[test]
    fn test_decode_velocity_ground() {
        let m = parse("8D485020994409940838175B284F");
        let v = decode_velocity(&m).unwrap();
        assert_eq!(v.subtype, 1);
        assert_eq!(v.speed_type, SpeedType::Ground);

        let speed = v.speed_kts.unwrap();
        assert!((speed - 159.2).abs() < 0.1, "speed ~159.2, got {speed}");
        let heading = v.heading_deg.unwrap();
        assert!((heading - 182.88).abs() < 0.1, "heading ~182.88, got {heading}");
        assert_eq!(v.vertical_rate_fpm, Some(-832));
    }

    #[test]
    fn test_decode_velocity_airspeed() {
        // Subtype 3, heading status set, heading raw 256 → 90°, TAS 251 → 250 kt,
        // climbing 10 * 64 ft/min.
        let base = "8D485020994409940838175B284F";
        let m = with_field(base, 37, 3, 3);
        let m = with_field(m.hex(), 45, 11, (1 << 10) | 256);
        let m = with_field(m.hex(), 56, 11, (1 << 10) | 251);
        let m = with_field(m.hex(), 68, 10, 11);

        let v = decode_velocity(&m).unwrap();
        assert_eq!(v.speed_type, SpeedType::TAS);
        assert_eq!(v.heading_deg, Some(90.0));
        assert_eq!(v.speed_kts, Some(250.0));
        assert_eq!(v.vertical_rate_fpm, Some(640));
    }

    #[test]
    fn test_velocity_bad_subtype() {
        let m = with_field("8D485020994409940838175B284F", 37, 3, 0);
        assert_eq!(
            decode_velocity(&m),
            Err(FieldError::Unavailable("velocity subtype"))
        );
    }

    #[test]
    fn test_heading_normalised() {
        // West + South components → heading in third quadrant, never negative.
        let m = with_field("8D485020994409940838175B284F", 45, 11, (1 << 10) | 101);
        let m = with_field(m.hex(), 56, 11, (1 << 10) | 101);
        let v = decode_velocity(&m).unwrap();
        assert_eq!(v.heading_deg, Some(225.0));
    }

    // -- Surface --

    #[test]
    fn test_movement_speed_table() {
        assert_eq!(movement_speed(0), None);
        assert_eq!(movement_speed(1), Some(0.0));
        assert_eq!(movement_speed(2), Some(0.125));
        assert_eq!(movement_speed(9), Some(1.0));
        assert_eq!(movement_speed(38), Some(14.5));
        assert_eq!(movement_speed(39), Some(15.0));
        assert_eq!(movement_speed(124), Some(175.0));
        assert_eq!(movement_speed(125), None);
    }

    #[test]
    fn test_decode_surface_movement() {
        // TC 7, movement 39 (15 kt), track valid, raw 32 → 90°
        let m = with_field("8D40621D58C382D690C8AC2863A7", 32, 5, 7);
        let m = with_field(m.hex(), 37, 7, 39);
        let m = with_field(m.hex(), 44, 8, (1 << 7) | 32);
        let mv = decode_surface_movement(&m).unwrap();
        assert_eq!(mv.speed_kts, Some(15.0));
        assert_eq!(mv.track_deg, Some(90.0));
    }

    // -- Dispatch --

    #[test]
    fn test_interpret_routes() {
        assert!(matches!(
            interpret(&parse("8D4840D6202CC371C32CE0576098")).unwrap(),
            Report::Identification { .. }
        ));
        assert!(matches!(
            interpret(&parse("8D485020994409940838175B284F")).unwrap(),
            Report::Velocity(Ok(_))
        ));
        match interpret(&parse("8D40621D58C382D690C8AC2863A7")).unwrap() {
            Report::Position(p) => {
                assert_eq!(p.type_code, 11);
                assert_eq!(p.parity, Parity::Even);
                assert_eq!(p.cpr_lat, 93000);
                assert!(!p.is_surface());
                assert_eq!(p.altitude.as_ref().unwrap().feet, 38000);
                assert!(p.movement.is_none());
            }
            other => panic!("expected position, got {other:?}"),
        }
    }

    #[test]
    fn test_interpret_other_type_code() {
        let m = with_field("8D4840D6202CC371C32CE0576098", 32, 5, 28);
        assert_eq!(interpret(&m).unwrap(), Report::Other { type_code: 28 });
    }

    #[test]
    fn test_interpret_undecodable_format() {
        // DF4 padded to 112 bits
        let m = parse(&format!("20{}", "0".repeat(26)));
        assert!(matches!(
            interpret(&m),
            Err(AdsbError::UndecodableFormat(4))
        ));
    }
}
