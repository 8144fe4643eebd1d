//! Latest known fields for one aircraft, and the packet published from them.
//!
//! Position is a "last resolved value": a message that fails to pair leaves
//! latitude/longitude as they were. Every other field is replaced whenever a
//! message carries a successfully decoded value for it.

use serde::Serialize;

use crate::cpr::Position;
use crate::interpret::Report;
use crate::types::*;

/// Mutable state for a single tracked aircraft.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftState {
    pub icao: Icao,
    pub callsign: Option<String>,
    pub squawk: Option<String>,
    pub category: Option<u8>,

    // Position
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude_ft: Option<i32>,
    pub altitude_source: Option<AltitudeSource>,
    pub on_ground: bool,

    // Velocity
    pub speed_kts: Option<f64>,
    pub speed_type: Option<SpeedType>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,

    // Metadata
    /// Hex of the last message applied.
    pub message: String,
    /// Receive time of the last message applied, ms since epoch.
    pub timestamp: u64,
    pub first_seen: u64,
    pub message_count: u64,
}

impl AircraftState {
    pub fn new(icao: Icao, timestamp: u64) -> Self {
        AircraftState {
            icao,
            callsign: None,
            squawk: None,
            category: None,
            lat: None,
            lon: None,
            altitude_ft: None,
            altitude_source: None,
            on_ground: false,
            speed_kts: None,
            speed_type: None,
            heading_deg: None,
            vertical_rate_fpm: None,
            message: String::new(),
            timestamp,
            first_seen: timestamp,
            message_count: 0,
        }
    }

    pub fn has_position(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    /// Merge one interpreted message into this state.
    pub fn apply(
        &mut self,
        report: &Report,
        position: Option<Position>,
        message: &str,
        timestamp: u64,
    ) {
        match report {
            Report::Identification { category, callsign } => {
                self.category = Some(*category);
                if let Ok(cs) = callsign {
                    self.callsign = Some(cs.clone());
                }
            }
            Report::Position(pos) => {
                self.on_ground = pos.is_surface();
                if let Ok(alt) = &pos.altitude {
                    self.altitude_ft = Some(alt.feet);
                    self.altitude_source = Some(alt.source);
                }
                if let Some(mv) = &pos.movement {
                    if let Some(speed) = mv.speed_kts {
                        self.speed_kts = Some(speed);
                        self.speed_type = Some(SpeedType::Ground);
                    }
                    if let Some(track) = mv.track_deg {
                        self.heading_deg = Some(track);
                    }
                }
            }
            Report::Velocity(Ok(v)) => {
                self.on_ground = false;
                if let Some(speed) = v.speed_kts {
                    self.speed_kts = Some(speed);
                    self.speed_type = Some(v.speed_type);
                }
                if let Some(hdg) = v.heading_deg {
                    self.heading_deg = Some(hdg);
                }
                if let Some(vr) = v.vertical_rate_fpm {
                    self.vertical_rate_fpm = Some(vr);
                }
            }
            Report::Velocity(Err(_)) => {}
            Report::CommBAltitude { altitude, heading } => {
                if let Ok(feet) = altitude {
                    self.altitude_ft = Some(*feet);
                    self.altitude_source = Some(AltitudeSource::Barometric);
                }
                if let Ok(hdg) = heading {
                    self.heading_deg = Some(*hdg);
                }
            }
            Report::CommBIdentity { squawk, heading } => {
                self.squawk = Some(squawk.clone());
                if let Ok(hdg) = heading {
                    self.heading_deg = Some(*hdg);
                }
            }
            Report::Other { .. } => {}
        }

        if let Some(p) = position {
            self.lat = Some(p.latitude);
            self.lon = Some(p.longitude);
        }

        self.message.clear();
        self.message.push_str(message);
        self.timestamp = timestamp;
        self.message_count += 1;
    }

    /// Snapshot of the published fields.
    pub fn packet(&self) -> Packet {
        Packet {
            icao: icao_to_string(&self.icao),
            message: self.message.clone(),
            callsign: self.callsign.clone(),
            altitude: self.altitude_ft,
            heading: self.heading_deg,
            velocity: self.speed_kts,
            vertical_rate: self.vertical_rate_fpm,
            latitude: self.lat,
            longitude: self.lon,
            squawk: self.squawk.clone(),
            on_ground: self.on_ground,
            timestamp: self.timestamp,
        }
    }
}

/// The record handed to subscribers. Absent fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub icao: String,
    pub message: String,
    pub callsign: Option<String>,
    pub altitude: Option<i32>,
    pub heading: Option<f64>,
    pub velocity: Option<f64>,
    pub vertical_rate: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub squawk: Option<String>,
    pub on_ground: bool,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
