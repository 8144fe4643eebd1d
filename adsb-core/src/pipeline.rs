//! The decode pipeline: framed bytes in, aircraft state out.
//!
//! Per frame: `Framed → CRC-checked → Interpreted → (Position pending |
//! Position resolved) → Published`. Anything that fails before publication
//! drops the frame and the loop moves on. Only a failing stream ends `run`.
//!
//! The pipeline owns the frame buffer and is the only writer of the
//! [`StateStore`]; readers poll the store.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::buffer::{FrameBuffer, FrameBufferEntry};
use crate::config::{Config, DecoderConfig};
use crate::cpr::{Position, PositionResolver};
use crate::crc;
use crate::framer::{Framer, RawFrame};
use crate::interpret::{interpret, PositionReport, Report};
use crate::message::{DecodedMessage, LONG_MSG_BITS};
use crate::state::Packet;
use crate::store::StateStore;
use crate::types::*;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of receive timestamps (ms since epoch).
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Record archive
// ---------------------------------------------------------------------------

/// One accepted message, as written to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub timestamp: u64,
    pub message: String,
    pub typecode: Option<u8>,
    pub icao: String,
}

/// Destination for archive records.
pub trait RecordSink: Send {
    fn record(&mut self, record: &ArchiveRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Stats / outcome
// ---------------------------------------------------------------------------

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: u64,
    pub framing_errors: u64,
    pub crc_failed: u64,
    pub undecodable: u64,
    pub decoded: u64,
    pub ignored: u64,
    pub positions: u64,
    pub unresolved: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} decoded={} positions={} unresolved={} crc_failed={} undecodable={} framing_errors={} ignored={}",
            self.frames,
            self.decoded,
            self.positions,
            self.unresolved,
            self.crc_failed,
            self.undecodable,
            self.framing_errors,
            self.ignored,
        )
    }
}

/// What happened to one accepted message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Aircraft state was updated and this packet published.
    Published(Packet),
    /// Valid DF17 with a type code that carries nothing we track.
    Ignored { type_code: u8 },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    framer: Framer,
    buffer: FrameBuffer,
    resolver: PositionResolver,
    store: StateStore,
    sink: Option<Box<dyn RecordSink>>,
    stats: PipelineStats,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("buffered", &self.buffer.len())
            .field("aircraft", &self.store.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Pipeline {
    /// `reference` is the receiver location used for surface positions.
    pub fn new(decoder: &DecoderConfig, reference: Option<(f64, f64)>, store: StateStore) -> Self {
        store.set_stale_timeout(decoder.stale_timeout_ms);
        Pipeline {
            framer: Framer::new(decoder.scan_limit),
            buffer: FrameBuffer::new(decoder.buffer_ttl_ms, decoder.buffer_capacity),
            resolver: PositionResolver::new(decoder.buffer_ttl_ms, reference),
            store,
            sink: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn from_config(config: &Config, store: StateStore) -> Self {
        Pipeline::new(&config.decoder, config.receiver.reference(), store)
    }

    /// Send every accepted message to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Decode one framed message received at `now`.
    pub fn process(&mut self, frame: &RawFrame, now: u64) -> Result<Outcome> {
        let msg = DecodedMessage::from_frame(frame)?;
        self.process_message(&msg, now)
    }

    /// Decode one message received at `now`.
    ///
    /// Errors are per-message and recoverable: the message is dropped and
    /// nothing is published.
    pub fn process_message(&mut self, msg: &DecodedMessage, now: u64) -> Result<Outcome> {
        let icao = match self.check(msg) {
            Ok(icao) => icao,
            Err(e) => {
                match e {
                    AdsbError::Crc { .. } => self.stats.crc_failed += 1,
                    _ => self.stats.undecodable += 1,
                }
                return Err(e);
            }
        };
        self.archive(msg, &icao, now);

        let report = interpret(msg)?;
        let position = match &report {
            Report::Position(pos) => self.locate(msg, &icao, pos, now),
            Report::Other { type_code } => {
                self.stats.ignored += 1;
                trace!(icao = %icao_to_string(&icao), tc = type_code, "type code not tracked");
                return Ok(Outcome::Ignored {
                    type_code: *type_code,
                });
            }
            _ => None,
        };

        let packet = self.store.update(icao, now, |state| {
            state.apply(&report, position, msg.hex(), now)
        });
        self.stats.decoded += 1;
        Ok(Outcome::Published(packet))
    }

    /// Downlink format gate and integrity check. Returns the sender's address.
    fn check(&self, msg: &DecodedMessage) -> Result<Icao> {
        let df = msg.downlink_format();
        if !matches!(df, 17 | 20 | 21) {
            return Err(AdsbError::UndecodableFormat(df));
        }
        if !msg.is_long() {
            return Err(AdsbError::InvalidLength {
                expected: LONG_MSG_BITS,
                actual: msg.bit_len(),
            });
        }
        match df {
            17 => {
                let (remainder, valid) = crc::crc24(msg.raw());
                if !valid {
                    return Err(AdsbError::Crc { remainder });
                }
                msg.icao().ok_or(AdsbError::InvalidLength {
                    expected: LONG_MSG_BITS,
                    actual: msg.bit_len(),
                })
            }
            // Comm-B parity is overlaid with the address; nothing to verify.
            _ => Ok(crc::address_parity(msg.raw())),
        }
    }

    /// Pair against the buffer, then buffer this frame for later pairing.
    fn locate(
        &mut self,
        msg: &DecodedMessage,
        icao: &Icao,
        report: &PositionReport,
        now: u64,
    ) -> Option<Position> {
        let paired = self
            .buffer
            .find_pair_for(icao, report.parity, report.type_code, now);
        let resolved = match paired {
            Some(paired) => self.resolver.resolve(msg, now, paired),
            None => Err(Unresolved::NoPair),
        };

        if let Some(entry) = FrameBufferEntry::from_message(msg, now) {
            self.buffer.insert(entry);
        }

        match resolved {
            Ok(pos) => {
                self.stats.positions += 1;
                debug!(
                    icao = %icao_to_string(icao),
                    lat = pos.latitude,
                    lon = pos.longitude,
                    "position resolved"
                );
                Some(pos)
            }
            Err(reason) => {
                self.stats.unresolved += 1;
                trace!(icao = %icao_to_string(icao), %reason, "position pending");
                None
            }
        }
    }

    fn archive(&mut self, msg: &DecodedMessage, icao: &Icao, now: u64) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let record = ArchiveRecord {
            timestamp: now,
            message: msg.hex().to_string(),
            typecode: msg.type_code().filter(|_| msg.downlink_format() == 17),
            icao: icao_to_string(icao),
        };
        if let Err(e) = sink.record(&record) {
            warn!(error = %e, "archive write failed");
        }
    }

    /// Run until the stream ends or fails, then close the store.
    ///
    /// A clean end of stream (EOF, or the socket shut down from another
    /// thread) returns `Ok`. Any other I/O error is returned.
    pub fn run<R: Read>(&mut self, stream: &mut R, clock: &dyn Clock) -> Result<PipelineStats> {
        let result = self.run_until_closed(stream, clock);
        self.store.close();
        info!(stats = %self.stats, "pipeline stopped");
        result.map(|_| self.stats)
    }

    fn run_until_closed<R: Read>(&mut self, stream: &mut R, clock: &dyn Clock) -> Result<()> {
        loop {
            let frame = match self.framer.next_frame(stream) {
                Ok(frame) => frame,
                Err(AdsbError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    info!("stream closed");
                    return Ok(());
                }
                Err(AdsbError::Io(e)) => {
                    warn!(error = %e, "stream read failed");
                    return Err(AdsbError::Io(e));
                }
                Err(e) => {
                    self.stats.framing_errors += 1;
                    debug!(error = %e, "frame dropped");
                    continue;
                }
            };
            self.stats.frames += 1;

            match self.process(&frame, clock.now_ms()) {
                Ok(_) => {}
                Err(e @ (AdsbError::Crc { .. } | AdsbError::UndecodableFormat(_))) => {
                    trace!(frame = %frame, error = %e, "message dropped");
                }
                Err(e) => {
                    debug!(frame = %frame, error = %e, "message dropped");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
