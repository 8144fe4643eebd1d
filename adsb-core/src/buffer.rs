//! Bounded, time-evicted store of recent position frames.
//!
//! Eviction runs on every insert rather than on a timer, so an entry can
//! outlive its TTL until the next insert. `find_pair` ignores such entries.

use std::collections::VecDeque;

use crate::message::DecodedMessage;
use crate::types::*;

/// Default entry lifetime (milliseconds).
pub const DEFAULT_TTL_MS: u64 = 10_000;

/// Default maximum number of buffered frames.
pub const DEFAULT_CAPACITY: usize = 4096;

/// One buffered position frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBufferEntry {
    pub icao: Icao,
    pub message: DecodedMessage,
    pub type_code: u8,
    /// Receive time, ms since epoch.
    pub timestamp: u64,
    pub parity: Parity,
}

impl FrameBufferEntry {
    /// Build an entry from a position message. `None` for anything else.
    pub fn from_message(message: &DecodedMessage, timestamp: u64) -> Option<Self> {
        Some(FrameBufferEntry {
            icao: message.icao()?,
            type_code: message.type_code()?,
            parity: message.parity()?,
            message: message.clone(),
            timestamp,
        })
    }
}

/// Recent frames, oldest first.
#[derive(Debug)]
pub struct FrameBuffer {
    entries: VecDeque<FrameBufferEntry>,
    ttl_ms: u64,
    capacity: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        FrameBuffer::new(DEFAULT_TTL_MS, DEFAULT_CAPACITY)
    }
}

impl FrameBuffer {
    pub fn new(ttl_ms: u64, capacity: usize) -> Self {
        FrameBuffer {
            entries: VecDeque::new(),
            ttl_ms,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Append, then drop everything older than the TTL relative to the new
    /// entry, then trim the oldest entries down to capacity.
    pub fn insert(&mut self, entry: FrameBufferEntry) {
        let now = entry.timestamp;
        self.entries.push_back(entry);
        self.evict_expired(now);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Most recent live entry for `icao` whose parity is opposite to `parity`.
    pub fn find_pair(&self, icao: &Icao, parity: Parity, now: u64) -> Option<&FrameBufferEntry> {
        self.find(icao, parity, now, |_| true)
    }

    /// Like [`find_pair`](Self::find_pair), but only frames of the same kind
    /// (surface or airborne) as `type_code` qualify.
    pub fn find_pair_for(
        &self,
        icao: &Icao,
        parity: Parity,
        type_code: u8,
        now: u64,
    ) -> Option<&FrameBufferEntry> {
        let surface = is_surface_tc(type_code);
        self.find(icao, parity, now, |e| is_surface_tc(e.type_code) == surface)
    }

    fn find<F>(&self, icao: &Icao, parity: Parity, now: u64, accept: F) -> Option<&FrameBufferEntry>
    where
        F: Fn(&FrameBufferEntry) -> bool,
    {
        let wanted = parity.opposite();
        self.entries.iter().rev().find(|e| {
            e.icao == *icao
                && is_position_tc(e.type_code)
                && e.parity == wanted
                && !self.is_expired(e, now)
                && accept(e)
        })
    }

    /// Remove every entry whose age at `now` exceeds the TTL.
    /// Returns how many were removed.
    pub fn evict_expired(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl_ms;
        self.entries
            .retain(|e| now.saturating_sub(e.timestamp) <= ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &FrameBufferEntry, now: u64) -> bool {
        now.saturating_sub(entry.timestamp) > self.ttl_ms
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
