//! Shared aircraft state: one writer (the pipeline), many polling readers.
//!
//! Every write replaces an aircraft's fields and the shared "latest" packet
//! under a single write lock, so readers always see a consistent snapshot.
//! Readers never get woken; they poll and compare timestamps.
//!
//! Aircraft not heard from within the stale timeout are pruned by the writer,
//! at most once per [`PRUNE_INTERVAL_MS`] of message time.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::state::{AircraftState, Packet};
use crate::types::Icao;

/// Drop aircraft not updated for this long (ms).
pub const DEFAULT_STALE_TIMEOUT_MS: u64 = 60_000;

/// Minimum message-time gap between prune passes (ms).
pub const PRUNE_INTERVAL_MS: u64 = 1_000;

#[derive(Debug)]
struct Inner {
    aircraft: HashMap<Icao, AircraftState>,
    latest: Option<Packet>,
    closed: bool,
    stale_timeout_ms: u64,
    last_prune: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            aircraft: HashMap::new(),
            latest: None,
            closed: false,
            stale_timeout_ms: DEFAULT_STALE_TIMEOUT_MS,
            last_prune: 0,
        }
    }
}

impl Inner {
    fn prune_stale(&mut self, now: u64) -> usize {
        let timeout = self.stale_timeout_ms;
        let before = self.aircraft.len();
        self.aircraft
            .retain(|_, state| now.saturating_sub(state.timestamp) <= timeout);
        self.last_prune = now;
        before - self.aircraft.len()
    }
}

/// Cheap-to-clone handle to the shared state.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<Inner>>,
}

/// Consistent view of the store at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub latest: Option<Packet>,
    pub aircraft: Vec<Packet>,
    pub closed: bool,
}

impl StateStore {
    pub fn new() -> Self {
        StateStore::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_stale_timeout(&self, timeout_ms: u64) {
        self.write().stale_timeout_ms = timeout_ms;
    }

    /// Apply `f` to the aircraft's state (created on first sight) and
    /// publish the result as the latest packet. Returns that packet.
    ///
    /// Also prunes stale aircraft, relative to `timestamp`.
    pub fn update<F>(&self, icao: Icao, timestamp: u64, f: F) -> Packet
    where
        F: FnOnce(&mut AircraftState),
    {
        let mut inner = self.write();
        let state = inner
            .aircraft
            .entry(icao)
            .or_insert_with(|| AircraftState::new(icao, timestamp));
        f(state);
        let packet = state.packet();
        inner.latest = Some(packet.clone());

        if timestamp.saturating_sub(inner.last_prune) >= PRUNE_INTERVAL_MS {
            let pruned = inner.prune_stale(timestamp);
            if pruned > 0 {
                debug!(pruned, remaining = inner.aircraft.len(), "stale aircraft pruned");
            }
        }
        packet
    }

    /// Remove aircraft whose last update is older than the stale timeout at
    /// `now`. Returns how many were removed.
    pub fn prune_stale(&self, now: u64) -> usize {
        self.write().prune_stale(now)
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        let mut aircraft: Vec<Packet> = inner.aircraft.values().map(AircraftState::packet).collect();
        aircraft.sort_by(|a, b| a.icao.cmp(&b.icao));
        Snapshot {
            latest: inner.latest.clone(),
            aircraft,
            closed: inner.closed,
        }
    }

    /// Packet of whichever aircraft was updated last.
    pub fn latest(&self) -> Option<Packet> {
        self.read().latest.clone()
    }

    pub fn aircraft(&self, icao: &Icao) -> Option<AircraftState> {
        self.read().aircraft.get(icao).cloned()
    }

    /// All tracked aircraft, ordered by ICAO address.
    pub fn all(&self) -> Vec<AircraftState> {
        let mut all: Vec<AircraftState> = self.read().aircraft.values().cloned().collect();
        all.sort_by_key(|s| s.icao);
        all
    }

    pub fn len(&self) -> usize {
        self.read().aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().aircraft.is_empty()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            last_latest: self.latest().map(|p| p.timestamp),
            seen: HashMap::new(),
            store: self.clone(),
        }
    }

    /// Mark the stream as finished. Subscribers drain and then stop.
    pub fn close(&self) {
        self.write().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.read().closed
    }
}

/// Polling cursor over a [`StateStore`].
#[derive(Debug, Clone)]
pub struct Subscription {
    store: StateStore,
    last_latest: Option<u64>,
    seen: HashMap<Icao, u64>,
}

impl Subscription {
    /// The latest packet, if its timestamp differs from the last one returned.
    pub fn poll(&mut self) -> Option<Packet> {
        let latest = self.store.latest()?;
        if self.last_latest == Some(latest.timestamp) {
            return None;
        }
        self.last_latest = Some(latest.timestamp);
        Some(latest)
    }

    /// Every aircraft whose timestamp changed since the previous call.
    pub fn poll_all(&mut self) -> Vec<Packet> {
        let inner = self.store.read();
        self.seen.retain(|icao, _| inner.aircraft.contains_key(icao));
        let mut changed = Vec::new();
        for (icao, state) in &inner.aircraft {
            if self.seen.get(icao) != Some(&state.timestamp) {
                self.seen.insert(*icao, state.timestamp);
                changed.push(state.packet());
            }
        }
        changed.sort_by_key(|p| p.timestamp);
        changed
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
