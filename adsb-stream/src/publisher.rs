//! Async delivery of published packets to any number of subscribers.
//!
//! Each subscriber polls the shared store on a fixed interval and only
//! yields packets whose timestamp changed. The decode thread is never
//! blocked or woken by subscribers.

use std::collections::VecDeque;
use std::time::Duration;

use adsb_core::config::{PublishMode, PublisherConfig};
use adsb_core::{Packet, StateStore, Subscription};

#[derive(Debug, Clone)]
pub struct Publisher {
    store: StateStore,
    interval: Duration,
    mode: PublishMode,
}

impl Publisher {
    pub fn new(store: StateStore, config: &PublisherConfig) -> Self {
        Publisher {
            store,
            interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            mode: config.mode,
        }
    }

    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            subscription: self.store.subscribe(),
            interval: self.interval,
            mode: self.mode,
            pending: VecDeque::new(),
        }
    }
}

#[derive(Debug)]
pub struct Subscriber {
    subscription: Subscription,
    interval: Duration,
    mode: PublishMode,
    pending: VecDeque<Packet>,
}

impl Subscriber {
    /// Next changed packet. `None` once the store is closed and drained.
    pub async fn next(&mut self) -> Option<Packet> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Some(packet);
            }
            let batch = self.next_batch().await?;
            self.pending.extend(batch);
        }
    }

    /// Everything that changed since the last call, waiting until at least
    /// one packet is available. `None` once the store is closed and drained.
    pub async fn next_batch(&mut self) -> Option<Vec<Packet>> {
        if !self.pending.is_empty() {
            return Some(self.pending.drain(..).collect());
        }
        loop {
            // Read the flag first so writes made just before closing still drain.
            let closed = self.subscription.is_closed();
            let batch = self.poll();
            if !batch.is_empty() {
                return Some(batch);
            }
            if closed {
                return None;
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    fn poll(&mut self) -> Vec<Packet> {
        match self.mode {
            PublishMode::Latest => self.subscription.poll().into_iter().collect(),
            PublishMode::PerAircraft => self.subscription.poll_all(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
