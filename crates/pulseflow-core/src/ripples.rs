//! Bounded pool of live ripples
//!
//! The pool holds what the ripple renderer is currently animating. It
//! never expires anything on its own clock: a ripple leaves when the
//! renderer reports its animation finished, when it is evicted as the
//! oldest past the cap, or when the session tears down.

use rand::RngExt;
use std::collections::VecDeque;
use tracing::trace;

/// Opaque ripple identity: spawn milliseconds in the high bits, random
/// tie-breaker in the low 20.
pub type RippleId = u64;

/// One live ripple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    /// Identity handed to the renderer
    pub id: RippleId,
    /// Spawn time in seconds on the session clock
    pub spawned_at: f64,
}

/// FIFO pool capped at `max_ripples`
#[derive(Debug)]
pub struct RipplePool {
    live: VecDeque<Ripple>,
    max_ripples: usize,
    evicted: u64,
}

impl RipplePool {
    /// Empty pool with the given cap.
    pub fn new(max_ripples: usize) -> Self {
        Self {
            live: VecDeque::with_capacity(max_ripples.min(64)),
            max_ripples,
            evicted: 0,
        }
    }

    /// Add a ripple, evicting the oldest while over the cap.
    pub fn spawn(&mut self, now: f64) -> Ripple {
        let ripple = Ripple {
            id: make_id(now),
            spawned_at: now,
        };
        self.live.push_back(ripple);
        while self.live.len() > self.max_ripples {
            let old = self.live.pop_front();
            self.evicted += 1;
            trace!("Ripple pool full, evicted {:?}", old.map(|r| r.id));
        }
        ripple
    }

    /// Remove a ripple the renderer finished animating. Returns false for
    /// ids already gone (evicted or cleared), which is not an error.
    pub fn finish(&mut self, id: RippleId) -> bool {
        let before = self.live.len();
        self.live.retain(|r| r.id != id);
        before != self.live.len()
    }

    /// Drop everything. Used on teardown and rebuild.
    pub fn clear(&mut self) {
        self.live.clear();
    }

    /// Live ripples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Ripple> {
        self.live.iter()
    }

    /// Owned copy of the live set for a frame output.
    pub fn snapshot(&self) -> Vec<Ripple> {
        self.live.iter().copied().collect()
    }

    /// Number of live ripples
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True when nothing is animating
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Configured cap
    pub fn max_ripples(&self) -> usize {
        self.max_ripples
    }

    /// Ripples pushed out by overflow since creation
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Millisecond timestamp in the high bits plus 20 random bits so ripples
/// spawned within the same millisecond stay distinct.
fn make_id(now: f64) -> RippleId {
    let millis = (now.max(0.0) * 1000.0) as u64;
    let salt = rand::rng().random::<u32>() as u64 & 0xF_FFFF;
    (millis << 20) | salt
}
