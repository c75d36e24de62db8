//! Eviction policy: decides which cached frames to drop when over capacity.
//!
//! Retention priority is ascending distance from the cursor, so victims are
//! taken farthest-first. At equal distance a frame behind the cursor goes
//! before one ahead of it. Keys inside the window are never candidates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cache::frame::{FrameKey, Window};

/// An eviction candidate with its eviction priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub key: FrameKey,
    pub distance: usize,
    /// Key lies before the cursor.
    pub behind: bool,
}

// Greater = evicted first.
impl PartialOrd for EvictionCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.behind.cmp(&other.behind))
            .then(other.key.cmp(&self.key))
    }
}

/// The eviction policy engine.
#[derive(Debug, Clone, Default)]
pub struct Evictor;

impl Evictor {
    pub fn new() -> Self {
        Self
    }

    /// Select up to `count` keys to evict.
    ///
    /// Returns candidates ordered by eviction priority (farthest first).
    /// Keys inside `window` are excluded.
    pub fn select_victims(
        &self,
        keys: impl Iterator<Item = FrameKey>,
        window: &Window,
        count: usize,
    ) -> Vec<EvictionCandidate> {
        let mut heap: BinaryHeap<EvictionCandidate> = keys
            .filter(|&key| !window.contains(key))
            .map(|key| EvictionCandidate {
                key,
                distance: window.distance(key),
                behind: key < window.cursor,
            })
            .collect();

        let mut victims = Vec::with_capacity(count.min(heap.len()));
        while victims.len() < count {
            match heap.pop() {
                Some(candidate) => victims.push(candidate),
                None => break,
            }
        }
        victims
    }
}
