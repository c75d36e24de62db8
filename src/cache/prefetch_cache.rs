//! The prefetch cache: keeps the frames around the playback cursor loaded.
//!
//! The cache is the single owner of per-key load state. It:
//! - Issues load requests for every unrequested key in the window
//! - Applies load completions drained from its channel once per tick
//! - Evicts frames outside the window and enforces the capacity bound
//! - Releases every payload exactly once (eviction, reload or teardown)
//!
//! All mutation happens on the tick thread. Loaders only ever talk back
//! through the completion channel.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::evictor::Evictor;
use crate::cache::frame::{FrameKey, LoadState, LoadStatus, RequestId, Window};
use crate::cache::prefetcher::Prefetcher;
use crate::config::PrefetchConfig;
use crate::loader::{AssetLoader, CompletionReceiver, CompletionSender, LoadCompletion, LoadRequest};
use crate::source::FrameRef;
use crate::splat::SplatFrame;

/// Cache counters for monitoring.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub requests_issued: u64,
    pub loads_succeeded: u64,
    pub loads_failed: u64,
    pub evictions: u64,
    pub releases: u64,
    /// Completions discarded because the key was evicted, reloaded or the
    /// cache was torn down.
    pub stale_discards: u64,
}

/// What happened to one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Installed(FrameKey),
    Failed(FrameKey),
    Discarded(FrameKey),
}

pub struct PrefetchCache {
    /// Load state per key. Absent = unrequested.
    entries: HashMap<FrameKey, LoadState>,

    /// The frame sequence for the current session.
    frames: Vec<FrameRef>,

    /// Last reconciled cursor position.
    cursor: FrameKey,

    prefetcher: Prefetcher,
    evictor: Evictor,
    loader: Arc<dyn AssetLoader>,

    completions_tx: CompletionSender,
    completions_rx: CompletionReceiver,

    next_request_id: RequestId,

    /// Cleared on teardown; late results are then released on arrival.
    active: bool,

    stats: CacheStats,
}

impl PrefetchCache {
    pub fn new(config: PrefetchConfig, loader: Arc<dyn AssetLoader>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            entries: HashMap::new(),
            frames: Vec::new(),
            cursor: 0,
            prefetcher: Prefetcher::new(config),
            evictor: Evictor::new(),
            loader,
            completions_tx,
            completions_rx,
            next_request_id: 0,
            active: true,
            stats: CacheStats::default(),
        }
    }

    /// Replace the frame sequence. Everything cached for the old one is released.
    pub fn set_frames(&mut self, frames: Vec<FrameRef>) {
        self.release_all();
        self.frames = frames;
        self.cursor = self.cursor.min(self.frames.len().saturating_sub(1));
    }

    pub fn frames(&self) -> &[FrameRef] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn cursor(&self) -> FrameKey {
        self.cursor
    }

    pub fn config(&self) -> &PrefetchConfig {
        self.prefetcher.config()
    }

    /// The window around the last reconciled cursor.
    pub fn window(&self) -> Option<Window> {
        self.prefetcher.window(self.cursor, self.frames.len())
    }

    /// `max(capacity, window size)` for the current window.
    pub fn allowed(&self) -> usize {
        let window = self.window().map(|w| w.len()).unwrap_or(0);
        self.config().effective_capacity().max(window)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self, key: FrameKey) -> LoadStatus {
        self.entries
            .get(&key)
            .map(LoadState::status)
            .unwrap_or(LoadStatus::Unrequested)
    }

    /// The resident payload for `key`, if ready.
    pub fn ready_payload(&self, key: FrameKey) -> Option<Arc<SplatFrame>> {
        match self.entries.get(&key) {
            Some(LoadState::Ready(handle)) => Some(handle.payload().clone()),
            _ => None,
        }
    }

    /// Pending + ready entries (what counts against capacity).
    pub fn resident_count(&self) -> usize {
        self.entries.values().filter(|s| s.is_resident()).count()
    }

    /// Keys with any entry, sorted.
    pub fn cached_keys(&self) -> Vec<FrameKey> {
        let mut keys: Vec<_> = self.entries.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Request a single key if it is unrequested. Returns true if a request was issued.
    pub fn request_frame(&mut self, key: FrameKey) -> bool {
        if !self.active || key >= self.frames.len() || self.entries.contains_key(&key) {
            return false;
        }

        let frame = self.frames[key].clone();
        if !frame.is_valid() {
            warn!(key, "Invalid frame reference, marking failed");
            self.entries.insert(key, LoadState::Failed);
            self.stats.loads_failed += 1;
            return false;
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.entries.insert(key, LoadState::Pending { request_id });
        self.stats.requests_issued += 1;

        debug!(key, request_id, asset = %frame.name, "Requested frame");
        self.loader.load(LoadRequest::new(
            key,
            request_id,
            frame,
            self.completions_tx.clone(),
        ));
        true
    }

    /// Reconcile toward the window around `cursor`: request every unrequested
    /// key inside it, then trim. Returns the number of requests issued.
    pub fn request_window(&mut self, cursor: FrameKey) -> usize {
        let Some(window) = self.prefetcher.window(cursor, self.frames.len()) else {
            return 0;
        };
        self.cursor = window.cursor;

        let requests = self
            .prefetcher
            .compute_requests(&window, &|key| self.status(key));

        let issued = requests
            .into_iter()
            .filter(|request| self.request_frame(request.key))
            .count();

        self.trim();
        issued
    }

    /// Drain and apply every completion delivered since the last call.
    pub fn poll_completions(&mut self) -> Vec<CompletionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            outcomes.push(self.on_load_complete(completion));
        }
        outcomes
    }

    /// Apply one completion.
    ///
    /// A result is installed only if it answers the key's current pending
    /// request; anything else is stale and its payload is released at once.
    pub fn on_load_complete(&mut self, completion: LoadCompletion) -> CompletionOutcome {
        let LoadCompletion {
            key,
            request_id,
            result,
        } = completion;

        if !self.active {
            if let Ok(handle) = result {
                self.loader.release(handle);
                self.stats.releases += 1;
            }
            self.stats.stale_discards += 1;
            debug!(key, request_id, "Discarded completion after teardown");
            return CompletionOutcome::Discarded(key);
        }

        let current = matches!(
            self.entries.get(&key),
            Some(LoadState::Pending { request_id: pending }) if *pending == request_id
        );

        let outcome = if !current {
            if let Ok(handle) = result {
                self.loader.release(handle);
                self.stats.releases += 1;
            }
            self.stats.stale_discards += 1;
            debug!(key, request_id, "Discarded stale completion");
            CompletionOutcome::Discarded(key)
        } else {
            match result {
                Ok(handle) => {
                    debug!(key, request_id, splats = handle.payload().count(), "Frame ready");
                    self.entries.insert(key, LoadState::Ready(handle));
                    self.stats.loads_succeeded += 1;
                    CompletionOutcome::Installed(key)
                }
                Err(e) => {
                    warn!(key, request_id, error = %e, "Frame failed to load");
                    self.entries.insert(key, LoadState::Failed);
                    self.stats.loads_failed += 1;
                    CompletionOutcome::Failed(key)
                }
            }
        };

        self.trim();
        outcome
    }

    /// Evict everything outside the window, then enforce the capacity bound
    /// among what remains outside it. Returns the number of entries removed.
    ///
    /// Keys inside the window are never touched.
    pub fn trim(&mut self) -> usize {
        let Some(window) = self.window() else {
            let removed = self.entries.len();
            self.release_all();
            return removed;
        };

        let outside: Vec<FrameKey> = self
            .entries
            .keys()
            .copied()
            .filter(|&key| !window.contains(key))
            .collect();
        let mut removed = 0;
        for key in outside {
            removed += self.evict(key) as usize;
        }

        let allowed = self.allowed();
        let resident = self.resident_count();
        if resident > allowed {
            let resident_keys: Vec<FrameKey> = self
                .entries
                .iter()
                .filter(|(_, state)| state.is_resident())
                .map(|(&key, _)| key)
                .collect();
            let victims =
                self.evictor
                    .select_victims(resident_keys.into_iter(), &window, resident - allowed);
            for victim in victims {
                removed += self.evict(victim.key) as usize;
            }
        }

        if removed > 0 {
            debug!(
                removed,
                window_start = window.start,
                window_end = window.end,
                resident = self.resident_count(),
                "Trimmed cache"
            );
        }
        removed
    }

    /// Remove one entry, releasing its payload if ready.
    fn evict(&mut self, key: FrameKey) -> bool {
        let Some(state) = self.entries.remove(&key) else {
            return false;
        };
        match state {
            LoadState::Ready(handle) => {
                self.loader.release(handle);
                self.stats.releases += 1;
                self.stats.evictions += 1;
                debug!(key, "Evicted ready frame");
            }
            LoadState::Pending { request_id } => {
                // The in-flight result is released when it arrives.
                self.stats.evictions += 1;
                debug!(key, request_id, "Evicted pending frame");
            }
            LoadState::Failed => {}
        }
        true
    }

    /// Release every cached payload and forget all pending requests.
    pub fn release_all(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let mut released = 0;
        for (_, state) in self.entries.drain() {
            if let LoadState::Ready(handle) = state {
                self.loader.release(handle);
                released += 1;
            }
        }
        self.stats.releases += released;
        info!(released, "Released all cached frames");
    }

    /// Tear down: release everything and discard any result still in flight.
    pub fn shutdown(&mut self) {
        self.active = false;
        self.release_all();
        // Results already queued are released now rather than on the next poll.
        self.poll_completions();
    }

    /// Re-enable after `shutdown`.
    pub fn enable(&mut self) {
        self.active = true;
    }
}

impl Drop for PrefetchCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
