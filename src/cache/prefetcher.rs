//! Prefetching: decides which frames should be requested around the cursor.
//!
//! Strategy: keep `[cursor - behind, cursor + ahead]` resident. Requests are
//! issued closest-first, and at equal distance frames ahead of the cursor go
//! before frames behind it, since playback moves forward.

use crate::cache::frame::{FrameKey, LoadStatus, Window};
use crate::config::PrefetchConfig;

/// A frame that should be requested now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub key: FrameKey,
    /// Distance from the cursor (lower = more urgent).
    pub distance: usize,
}

/// The prefetcher decides which frames should be proactively loaded.
#[derive(Debug, Clone)]
pub struct Prefetcher {
    config: PrefetchConfig,
}

impl Prefetcher {
    pub fn new(config: PrefetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// The window around `cursor` for a sequence of `frame_count` frames.
    pub fn window(&self, cursor: FrameKey, frame_count: usize) -> Option<Window> {
        Window::around(
            cursor,
            self.config.preload_behind,
            self.config.preload_ahead,
            frame_count,
        )
    }

    /// Unrequested keys inside the window, most urgent first.
    ///
    /// Pending, ready and failed keys are never returned, which makes
    /// repeated reconciliation idempotent.
    pub fn compute_requests(
        &self,
        window: &Window,
        status: &dyn Fn(FrameKey) -> LoadStatus,
    ) -> Vec<PrefetchRequest> {
        let mut requests: Vec<PrefetchRequest> = window
            .keys()
            .filter(|&key| status(key) == LoadStatus::Unrequested)
            .map(|key| PrefetchRequest {
                key,
                distance: window.distance(key),
            })
            .collect();

        requests.sort_by_key(|r| (r.distance, r.key < window.cursor));
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefetcher(behind: usize, ahead: usize) -> Prefetcher {
        Prefetcher::new(PrefetchConfig {
            preload_behind: behind,
            preload_ahead: ahead,
            ..Default::default()
        })
    }

    #[test]
    fn test_requests_cover_window_closest_first() {
        let prefetcher = prefetcher(1, 2);
        let window = prefetcher.window(2, 5).unwrap();

        let requests = prefetcher.compute_requests(&window, &|_| LoadStatus::Unrequested);
        let keys: Vec<_> = requests.iter().map(|r| r.key).collect();
        // cursor, then ahead before behind at distance 1, then distance 2
        assert_eq!(keys, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_skips_known_keys() {
        let prefetcher = prefetcher(1, 2);
        let window = prefetcher.window(2, 5).unwrap();

        let requests = prefetcher.compute_requests(&window, &|key| match key {
            2 => LoadStatus::Ready,
            3 => LoadStatus::Pending,
            4 => LoadStatus::Failed,
            _ => LoadStatus::Unrequested,
        });
        assert_eq!(requests, vec![PrefetchRequest { key: 1, distance: 1 }]);
    }

    #[test]
    fn test_empty_sequence_has_no_window() {
        assert!(prefetcher(1, 2).window(0, 0).is_none());
    }
}
