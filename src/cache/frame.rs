//! Frame keys, per-key load state and the prefetch window.
//!
//! A frame key is a position in the playback sequence. The window is the
//! contiguous range of keys around the cursor that must stay resident.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::loader::FrameHandle;

/// Position of a frame in the playback sequence (0-based, contiguous).
pub type FrameKey = usize;

/// Identifies one issued load request.
pub type RequestId = u64;

/// Load state of a key that has an entry in the cache.
///
/// `Unrequested` is represented by the absence of an entry.
#[derive(Debug)]
pub enum LoadState {
    /// Request issued, no result yet.
    Pending { request_id: RequestId },
    /// Payload resident.
    Ready(FrameHandle),
    /// Load failed; absent until the sequence is reloaded.
    Failed,
}

impl LoadState {
    pub fn status(&self) -> LoadStatus {
        match self {
            LoadState::Pending { .. } => LoadStatus::Pending,
            LoadState::Ready(_) => LoadStatus::Ready,
            LoadState::Failed => LoadStatus::Failed,
        }
    }

    /// Pending and ready entries count against cache capacity.
    pub fn is_resident(&self) -> bool {
        matches!(self, LoadState::Pending { .. } | LoadState::Ready(_))
    }
}

/// Observable summary of a key's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    Unrequested,
    Pending,
    Ready,
    Failed,
}

/// `[cursor - behind, cursor + ahead]` clamped to the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: FrameKey,
    /// Inclusive.
    pub end: FrameKey,
    pub cursor: FrameKey,
}

impl Window {
    /// Window around `cursor`, or `None` for an empty sequence.
    ///
    /// The cursor itself is clamped to the last index.
    pub fn around(cursor: FrameKey, behind: usize, ahead: usize, frame_count: usize) -> Option<Self> {
        let last = frame_count.checked_sub(1)?;
        let cursor = cursor.min(last);
        Some(Self {
            start: cursor.saturating_sub(behind),
            end: cursor.saturating_add(ahead).min(last),
            cursor,
        })
    }

    pub fn contains(&self, key: FrameKey) -> bool {
        self.start <= key && key <= self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A window always holds at least the cursor.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn keys(&self) -> RangeInclusive<FrameKey> {
        self.start..=self.end
    }

    /// `|key - cursor|`.
    pub fn distance(&self, key: FrameKey) -> usize {
        key.abs_diff(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_to_sequence() {
        // frames A..E, behind 1, ahead 2, cursor on C
        let w = Window::around(2, 1, 2, 5).unwrap();
        assert_eq!(w.keys().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(!w.contains(0));

        let w = Window::around(0, 3, 1, 5).unwrap();
        assert_eq!((w.start, w.end), (0, 1));

        let w = Window::around(4, 1, 3, 5).unwrap();
        assert_eq!((w.start, w.end), (3, 4));
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn test_window_empty_sequence() {
        assert!(Window::around(0, 1, 1, 0).is_none());
    }

    #[test]
    fn test_cursor_clamped() {
        let w = Window::around(10, 1, 1, 4).unwrap();
        assert_eq!(w.cursor, 3);
        assert_eq!((w.start, w.end), (2, 3));
        assert_eq!(w.distance(0), 3);
    }
}
