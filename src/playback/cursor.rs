//! Playback cursor: frame index, play state and the frame-time accumulator.

use serde::{Deserialize, Serialize};

use crate::cache::FrameKey;
use crate::config::MIN_FRAMES_PER_SECOND;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Result of one `tick`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickAdvance {
    pub advances: usize,
    /// The end of a non-looping sequence was reached.
    pub stopped: bool,
}

impl TickAdvance {
    pub fn moved(&self) -> bool {
        self.advances > 0 || self.stopped
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    state: PlaybackState,
    index: FrameKey,
    /// Seconds since the last frame advance, in `[0, frame_duration)` after a tick.
    accumulator: f64,
    frames_per_second: f64,
    loop_playback: bool,
}

impl PlaybackCursor {
    pub fn new(frames_per_second: f64, loop_playback: bool) -> Self {
        Self {
            state: PlaybackState::Stopped,
            index: 0,
            accumulator: 0.0,
            frames_per_second: frames_per_second.max(MIN_FRAMES_PER_SECOND),
            loop_playback,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn index(&self) -> FrameKey {
        self.index
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn frame_duration(&self) -> f64 {
        1.0 / self.frames_per_second
    }

    /// Returns false for an empty sequence.
    pub fn play(&mut self, frame_count: usize) -> bool {
        if frame_count == 0 {
            return false;
        }
        self.state = PlaybackState::Playing;
        self.index = self.index.min(frame_count - 1);
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    /// Stop and rewind to the first frame.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.index = 0;
        self.accumulator = 0.0;
    }

    /// Jump to `index`, clamped to the sequence. Returns the new index, or
    /// `None` for an empty sequence.
    pub fn set_frame(&mut self, index: FrameKey, frame_count: usize) -> Option<FrameKey> {
        let last = frame_count.checked_sub(1)?;
        self.index = index.min(last);
        Some(self.index)
    }

    /// Clamp the index after the sequence length changed.
    pub fn clamp_to(&mut self, frame_count: usize) {
        self.index = self.index.min(frame_count.saturating_sub(1));
    }

    /// Advance by elapsed time `dt` (seconds).
    ///
    /// Leftover time is carried, so several frames may advance in one tick
    /// and none are lost across ticks.
    pub fn tick(&mut self, dt: f64, frame_count: usize) -> TickAdvance {
        let mut advance = TickAdvance::default();
        if self.state != PlaybackState::Playing || frame_count == 0 {
            return advance;
        }

        let duration = self.frame_duration();
        if dt.is_finite() && dt > 0.0 {
            self.accumulator += dt;
        }
        while self.accumulator >= duration {
            self.accumulator -= duration;
            let next = self.index + 1;
            if next >= frame_count {
                if self.loop_playback {
                    self.index = 0;
                } else {
                    self.stop();
                    advance.stopped = true;
                    break;
                }
            } else {
                self.index = next;
            }
            advance.advances += 1;
        }
        advance
    }
}
