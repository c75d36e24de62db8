//! The control surface exposed to external drivers (HTTP API, tooling).

use crate::cache::FrameKey;

/// Playback controls. Every operation on an empty sequence is a silent no-op.
pub trait PlaybackControl {
    fn play(&mut self);

    /// Only affects a playing sequence.
    fn pause(&mut self);

    /// Only affects a paused sequence.
    fn resume(&mut self);

    /// Stop and rewind to the first frame.
    fn stop(&mut self);

    /// Jump to `index` (clamped). Works whether or not playback is running.
    fn set_frame(&mut self, index: FrameKey);

    /// Re-list frames from the source, dropping everything cached.
    fn reload_frames(&mut self);

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn current_frame_index(&self) -> FrameKey;
}
