//! Sequence playback.
//!
//! - [`cursor`]: frame index, play state and time accumulator
//! - [`control`]: the control surface trait
//! - [`player`]: cursor + cache + renderer driven by one tick
//! - [`driver`]: tokio tick loop, command channel and status publishing

pub mod control;
pub mod cursor;
pub mod driver;
pub mod player;

pub use control::PlaybackControl;
pub use cursor::{PlaybackCursor, PlaybackState, TickAdvance};
pub use driver::{spawn_driver, DriverHandle, PlaybackCommand};
pub use player::{PlaybackStatus, PlayerTick, SequencePlayer};
