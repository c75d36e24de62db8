//! splat-stream: windowed streaming playback of splat frame sequences.
//!
//! Plays an ordered sequence of splat frames while keeping only a window of
//! frames around the playback cursor resident:
//!   frame source → prefetch cache (async loads) → incremental upload → render
//!
//! Exposes an HTTP control API for driving playback remotely.

pub mod cache;
pub mod config;
pub mod loader;
pub mod playback;
pub mod render;
pub mod server;
pub mod source;
pub mod splat;
pub mod transfer;
