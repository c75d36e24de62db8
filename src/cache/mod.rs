//! Windowed frame cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`frame`]: frame keys, per-key load state and the prefetch window
//! - [`prefetch_cache`]: owner of load state; requests, completions, trimming
//! - [`prefetcher`]: which keys to request around the cursor, in which order
//! - [`evictor`]: distance-from-cursor victim selection

pub mod evictor;
pub mod frame;
pub mod prefetch_cache;
pub mod prefetcher;

pub use frame::{FrameKey, LoadStatus, RequestId, Window};
pub use prefetch_cache::{CacheStats, CompletionOutcome, PrefetchCache};
