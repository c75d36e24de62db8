//! HTTP server exposing the playback control surface.
//!
//! - [`control_api`]: Request/response types and route handlers
//! - [`streaming`]: SSE streaming of playback status

pub mod control_api;
pub mod streaming;
