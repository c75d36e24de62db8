//! Rendering of the active frame.
//!
//! - [`renderer`]: the per-frame upload and render state machine
//! - [`coordinator`]: explicit registry of active renderers
//! - [`recording`]: in-memory sink that records uploads and draws

pub mod coordinator;
pub mod recording;
pub mod renderer;

use serde::{Deserialize, Serialize};

use crate::splat::{Bounds, SplatChannel};

/// Column-major 4x4 object-to-world transform.
pub type Transform = [[f32; 4]; 4];

pub const IDENTITY: Transform = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// How colors are interpreted at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    /// Colors are drawn as stored.
    #[default]
    Gamma,
    /// Colors are converted from gamma to linear space before shading.
    GammaToLinear,
}

/// A contiguous copy into one channel buffer, in channel elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRange {
    pub channel: SplatChannel,
    pub dest_offset: usize,
    pub src_offset: usize,
    pub count: usize,
}

/// Everything a draw call needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderParams {
    /// Splats drawn, always a prefix of the allocated buffers.
    pub visible_count: usize,
    pub transform: Transform,
    pub bounds: Bounds,
    pub layer_mask: u32,
    pub color_space: ColorSpace,
    pub sh_degree: u8,
}

/// The GPU resource sink.
///
/// Buffers have a fixed size once created: a different splat count or SH
/// band count requires `create_or_resize` before any further upload.
pub trait RenderSink: Send {
    /// (Re)create every channel buffer for `count` splats.
    fn create_or_resize(&mut self, count: usize, sh_bands: u8);

    /// Copy `data` into the channel buffer described by `range`.
    fn upload_range(&mut self, range: UploadRange, data: &[u8]);

    fn render(&mut self, params: &RenderParams);
}
