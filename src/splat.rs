//! Splat frame payloads.
//!
//! A frame holds its splats as parallel channels (position, scale, rotation,
//! color and optional spherical-harmonics coefficients). Channels are
//! uploaded independently, so the layout is planar rather than interleaved.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest spherical-harmonics band supported by the render sink.
pub const MAX_SH_BANDS: u8 = 3;

/// Number of SH coefficients per splat (excluding the DC term) for a band count.
///
/// Each coefficient is an RGB triple, so the SH channel stride is this value
/// in `[f32; 3]` elements.
pub fn sh_bands_to_coefficient_count(bands: u8) -> usize {
    let bands = bands as usize;
    (bands + 1) * (bands + 1) - 1
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SplatFrameError {
    #[error("Channel {channel} has {actual} elements, expected {expected}")]
    ChannelLength {
        channel: SplatChannel,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported SH band count {0} (max 3)")]
    UnsupportedShBands(u8),
}

/// One logically-parallel data channel of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplatChannel {
    Position,
    Scale,
    Rotation,
    Color,
    ShCoefficients,
}

impl SplatChannel {
    /// Channels uploaded for every frame. SH coefficients are conditional.
    pub const BASE: [SplatChannel; 4] = [
        SplatChannel::Position,
        SplatChannel::Scale,
        SplatChannel::Rotation,
        SplatChannel::Color,
    ];

    /// Channel elements per splat.
    pub fn stride(&self, sh_bands: u8) -> usize {
        match self {
            SplatChannel::ShCoefficients => sh_bands_to_coefficient_count(sh_bands),
            _ => 1,
        }
    }

    /// Size of one channel element in bytes.
    pub fn element_bytes(&self) -> usize {
        match self {
            SplatChannel::Position | SplatChannel::Scale | SplatChannel::ShCoefficients => 12,
            SplatChannel::Rotation | SplatChannel::Color => 16,
        }
    }
}

impl std::fmt::Display for SplatChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplatChannel::Position => write!(f, "position"),
            SplatChannel::Scale => write!(f, "scale"),
            SplatChannel::Rotation => write!(f, "rotation"),
            SplatChannel::Color => write!(f, "color"),
            SplatChannel::ShCoefficients => write!(f, "sh"),
        }
    }
}

/// Axis-aligned bounds of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: [0.0; 3],
        max: [0.0; 3],
    };

    /// Compute bounds enclosing all positions.
    pub fn from_positions(positions: &[[f32; 3]]) -> Self {
        let Some(first) = positions.first() else {
            return Self::EMPTY;
        };
        let mut bounds = Bounds {
            min: *first,
            max: *first,
        };
        for p in &positions[1..] {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        bounds
    }
}

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SplatFrame {
    positions: Vec<[f32; 3]>,
    scales: Vec<[f32; 3]>,
    rotations: Vec<[f32; 4]>,
    colors: Vec<[f32; 4]>,
    sh_bands: u8,
    /// `count * sh_bands_to_coefficient_count(sh_bands)` RGB coefficients, splat-major.
    shs: Vec<[f32; 3]>,
    bounds: Bounds,
}

impl SplatFrame {
    /// Build a frame, validating that every channel has a consistent length.
    pub fn new(
        positions: Vec<[f32; 3]>,
        scales: Vec<[f32; 3]>,
        rotations: Vec<[f32; 4]>,
        colors: Vec<[f32; 4]>,
        sh_bands: u8,
        shs: Vec<[f32; 3]>,
    ) -> Result<Self, SplatFrameError> {
        if sh_bands > MAX_SH_BANDS {
            return Err(SplatFrameError::UnsupportedShBands(sh_bands));
        }

        let count = positions.len();
        let check = |channel: SplatChannel, actual: usize| {
            let expected = count * channel.stride(sh_bands);
            if actual == expected {
                Ok(())
            } else {
                Err(SplatFrameError::ChannelLength {
                    channel,
                    expected,
                    actual,
                })
            }
        };
        check(SplatChannel::Scale, scales.len())?;
        check(SplatChannel::Rotation, rotations.len())?;
        check(SplatChannel::Color, colors.len())?;
        check(SplatChannel::ShCoefficients, shs.len())?;

        let bounds = Bounds::from_positions(&positions);
        Ok(Self {
            positions,
            scales,
            rotations,
            colors,
            sh_bands,
            shs,
            bounds,
        })
    }

    /// Generate a deterministic frame. Used by the synthetic decoder and tests.
    pub fn synthetic(seed: u64, count: usize, sh_bands: u8) -> Self {
        let sh_bands = sh_bands.min(MAX_SH_BANDS);
        let coefficients = sh_bands_to_coefficient_count(sh_bands);

        // xorshift64*
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut next = move || {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let bits = state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 40;
            bits as f32 / (1u64 << 24) as f32
        };

        let mut positions = Vec::with_capacity(count);
        let mut scales = Vec::with_capacity(count);
        let mut rotations = Vec::with_capacity(count);
        let mut colors = Vec::with_capacity(count);
        let mut shs = Vec::with_capacity(count * coefficients);

        for _ in 0..count {
            positions.push([next() * 2.0 - 1.0, next() * 2.0 - 1.0, next() * 2.0 - 1.0]);
            scales.push([next() * 0.05, next() * 0.05, next() * 0.05]);
            rotations.push([1.0, 0.0, 0.0, 0.0]);
            colors.push([next(), next(), next(), 1.0]);
            for _ in 0..coefficients {
                shs.push([next() - 0.5, next() - 0.5, next() - 0.5]);
            }
        }

        let bounds = Bounds::from_positions(&positions);
        Self {
            positions,
            scales,
            rotations,
            colors,
            sh_bands,
            shs,
            bounds,
        }
    }

    /// Number of splats.
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    pub fn sh_bands(&self) -> u8 {
        self.sh_bands
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn scales(&self) -> &[[f32; 3]] {
        &self.scales
    }

    pub fn rotations(&self) -> &[[f32; 4]] {
        &self.rotations
    }

    pub fn colors(&self) -> &[[f32; 4]] {
        &self.colors
    }

    pub fn shs(&self) -> &[[f32; 3]] {
        &self.shs
    }

    /// Raw bytes for `count` splats of a channel starting at splat `offset`.
    ///
    /// Offsets are in splats; the SH stride is applied here.
    pub fn channel_bytes(&self, channel: SplatChannel, offset: usize, count: usize) -> &[u8] {
        let stride = channel.stride(self.sh_bands);
        let range = offset * stride..(offset + count) * stride;
        match channel {
            SplatChannel::Position => bytemuck::cast_slice(&self.positions[range]),
            SplatChannel::Scale => bytemuck::cast_slice(&self.scales[range]),
            SplatChannel::Rotation => bytemuck::cast_slice(&self.rotations[range]),
            SplatChannel::Color => bytemuck::cast_slice(&self.colors[range]),
            SplatChannel::ShCoefficients => bytemuck::cast_slice(&self.shs[range]),
        }
    }

    /// Total payload size in bytes across all channels.
    pub fn byte_size(&self) -> usize {
        self.channels()
            .map(|channel| self.count() * channel.stride(self.sh_bands) * channel.element_bytes())
            .sum()
    }

    /// Channels present in this frame, in upload order.
    pub fn channels(&self) -> impl Iterator<Item = SplatChannel> {
        let sh = (self.sh_bands > 0).then_some(SplatChannel::ShCoefficients);
        SplatChannel::BASE.into_iter().chain(sh)
    }
}
