//! Frame decoders: turn a frame reference into a payload.
//!
//! - [`SplatFileDecoder`] reads the 32-byte-per-splat `.splat` layout,
//!   zstd-decompressing `.zst` files first.
//! - [`SyntheticDecoder`] generates deterministic frames with simulated
//!   latency and optional forced failures.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bytemuck::{Pod, Zeroable};
use tokio::fs;
use tracing::debug;

use crate::loader::LoadError;
use crate::source::FrameRef;
use crate::splat::SplatFrame;

/// Bytes per splat in the `.splat` layout.
pub const SPLAT_ROW_BYTES: usize = 32;

/// Decodes one frame. Runs on loader tasks, off the tick thread.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    async fn decode(&self, frame: &FrameRef) -> Result<SplatFrame, LoadError>;
}

/// One `.splat` row: position, scale, RGBA8 color, quantized quaternion.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct SplatRow {
    position: [f32; 3],
    scale: [f32; 3],
    color: [u8; 4],
    rotation: [u8; 4],
}

fn unquantize_rotation(q: u8) -> f32 {
    (q as f32 - 128.0) / 128.0
}

fn quantize_rotation(v: f32) -> u8 {
    (v * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8
}

/// Parse raw `.splat` bytes.
pub fn parse_splat_rows(name: &str, data: &[u8]) -> Result<SplatFrame, LoadError> {
    if data.len() % SPLAT_ROW_BYTES != 0 {
        return Err(LoadError::Malformed {
            name: name.to_string(),
            reason: format!(
                "{} bytes is not a multiple of the {SPLAT_ROW_BYTES}-byte row size",
                data.len()
            ),
        });
    }

    let count = data.len() / SPLAT_ROW_BYTES;
    let mut positions = Vec::with_capacity(count);
    let mut scales = Vec::with_capacity(count);
    let mut rotations = Vec::with_capacity(count);
    let mut colors = Vec::with_capacity(count);

    for chunk in data.chunks_exact(SPLAT_ROW_BYTES) {
        let row: SplatRow = bytemuck::pod_read_unaligned(chunk);
        positions.push(row.position);
        scales.push(row.scale);
        colors.push(row.color.map(|c| c as f32 / 255.0));
        rotations.push(row.rotation.map(unquantize_rotation));
    }

    Ok(SplatFrame::new(positions, scales, rotations, colors, 0, Vec::new())?)
}

/// Encode a frame in the `.splat` layout. SH coefficients are not stored.
pub fn encode_splat_rows(frame: &SplatFrame) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.count() * SPLAT_ROW_BYTES);
    for i in 0..frame.count() {
        let row = SplatRow {
            position: frame.positions()[i],
            scale: frame.scales()[i],
            color: frame.colors()[i].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8),
            rotation: frame.rotations()[i].map(quantize_rotation),
        };
        out.extend_from_slice(bytemuck::bytes_of(&row));
    }
    out
}

/// Reads `.splat` and `.splat.zst` files.
#[derive(Debug, Clone, Default)]
pub struct SplatFileDecoder;

impl SplatFileDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FrameDecoder for SplatFileDecoder {
    async fn decode(&self, frame: &FrameRef) -> Result<SplatFrame, LoadError> {
        let path = frame.path.clone().ok_or_else(|| LoadError::MissingPath {
            name: frame.name.clone(),
        })?;

        let raw = fs::read(&path).await?;
        let compressed = path.extension().is_some_and(|ext| ext == "zst");
        let name = frame.name.clone();

        debug!(
            path = %path.display(),
            size = raw.len(),
            compressed,
            "Read frame file"
        );

        // Decompression and parsing are CPU-bound.
        tokio::task::spawn_blocking(move || {
            let data = if compressed {
                zstd::stream::decode_all(raw.as_slice())?
            } else {
                raw
            };
            parse_splat_rows(&name, &data)
        })
        .await
        .map_err(|e| LoadError::Task(e.to_string()))?
    }
}

/// Generates frames instead of reading them.
#[derive(Debug, Clone)]
pub struct SyntheticDecoder {
    splats_per_frame: usize,
    sh_bands: u8,
    latency: Duration,
    failing: HashSet<String>,
}

impl SyntheticDecoder {
    pub fn new(splats_per_frame: usize, sh_bands: u8, latency: Duration) -> Self {
        Self {
            splats_per_frame,
            sh_bands,
            latency,
            failing: HashSet::new(),
        }
    }

    /// Make decoding of the named frame fail.
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    fn seed(name: &str) -> u64 {
        // FNV-1a
        name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
            (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }
}

#[async_trait]
impl FrameDecoder for SyntheticDecoder {
    async fn decode(&self, frame: &FrameRef) -> Result<SplatFrame, LoadError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(&frame.name) {
            return Err(LoadError::Decoder(frame.name.clone()));
        }
        Ok(SplatFrame::synthetic(
            Self::seed(&frame.name),
            self.splats_per_frame,
            self.sh_bands,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_row_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<SplatRow>(), SPLAT_ROW_BYTES);
    }

    #[test]
    fn test_parse_rejects_truncated_data() {
        let err = parse_splat_rows("broken", &[0u8; 33]).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn test_encoded_rows_parse_back() {
        let frame = SplatFrame::synthetic(5, 10, 0);
        let parsed = parse_splat_rows("f", &encode_splat_rows(&frame)).unwrap();
        assert_eq!(parsed.count(), 10);
        assert_eq!(parsed.positions(), frame.positions());
        assert_eq!(parsed.scales(), frame.scales());
        let rotation = parsed.rotations()[0];
        assert!((rotation[0] - 1.0).abs() < 0.01);
        assert_eq!(&rotation[1..], &[0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_file_decoder_reads_zstd() {
        let tmp = TempDir::new().unwrap();
        let frame = SplatFrame::synthetic(9, 64, 0);
        let raw = encode_splat_rows(&frame);

        let plain = tmp.path().join("a.splat");
        let packed = tmp.path().join("b.splat.zst");
        std::fs::write(&plain, &raw).unwrap();
        std::fs::write(&packed, zstd::encode_all(raw.as_slice(), 3).unwrap()).unwrap();

        let decoder = SplatFileDecoder::new();
        let a = decoder.decode(&FrameRef::file(&plain)).await.unwrap();
        let b = decoder.decode(&FrameRef::file(&packed)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.count(), 64);
    }

    #[tokio::test]
    async fn test_file_decoder_requires_path() {
        let decoder = SplatFileDecoder::new();
        let err = decoder.decode(&FrameRef::named("x")).await.unwrap_err();
        assert!(matches!(err, LoadError::MissingPath { .. }));
    }

    #[tokio::test]
    async fn test_synthetic_failure_injection() {
        let decoder = SyntheticDecoder::new(16, 1, Duration::ZERO).with_failure("bad");
        assert!(decoder.decode(&FrameRef::named("bad")).await.is_err());
        let frame = decoder.decode(&FrameRef::named("good")).await.unwrap();
        assert_eq!(frame.count(), 16);
        assert_eq!(frame.sh_bands(), 1);
    }
}
