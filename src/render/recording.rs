//! In-memory render sink.
//!
//! Keeps one byte buffer per channel and records every call, so uploads and
//! draws can be inspected without a GPU. Used by the headless binary and tests.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::render::{RenderParams, RenderSink, UploadRange};
use crate::splat::SplatChannel;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SinkStats {
    pub creates: u64,
    pub uploads: u64,
    pub bytes_uploaded: u64,
    pub renders: u64,
    pub last_visible_count: usize,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    buffers: HashMap<SplatChannel, Vec<u8>>,
    allocated: Option<(usize, u8)>,
    uploads: Vec<UploadRange>,
    last_render: Option<RenderParams>,
    stats: SinkStats,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(count, sh_bands)` of the current buffers.
    pub fn allocated(&self) -> Option<(usize, u8)> {
        self.allocated
    }

    /// Current contents of a channel buffer (empty if not allocated).
    pub fn channel(&self, channel: SplatChannel) -> &[u8] {
        self.buffers.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every upload since the buffers were last created.
    pub fn uploads(&self) -> &[UploadRange] {
        &self.uploads
    }

    pub fn last_render(&self) -> Option<&RenderParams> {
        self.last_render.as_ref()
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }
}

impl RenderSink for RecordingSink {
    fn create_or_resize(&mut self, count: usize, sh_bands: u8) {
        self.buffers.clear();
        self.uploads.clear();
        let channels = SplatChannel::BASE
            .into_iter()
            .chain((sh_bands > 0).then_some(SplatChannel::ShCoefficients));
        for channel in channels {
            let len = count * channel.stride(sh_bands) * channel.element_bytes();
            self.buffers.insert(channel, vec![0u8; len]);
        }
        self.allocated = Some((count, sh_bands));
        self.stats.creates += 1;
        debug!(count, sh_bands, "Created channel buffers");
    }

    fn upload_range(&mut self, range: UploadRange, data: &[u8]) {
        let element = range.channel.element_bytes();
        let Some(buffer) = self.buffers.get_mut(&range.channel) else {
            warn!(channel = %range.channel, "Upload into unallocated channel");
            return;
        };
        let start = range.dest_offset * element;
        let end = start + range.count * element;
        if end > buffer.len() || data.len() != end - start {
            warn!(
                channel = %range.channel,
                start,
                end,
                buffer = buffer.len(),
                data = data.len(),
                "Upload out of bounds"
            );
            return;
        }
        buffer[start..end].copy_from_slice(data);
        self.uploads.push(range);
        self.stats.uploads += 1;
        self.stats.bytes_uploaded += data.len() as u64;
    }

    fn render(&mut self, params: &RenderParams) {
        self.stats.renders += 1;
        self.stats.last_visible_count = params.visible_count;
        self.last_render = Some(params.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sizes_buffers() {
        let mut sink = RecordingSink::new();
        sink.create_or_resize(10, 1);
        assert_eq!(sink.channel(SplatChannel::Position).len(), 120);
        assert_eq!(sink.channel(SplatChannel::Rotation).len(), 160);
        assert_eq!(sink.channel(SplatChannel::ShCoefficients).len(), 10 * 3 * 12);

        sink.create_or_resize(10, 0);
        assert!(sink.channel(SplatChannel::ShCoefficients).is_empty());
        assert_eq!(sink.stats().creates, 2);
    }

    #[test]
    fn test_out_of_bounds_upload_ignored() {
        let mut sink = RecordingSink::new();
        sink.create_or_resize(2, 0);
        let range = UploadRange {
            channel: SplatChannel::Scale,
            dest_offset: 1,
            src_offset: 1,
            count: 2,
        };
        sink.upload_range(range, &[0u8; 24]);
        assert!(sink.uploads().is_empty());
    }
}
