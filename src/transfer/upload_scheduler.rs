//! Incremental upload scheduler.
//!
//! Uploads the active frame into the render sink in batches of at most
//! `batch_limit` splats, one batch per tick, so a frame switch never costs
//! more than one bounded copy per tick. Every channel of a batch is copied
//! together, so the uploaded prefix is always consistent across channels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::UploadConfig;
use crate::render::{RenderSink, UploadRange};
use crate::splat::SplatFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// The whole frame is uploaded when it becomes active.
    Synchronous,
    /// One batch per tick.
    Incremental,
}

/// When a partially uploaded frame may be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// Only once every splat is uploaded.
    Strict,
    /// As soon as any prefix is uploaded; only that prefix is drawn.
    Progressive,
}

/// Upload progress of the active frame. `offset <= total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadCursor {
    pub total: usize,
    pub offset: usize,
    pub batch_limit: usize,
}

impl UploadCursor {
    pub fn new(total: usize, batch_limit: usize) -> Self {
        Self {
            total,
            offset: 0,
            batch_limit: batch_limit.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.total - self.offset
    }

    pub fn is_complete(&self) -> bool {
        self.offset == self.total
    }

    /// Claim the next batch and advance past it.
    fn advance(&mut self) -> Option<UploadBatch> {
        if self.is_complete() {
            return None;
        }
        let batch = UploadBatch {
            offset: self.offset,
            count: self.batch_limit.min(self.remaining()),
        };
        self.offset += batch.count;
        Some(batch)
    }

    fn finish(&mut self) -> Option<UploadBatch> {
        if self.is_complete() {
            return None;
        }
        let batch = UploadBatch {
            offset: self.offset,
            count: self.remaining(),
        };
        self.offset = self.total;
        Some(batch)
    }
}

/// A range of splats copied in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadBatch {
    pub offset: usize,
    pub count: usize,
}

impl UploadBatch {
    pub fn end(&self) -> usize {
        self.offset + self.count
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadStats {
    pub frames_begun: u64,
    pub frames_completed: u64,
    pub batches: u64,
    pub splats_uploaded: u64,
    pub bytes_uploaded: u64,
}

pub struct UploadScheduler {
    mode: UploadMode,
    policy: RenderPolicy,
    batch_limit: usize,
    payload: Option<Arc<SplatFrame>>,
    cursor: Option<UploadCursor>,
    stats: UploadStats,
}

impl UploadScheduler {
    pub fn new(mode: UploadMode, policy: RenderPolicy, batch_limit: usize) -> Self {
        Self {
            mode,
            policy,
            batch_limit: batch_limit.max(1),
            payload: None,
            cursor: None,
            stats: UploadStats::default(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        let mode = if config.async_upload {
            UploadMode::Incremental
        } else {
            UploadMode::Synchronous
        };
        let policy = if config.render_before_upload_complete {
            RenderPolicy::Progressive
        } else {
            RenderPolicy::Strict
        };
        Self::new(mode, policy, config.upload_batch_size)
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    pub fn policy(&self) -> RenderPolicy {
        self.policy
    }

    pub fn cursor(&self) -> Option<&UploadCursor> {
        self.cursor.as_ref()
    }

    pub fn payload(&self) -> Option<&Arc<SplatFrame>> {
        self.payload.as_ref()
    }

    pub fn stats(&self) -> &UploadStats {
        &self.stats
    }

    /// Make `payload` the active frame and restart its upload from zero.
    ///
    /// The sink must already hold resources sized for this payload. In
    /// synchronous mode the whole frame is uploaded here.
    pub fn begin_frame<S: RenderSink + ?Sized>(&mut self, payload: Arc<SplatFrame>, sink: &mut S) {
        let mut cursor = UploadCursor::new(payload.count(), self.batch_limit);
        self.stats.frames_begun += 1;
        debug!(
            total = cursor.total,
            batch_limit = cursor.batch_limit,
            mode = ?self.mode,
            "Upload started"
        );

        if self.mode == UploadMode::Synchronous {
            if let Some(batch) = cursor.finish() {
                self.upload_batch(&payload, batch, sink);
                self.stats.frames_completed += 1;
            }
        }

        self.cursor = Some(cursor);
        self.payload = Some(payload);
    }

    /// Upload the next batch, if any remains. Call at most once per tick.
    pub fn step<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> Option<UploadBatch> {
        let payload = self.payload.clone()?;
        let batch = self.cursor.as_mut()?.advance()?;
        self.upload_batch(&payload, batch, sink);

        if batch.end() == payload.count() {
            self.stats.frames_completed += 1;
            info!(total = payload.count(), "Upload complete");
        }
        Some(batch)
    }

    fn upload_batch<S: RenderSink + ?Sized>(
        &mut self,
        payload: &SplatFrame,
        batch: UploadBatch,
        sink: &mut S,
    ) {
        for channel in payload.channels() {
            let stride = channel.stride(payload.sh_bands());
            let data = payload.channel_bytes(channel, batch.offset, batch.count);
            sink.upload_range(
                UploadRange {
                    channel,
                    dest_offset: batch.offset * stride,
                    src_offset: batch.offset * stride,
                    count: batch.count * stride,
                },
                data,
            );
            self.stats.bytes_uploaded += data.len() as u64;
        }
        self.stats.batches += 1;
        self.stats.splats_uploaded += batch.count as u64;
        debug!(offset = batch.offset, count = batch.count, "Uploaded batch");
    }

    pub fn has_pending(&self) -> bool {
        self.cursor.is_some_and(|c| !c.is_complete())
    }

    /// Whether the active frame may be drawn this tick.
    ///
    /// An empty frame is never drawable.
    pub fn is_render_eligible(&self) -> bool {
        let Some(cursor) = self.cursor else {
            return false;
        };
        if cursor.total == 0 {
            return false;
        }
        match self.policy {
            RenderPolicy::Strict => cursor.is_complete(),
            RenderPolicy::Progressive => cursor.offset > 0,
        }
    }

    /// Splats that may be drawn: the uploaded prefix, or zero.
    pub fn visible_count(&self) -> usize {
        match self.cursor {
            Some(cursor) if self.is_render_eligible() => cursor.offset,
            _ => 0,
        }
    }

    /// Drop the active frame.
    pub fn clear(&mut self) {
        self.cursor = None;
        self.payload = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingSink;
    use crate::splat::SplatChannel;

    fn frame(count: usize, sh_bands: u8) -> Arc<SplatFrame> {
        Arc::new(SplatFrame::synthetic(7, count, sh_bands))
    }

    #[test]
    fn test_batches_advance_to_total_exactly() {
        let mut sink = RecordingSink::new();
        let payload = frame(100_000, 0);
        sink.create_or_resize(payload.count(), 0);

        let mut scheduler = UploadScheduler::new(UploadMode::Incremental, RenderPolicy::Strict, 40_000);
        scheduler.begin_frame(payload, &mut sink);
        assert_eq!(scheduler.cursor().unwrap().offset, 0);

        let mut offsets = Vec::new();
        while let Some(batch) = scheduler.step(&mut sink) {
            offsets.push(batch.end());
        }
        assert_eq!(offsets, vec![40_000, 80_000, 100_000]);
        assert_eq!(scheduler.cursor().unwrap().offset, 100_000);
        assert!(scheduler.step(&mut sink).is_none());
        assert_eq!(scheduler.stats().frames_completed, 1);
    }

    #[test]
    fn test_synchronous_uploads_everything_at_once() {
        let mut sink = RecordingSink::new();
        let payload = frame(500, 1);
        sink.create_or_resize(payload.count(), 1);

        let mut scheduler = UploadScheduler::new(UploadMode::Synchronous, RenderPolicy::Strict, 10);
        scheduler.begin_frame(payload.clone(), &mut sink);

        assert!(scheduler.is_render_eligible());
        assert_eq!(scheduler.visible_count(), 500);
        assert!(!scheduler.has_pending());
        assert_eq!(sink.channel(SplatChannel::Position), bytemuck::cast_slice::<_, u8>(payload.positions()));
    }

    #[test]
    fn test_strict_waits_for_full_upload() {
        let mut sink = RecordingSink::new();
        sink.create_or_resize(10, 0);
        let mut scheduler = UploadScheduler::new(UploadMode::Incremental, RenderPolicy::Strict, 4);
        scheduler.begin_frame(frame(10, 0), &mut sink);

        assert!(!scheduler.is_render_eligible());
        scheduler.step(&mut sink);
        scheduler.step(&mut sink);
        assert!(!scheduler.is_render_eligible());
        assert_eq!(scheduler.visible_count(), 0);
        scheduler.step(&mut sink);
        assert!(scheduler.is_render_eligible());
        assert_eq!(scheduler.visible_count(), 10);
    }

    #[test]
    fn test_progressive_draws_uploaded_prefix() {
        let mut sink = RecordingSink::new();
        sink.create_or_resize(10, 0);
        let mut scheduler = UploadScheduler::new(UploadMode::Incremental, RenderPolicy::Progressive, 4);
        scheduler.begin_frame(frame(10, 0), &mut sink);

        assert!(!scheduler.is_render_eligible());
        scheduler.step(&mut sink);
        assert!(scheduler.is_render_eligible());
        assert_eq!(scheduler.visible_count(), 4);
    }

    #[test]
    fn test_sh_channel_uses_coefficient_stride() {
        let mut sink = RecordingSink::new();
        let payload = frame(6, 2);
        sink.create_or_resize(6, 2);
        let mut scheduler = UploadScheduler::new(UploadMode::Incremental, RenderPolicy::Strict, 4);
        scheduler.begin_frame(payload.clone(), &mut sink);
        scheduler.step(&mut sink);

        let sh_uploads: Vec<_> = sink
            .uploads()
            .iter()
            .filter(|r| r.channel == SplatChannel::ShCoefficients)
            .copied()
            .collect();
        assert_eq!(
            sh_uploads,
            vec![UploadRange {
                channel: SplatChannel::ShCoefficients,
                dest_offset: 0,
                src_offset: 0,
                count: 4 * 8,
            }]
        );
    }

    #[test]
    fn test_empty_frame_is_never_eligible() {
        let mut sink = RecordingSink::new();
        let mut scheduler = UploadScheduler::new(UploadMode::Incremental, RenderPolicy::Progressive, 4);
        scheduler.begin_frame(frame(0, 0), &mut sink);
        assert!(scheduler.step(&mut sink).is_none());
        assert!(!scheduler.is_render_eligible());
    }

    #[test]
    fn test_batch_limit_floor() {
        assert_eq!(UploadCursor::new(5, 0).batch_limit, 1);
    }
}
