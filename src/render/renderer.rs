//! Per-frame upload and render state machine.
//!
//! Each tick the renderer:
//! 1. Starts a new upload if the active payload changed (recreating sink
//!    resources when the splat count or SH band count differs)
//! 2. Uploads at most one batch
//! 3. Draws the uploaded prefix if the frame is render-eligible

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::UploadConfig;
use crate::render::coordinator::{self, RendererId, SharedCoordinator};
use crate::render::{ColorSpace, RenderParams, RenderSink, Transform, IDENTITY};
use crate::splat::SplatFrame;
use crate::transfer::{UploadCursor, UploadScheduler, UploadStats};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered { visible: usize },
    /// A frame is active but not yet drawable.
    Waiting,
    /// Nothing to draw.
    Idle,
    Disabled,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RendererStats {
    pub asset_swaps: u64,
    pub resource_creations: u64,
    pub renders: u64,
}

struct Registration {
    coordinator: SharedCoordinator,
    id: RendererId,
}

pub struct SplatRenderer<S: RenderSink> {
    sink: S,
    label: String,
    scheduler: UploadScheduler,

    asset: Option<Arc<SplatFrame>>,
    /// The asset changed since the last tick.
    asset_dirty: bool,
    /// `(count, sh_bands)` of the sink's current resources.
    allocated: Option<(usize, u8)>,

    registration: Option<Registration>,

    transform: Transform,
    layer_mask: u32,
    color_space: ColorSpace,
    sh_degree: u8,

    stats: RendererStats,
}

impl<S: RenderSink> SplatRenderer<S> {
    pub fn new(sink: S, config: &UploadConfig, label: impl Into<String>) -> Self {
        Self {
            sink,
            label: label.into(),
            scheduler: UploadScheduler::from_config(config),
            asset: None,
            asset_dirty: false,
            allocated: None,
            registration: None,
            transform: IDENTITY,
            layer_mask: 1,
            color_space: if config.gamma_to_linear {
                ColorSpace::GammaToLinear
            } else {
                ColorSpace::Gamma
            },
            sh_degree: config.sh_degree,
            stats: RendererStats::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn asset(&self) -> Option<&Arc<SplatFrame>> {
        self.asset.as_ref()
    }

    pub fn upload_cursor(&self) -> Option<&UploadCursor> {
        self.scheduler.cursor()
    }

    pub fn upload_stats(&self) -> &UploadStats {
        self.scheduler.stats()
    }

    pub fn stats(&self) -> &RendererStats {
        &self.stats
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn set_layer_mask(&mut self, layer_mask: u32) {
        self.layer_mask = layer_mask;
    }

    pub fn is_enabled(&self) -> bool {
        self.registration.is_some()
    }

    pub fn is_render_eligible(&self) -> bool {
        self.is_enabled() && !self.asset_dirty && self.scheduler.is_render_eligible()
    }

    /// Register with `coordinator`. The active asset is uploaded again from
    /// scratch on the next tick.
    pub fn enable(&mut self, coordinator: &SharedCoordinator) {
        if self.registration.is_some() {
            return;
        }
        let id = coordinator::lock(coordinator).register(self.label.clone());
        self.registration = Some(Registration {
            coordinator: coordinator.clone(),
            id,
        });
        self.asset_dirty = self.asset.is_some();
    }

    /// Unregister and drop upload progress. Sink resources are recreated on
    /// the next enable.
    pub fn disable(&mut self) {
        let Some(registration) = self.registration.take() else {
            return;
        };
        coordinator::lock(&registration.coordinator).unregister(registration.id);
        self.scheduler.clear();
        self.allocated = None;
    }

    /// Swap the active payload. Returns false if it is the same payload.
    ///
    /// Identity is by allocation, not content.
    pub fn set_asset(&mut self, asset: Option<Arc<SplatFrame>>) -> bool {
        let same = match (&self.asset, &asset) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same {
            return false;
        }
        self.asset = asset;
        self.asset_dirty = true;
        self.stats.asset_swaps += 1;
        true
    }

    pub fn tick(&mut self) -> RenderOutcome {
        if !self.is_enabled() {
            return RenderOutcome::Disabled;
        }

        if self.asset_dirty {
            self.asset_dirty = false;
            match self.asset.clone() {
                Some(asset) => {
                    self.ensure_resources(&asset);
                    self.scheduler.begin_frame(asset, &mut self.sink);
                }
                None => self.scheduler.clear(),
            }
        }

        if self.scheduler.has_pending() {
            self.scheduler.step(&mut self.sink);
        }

        let Some(asset) = self.asset.as_ref() else {
            return RenderOutcome::Idle;
        };
        if !self.scheduler.is_render_eligible() {
            return RenderOutcome::Waiting;
        }

        let params = RenderParams {
            visible_count: self.scheduler.visible_count(),
            transform: self.transform,
            bounds: asset.bounds(),
            layer_mask: self.layer_mask,
            color_space: self.color_space,
            sh_degree: self.sh_degree,
        };
        self.sink.render(&params);
        self.stats.renders += 1;
        RenderOutcome::Rendered {
            visible: params.visible_count,
        }
    }

    fn ensure_resources(&mut self, asset: &SplatFrame) {
        let layout = (asset.count(), asset.sh_bands());
        if self.allocated == Some(layout) {
            return;
        }
        match self.allocated {
            Some((count, sh_bands)) => info!(
                from_count = count,
                from_sh_bands = sh_bands,
                to_count = layout.0,
                to_sh_bands = layout.1,
                "Recreating render resources"
            ),
            None => debug!(count = layout.0, sh_bands = layout.1, "Creating render resources"),
        }
        self.sink.create_or_resize(layout.0, layout.1);
        self.allocated = Some(layout);
        self.stats.resource_creations += 1;
    }
}

impl<S: RenderSink> Drop for SplatRenderer<S> {
    fn drop(&mut self) {
        self.disable();
    }
}
