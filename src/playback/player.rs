//! The sequence player: cursor, prefetch cache and renderer driven by one tick.
//!
//! Per tick:
//! 1. Apply load completions delivered since the last tick
//! 2. Advance the cursor by the elapsed time
//! 3. Reconcile the prefetch window once, around the final index
//! 4. Hand the current frame to the renderer if it is ready
//! 5. Upload one batch and draw

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CompletionOutcome, FrameKey, LoadStatus, PrefetchCache, Window};
use crate::config::Config;
use crate::loader::AssetLoader;
use crate::playback::control::PlaybackControl;
use crate::playback::cursor::{PlaybackCursor, PlaybackState};
use crate::render::coordinator::SharedCoordinator;
use crate::render::renderer::{RenderOutcome, RendererStats, SplatRenderer};
use crate::render::RenderSink;
use crate::source::FrameSource;
use crate::transfer::{UploadCursor, UploadStats};

/// What one player tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTick {
    pub advances: usize,
    pub completions: Vec<CompletionOutcome>,
    pub render: RenderOutcome,
}

/// Serializable snapshot for the control API.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub is_playing: bool,
    pub is_paused: bool,
    pub enabled: bool,
    pub frame_index: FrameKey,
    pub frame_count: usize,
    /// Frame whose payload the renderer currently holds.
    pub displayed_frame: Option<FrameKey>,
    pub window: Option<Window>,
    pub cached: Vec<CachedFrame>,
    pub cache: CacheStats,
    pub upload: Option<UploadCursor>,
    pub upload_stats: UploadStats,
    pub renderer: RendererStats,
    pub ticks: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedFrame {
    pub key: FrameKey,
    pub status: LoadStatus,
}

pub struct SequencePlayer<S: RenderSink> {
    cursor: PlaybackCursor,
    cache: PrefetchCache,
    renderer: SplatRenderer<S>,
    source: Box<dyn FrameSource>,
    coordinator: SharedCoordinator,
    hold_last_frame: bool,
    enabled: bool,
    displayed: Option<FrameKey>,
    ticks: u64,
}

impl<S: RenderSink> SequencePlayer<S> {
    /// Build an enabled player and list the initial frame sequence.
    pub fn new(
        config: &Config,
        source: Box<dyn FrameSource>,
        loader: Arc<dyn AssetLoader>,
        sink: S,
        coordinator: SharedCoordinator,
    ) -> Self {
        let mut renderer = SplatRenderer::new(sink, &config.upload, "sequence");
        renderer.enable(&coordinator);

        let mut player = Self {
            cursor: PlaybackCursor::new(
                config.playback.frames_per_second,
                config.playback.loop_playback,
            ),
            cache: PrefetchCache::new(config.prefetch.clone(), loader),
            renderer,
            source,
            coordinator,
            hold_last_frame: config.prefetch.hold_last_frame_while_loading,
            enabled: true,
            displayed: None,
            ticks: 0,
        };
        player.load_frame_list();
        player
    }

    pub fn cache(&self) -> &PrefetchCache {
        &self.cache
    }

    pub fn renderer(&self) -> &SplatRenderer<S> {
        &self.renderer
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn frame_count(&self) -> usize {
        self.cache.frame_count()
    }

    pub fn displayed_frame(&self) -> Option<FrameKey> {
        self.displayed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resume after `disable`: re-register the renderer and rebuild the window.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.cache.enable();
        self.renderer.enable(&self.coordinator);
        info!("Player enabled");
        self.refresh();
    }

    /// Tear down: release every cached frame, drop the displayed payload and
    /// unregister the renderer.
    ///
    /// Loads still in flight are released as they arrive.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.cache.shutdown();
        self.renderer.set_asset(None);
        self.renderer.disable();
        self.displayed = None;
        info!("Player disabled");
    }

    pub fn tick(&mut self, dt: f64) -> PlayerTick {
        self.ticks += 1;
        let completions = self.cache.poll_completions();
        if !self.enabled {
            // Late results are released as they arrive.
            return PlayerTick {
                advances: 0,
                completions,
                render: RenderOutcome::Disabled,
            };
        }

        let current_settled = completions.iter().any(|outcome| {
            matches!(outcome,
                CompletionOutcome::Installed(key) | CompletionOutcome::Failed(key)
                    if *key == self.cursor.index())
        });

        let frame_count = self.frame_count();
        let advance = self.cursor.tick(dt, frame_count);
        if advance.stopped {
            info!("Reached the end of the sequence");
        }

        if advance.moved() {
            self.refresh();
        } else if current_settled {
            self.apply_frame_if_ready(self.cursor.index());
        }

        PlayerTick {
            advances: advance.advances,
            completions,
            render: self.renderer.tick(),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        let cached = self
            .cache
            .cached_keys()
            .into_iter()
            .map(|key| CachedFrame {
                key,
                status: self.cache.status(key),
            })
            .collect();

        PlaybackStatus {
            state: self.cursor.state(),
            is_playing: self.cursor.is_playing(),
            is_paused: self.cursor.is_paused(),
            enabled: self.enabled,
            frame_index: self.cursor.index(),
            frame_count: self.frame_count(),
            displayed_frame: self.displayed,
            window: self.cache.window(),
            cached,
            cache: self.cache.stats().clone(),
            upload: self.renderer.upload_cursor().copied(),
            upload_stats: self.renderer.upload_stats().clone(),
            renderer: self.renderer.stats().clone(),
            ticks: self.ticks,
        }
    }

    /// Reconcile the window around the cursor and show the current frame.
    fn refresh(&mut self) {
        if !self.enabled || self.frame_count() == 0 {
            return;
        }
        let index = self.cursor.index();
        let issued = self.cache.request_window(index);
        if issued > 0 {
            debug!(index, issued, "Reconciled prefetch window");
        }
        self.apply_frame_if_ready(index);
    }

    /// Show `index` if it is ready. Otherwise keep the last frame or clear,
    /// depending on `hold_last_frame_while_loading`.
    fn apply_frame_if_ready(&mut self, index: FrameKey) {
        match self.cache.ready_payload(index) {
            Some(payload) => {
                if self.renderer.set_asset(Some(payload)) {
                    debug!(index, "Displaying frame");
                }
                self.displayed = Some(index);
            }
            None if !self.hold_last_frame => {
                self.renderer.set_asset(None);
                self.displayed = None;
            }
            None => {}
        }
    }

    fn load_frame_list(&mut self) {
        let frames = match self.source.list_frames() {
            Ok(frames) => frames,
            Err(e) => {
                warn!(error = %e, "Frame source failed, using an empty sequence");
                Vec::new()
            }
        };
        self.cache.set_frames(frames);
        let frame_count = self.frame_count();
        self.cursor.clamp_to(frame_count);
        info!(frames = frame_count, "Frame list loaded");
    }
}

impl<S: RenderSink> PlaybackControl for SequencePlayer<S> {
    fn play(&mut self) {
        let frame_count = self.frame_count();
        if !self.cursor.play(frame_count) {
            return;
        }
        info!(index = self.cursor.index(), "Play");
        self.refresh();
    }

    fn pause(&mut self) {
        if self.cursor.pause() {
            info!(index = self.cursor.index(), "Pause");
        }
    }

    fn resume(&mut self) {
        if self.cursor.resume() {
            info!(index = self.cursor.index(), "Resume");
        }
    }

    fn stop(&mut self) {
        self.cursor.stop();
        info!("Stop");
        self.refresh();
    }

    fn set_frame(&mut self, index: FrameKey) {
        let frame_count = self.frame_count();
        if let Some(index) = self.cursor.set_frame(index, frame_count) {
            debug!(index, "Set frame");
            self.refresh();
        }
    }

    fn reload_frames(&mut self) {
        self.load_frame_list();
        if self.frame_count() == 0 {
            self.renderer.set_asset(None);
            self.displayed = None;
            return;
        }
        self.refresh();
    }

    fn is_playing(&self) -> bool {
        self.cursor.is_playing()
    }

    fn is_paused(&self) -> bool {
        self.cursor.is_paused()
    }

    fn current_frame_index(&self) -> FrameKey {
        self.cursor.index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::scripted::ScriptedLoader;
    use crate::render::coordinator::new_shared_coordinator;
    use crate::render::recording::RecordingSink;
    use crate::source::SyntheticFrameSource;

    fn player(frames: usize, hold: bool) -> (SequencePlayer<RecordingSink>, ScriptedLoader) {
        let mut config = Config::default();
        config.playback.frames_per_second = 10.0;
        config.playback.loop_playback = false;
        config.prefetch.hold_last_frame_while_loading = hold;
        config.upload.upload_batch_size = 1_000;
        let loader = ScriptedLoader::new(16, 0);
        let player = SequencePlayer::new(
            &config,
            Box::new(SyntheticFrameSource::new(frames)),
            Arc::new(loader.clone()),
            RecordingSink::new(),
            new_shared_coordinator(),
        );
        (player, loader)
    }

    #[test]
    fn test_play_requests_window_and_shows_ready_frame() {
        let (mut player, loader) = player(5, true);
        player.play();
        assert_eq!(loader.requested(), vec![0, 1, 2]);
        assert_eq!(player.tick(0.0).render, RenderOutcome::Idle);

        loader.complete(0);
        let tick = player.tick(0.0);
        assert_eq!(tick.completions, vec![CompletionOutcome::Installed(0)]);
        assert_eq!(tick.render, RenderOutcome::Rendered { visible: 16 });
        assert_eq!(player.displayed_frame(), Some(0));
    }

    #[test]
    fn test_hold_last_frame_while_loading() {
        let (mut player, loader) = player(5, true);
        player.play();
        loader.complete(0);
        player.tick(0.0);

        player.tick(0.1);
        assert_eq!(player.current_frame_index(), 1);
        assert_eq!(player.displayed_frame(), Some(0));
        assert!(player.renderer().asset().is_some());
    }

    #[test]
    fn test_clear_while_loading_without_hold() {
        let (mut player, loader) = player(5, false);
        player.play();
        loader.complete(0);
        player.tick(0.0);

        let tick = player.tick(0.1);
        assert_eq!(player.displayed_frame(), None);
        assert_eq!(tick.render, RenderOutcome::Idle);
    }

    #[test]
    fn test_stop_rewinds() {
        let (mut player, _loader) = player(5, true);
        player.play();
        player.set_frame(3);
        player.stop();
        assert!(!player.is_playing());
        assert_eq!(player.current_frame_index(), 0);
    }

    #[test]
    fn test_empty_sequence_is_noop() {
        let (mut player, loader) = player(0, true);
        player.play();
        player.set_frame(2);
        player.tick(1.0);
        assert!(!player.is_playing());
        assert!(loader.requested().is_empty());
    }

    #[test]
    fn test_disable_releases_and_discards_late_loads() {
        let (mut player, loader) = player(5, true);
        player.play();
        loader.complete(0);
        player.tick(0.0);

        player.disable();
        assert_eq!(loader.released(), vec![0]);
        loader.complete(1);
        let tick = player.tick(0.0);
        assert_eq!(tick.render, RenderOutcome::Disabled);
        assert_eq!(tick.completions, vec![CompletionOutcome::Discarded(1)]);
        assert_eq!(loader.released(), vec![0, 1]);

        player.enable();
        assert_eq!(player.cache().status(0), LoadStatus::Pending);
    }

    #[test]
    fn test_disable_drops_displayed_payload() {
        let (mut player, loader) = player(5, true);
        player.play();
        loader.complete(0);
        player.tick(0.0);
        let payload = player.cache().ready_payload(0).unwrap();
        assert!(Arc::strong_count(&payload) > 1);

        player.disable();
        assert!(player.renderer().asset().is_none());
        assert_eq!(player.displayed_frame(), None);
        assert_eq!(Arc::strong_count(&payload), 1);

        player.enable();
        loader.complete(0);
        player.tick(0.0);
        assert_eq!(player.displayed_frame(), Some(0));
    }
}
