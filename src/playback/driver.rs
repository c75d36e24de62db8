//! Tick driver: runs the player on a fixed-rate tokio interval.
//!
//! The player is owned by the driver task. Other tasks (the HTTP API) talk to
//! it through a command channel and observe it through a `watch` channel that
//! carries the latest [`PlaybackStatus`].

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::FrameKey;
use crate::playback::control::PlaybackControl;
use crate::playback::player::{PlaybackStatus, SequencePlayer};
use crate::render::RenderSink;

/// Commands accepted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlaybackCommand {
    Play,
    Pause,
    Resume,
    Stop,
    SetFrame { index: FrameKey },
    Reload,
}

impl PlaybackCommand {
    pub fn apply(self, control: &mut dyn PlaybackControl) {
        match self {
            PlaybackCommand::Play => control.play(),
            PlaybackCommand::Pause => control.pause(),
            PlaybackCommand::Resume => control.resume(),
            PlaybackCommand::Stop => control.stop(),
            PlaybackCommand::SetFrame { index } => control.set_frame(index),
            PlaybackCommand::Reload => control.reload_frames(),
        }
    }
}

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Handle to a running driver.
pub struct DriverHandle<S: RenderSink> {
    commands: mpsc::Sender<PlaybackCommand>,
    status: watch::Receiver<PlaybackStatus>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<SequencePlayer<S>>,
}

impl<S: RenderSink + 'static> DriverHandle<S> {
    pub fn commands(&self) -> mpsc::Sender<PlaybackCommand> {
        self.commands.clone()
    }

    pub fn status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    /// Stop the driver and take the player back.
    pub async fn shutdown(self) -> anyhow::Result<SequencePlayer<S>> {
        // The task may already be gone; joining reports that.
        let _ = self.shutdown.send(true);
        Ok(self.task.await?)
    }
}

/// Spawn the tick loop on the current runtime.
pub fn spawn_driver<S: RenderSink + 'static>(
    player: SequencePlayer<S>,
    tick_rate_hz: f64,
) -> DriverHandle<S> {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (status_tx, status_rx) = watch::channel(player.status());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let period = Duration::from_secs_f64(1.0 / tick_rate_hz.max(1.0));
    let task = tokio::spawn(run(player, period, commands_rx, status_tx, shutdown_rx));

    DriverHandle {
        commands: commands_tx,
        status: status_rx,
        shutdown: shutdown_tx,
        task,
    }
}

async fn run<S: RenderSink>(
    mut player: SequencePlayer<S>,
    period: Duration,
    mut commands: mpsc::Receiver<PlaybackCommand>,
    status: watch::Sender<PlaybackStatus>,
    mut shutdown: watch::Receiver<bool>,
) -> SequencePlayer<S> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    info!(period_ms = period.as_secs_f64() * 1000.0, "Tick driver started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                while let Ok(command) = commands.try_recv() {
                    debug!(?command, "Applying command");
                    command.apply(&mut player);
                }

                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;

                player.tick(dt);
                status.send_replace(player.status());
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Tick driver stopped");
    player
}
