use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use splat_stream::config::{Cli, Config, SourceKind};
use splat_stream::loader::decoder::{FrameDecoder, SplatFileDecoder, SyntheticDecoder};
use splat_stream::loader::registry::{self, new_shared_registry};
use splat_stream::loader::task_loader::TaskAssetLoader;
use splat_stream::playback::{spawn_driver, PlaybackControl, SequencePlayer};
use splat_stream::render::coordinator::{self, new_shared_coordinator};
use splat_stream::render::recording::RecordingSink;
use splat_stream::server::control_api::{build_router, AppState};
use splat_stream::source;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "splat_stream=debug,tower_http=debug"
    } else {
        "splat_stream=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("splat-stream v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);

    info!(
        fps = config.playback.frames_per_second,
        loop_playback = config.playback.loop_playback,
        preload_behind = config.prefetch.preload_behind,
        preload_ahead = config.prefetch.preload_ahead,
        max_cached_frames = config.prefetch.max_cached_frames,
        upload_batch_size = config.upload.upload_batch_size,
        "Configuration loaded"
    );

    // Frame source and loader.
    let decoder: Arc<dyn FrameDecoder> = match config.source.kind {
        SourceKind::Manual => {
            info!(frames = config.source.frames.len(), "Playing manual frame list");
            Arc::new(SplatFileDecoder::new())
        }
        SourceKind::Directory => {
            info!(dir = %config.source.directory.display(), "Playing frames from directory");
            Arc::new(SplatFileDecoder::new())
        }
        SourceKind::Synthetic => {
            info!(
                frames = config.source.synthetic_frames,
                splats = config.source.splats_per_frame,
                sh_bands = config.source.sh_bands,
                "Playing synthetic frames"
            );
            Arc::new(SyntheticDecoder::new(
                config.source.splats_per_frame,
                config.source.sh_bands,
                Duration::from_millis(config.source.load_latency_ms),
            ))
        }
    };
    let registry = new_shared_registry();
    let loader = Arc::new(TaskAssetLoader::new(
        tokio::runtime::Handle::current(),
        decoder,
        registry.clone(),
    ));

    // Build the player.
    let coordinator = new_shared_coordinator();
    let mut player = SequencePlayer::new(
        &config,
        source::from_config(&config.source),
        loader.clone(),
        RecordingSink::new(),
        coordinator.clone(),
    );
    if config.playback.autoplay {
        player.play();
    }

    let driver = spawn_driver(player, config.playback.tick_rate_hz);

    // Start the control API.
    let server = if config.server.enabled {
        let state = Arc::new(AppState {
            commands: driver.commands(),
            status: driver.status(),
            start_time: Instant::now(),
        });
        let app = build_router(state);

        let listen_addr = config.server.listen.clone();
        info!(addr = listen_addr, "Starting server");
        let listener = TcpListener::bind(&listen_addr).await?;
        info!("Listening on {listen_addr}");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Server error");
            }
        }))
    } else {
        None
    };

    match cli.duration_secs {
        Some(secs) => {
            info!(secs, "Running for a fixed duration");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }
    info!("Shutting down");

    if let Some(server) = server {
        server.abort();
    }

    let mut player = driver.shutdown().await?;
    let status = player.status();
    player.disable();

    let loader_stats = loader.stats();
    let registry_stats = registry::lock(&registry).stats().clone();
    info!(
        ticks = status.ticks,
        frame_index = status.frame_index,
        requests = status.cache.requests_issued,
        loaded = status.cache.loads_succeeded,
        failed = status.cache.loads_failed,
        evictions = status.cache.evictions,
        stale = status.cache.stale_discards,
        batches = status.upload_stats.batches,
        splats_uploaded = status.upload_stats.splats_uploaded,
        renders = status.renderer.renders,
        "Playback summary"
    );
    info!(
        spawned = loader_stats.spawned,
        decoded = loader_stats.decoded,
        orphaned = loader_stats.orphaned,
        acquisitions = registry_stats.acquisitions,
        shared_hits = registry_stats.shared_hits,
        frees = registry_stats.frees,
        "Loader summary"
    );
    info!(
        renderers = coordinator::lock(&coordinator).len(),
        "Render coordinator"
    );

    Ok(())
}
