//! HTTP control API for the sequence player.
//!
//! - POST /v1/playback/play | pause | resume | stop | reload
//! - POST /v1/playback/frame  `{"index": n}`
//! - GET /v1/playback/status
//! - GET /v1/playback/events  (SSE status stream)
//! - GET /health

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::FrameKey;
use crate::playback::{PlaybackCommand, PlaybackState, PlaybackStatus};
use crate::server::streaming::status_to_sse_stream;

/// Application state shared across handlers.
pub struct AppState {
    pub commands: mpsc::Sender<PlaybackCommand>,
    pub status: watch::Receiver<PlaybackStatus>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/playback/play", post(play))
        .route("/v1/playback/pause", post(pause))
        .route("/v1/playback/resume", post(resume))
        .route("/v1/playback/stop", post(stop))
        .route("/v1/playback/reload", post(reload))
        .route("/v1/playback/frame", post(set_frame))
        .route("/v1/playback/status", get(status))
        .route("/v1/playback/events", get(events))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetFrameRequest {
    pub index: FrameKey,
}

/// Returned by every command route.
#[derive(Debug, Serialize)]
pub struct CommandAccepted {
    pub accepted: bool,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub state: PlaybackState,
    pub frame_index: FrameKey,
    pub frame_count: usize,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn submit(
    state: &AppState,
    command: PlaybackCommand,
) -> Result<Json<CommandAccepted>, StatusCode> {
    info!(?command, "Playback command");
    state.commands.send(command).await.map_err(|_| {
        warn!(?command, "Tick driver is not running");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok(Json(CommandAccepted {
        accepted: true,
        command: format!("{command:?}"),
    }))
}

async fn play(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    submit(&state, PlaybackCommand::Play).await
}

async fn pause(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    submit(&state, PlaybackCommand::Pause).await
}

async fn resume(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    submit(&state, PlaybackCommand::Resume).await
}

async fn stop(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    submit(&state, PlaybackCommand::Stop).await
}

async fn reload(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, StatusCode> {
    submit(&state, PlaybackCommand::Reload).await
}

async fn set_frame(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetFrameRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    submit(&state, PlaybackCommand::SetFrame { index: req.index }).await
}

async fn status(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.status.borrow().clone())
}

async fn events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stream = status_to_sse_stream(state.status.clone());
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.status.borrow().clone();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        state: status.state,
        frame_index: status.frame_index,
        frame_count: status.frame_count,
    })
}
