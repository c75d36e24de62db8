//! Asynchronous frame loading.
//!
//! The loader runs off the tick thread and reports back through a channel
//! that the cache drains once per tick:
//! - [`registry`]: refcounted residency of decoded payloads
//! - [`decoder`]: turns a frame reference into a payload (files, synthetic)
//! - [`task_loader`]: tokio-task based loader used by the binary
//! - [`scripted`]: deterministic loader completed by hand

pub mod decoder;
pub mod registry;
pub mod scripted;
pub mod task_loader;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::cache::frame::{FrameKey, RequestId};
use crate::source::FrameRef;
use crate::splat::{SplatFrame, SplatFrameError};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame reference at key {0}")]
    InvalidReference(FrameKey),

    #[error("Frame {name} is not file-backed")]
    MissingPath { name: String },

    #[error("Malformed frame {name}: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Invalid frame layout: {0}")]
    Layout(#[from] SplatFrameError),

    #[error("Decoder failed for {0}")]
    Decoder(String),

    #[error("Load task aborted: {0}")]
    Task(String),
}

/// A successfully loaded, refcounted payload.
///
/// Not `Clone`: each handle is released exactly once, by value.
#[derive(Debug)]
pub struct FrameHandle {
    key: FrameKey,
    asset: String,
    payload: Arc<SplatFrame>,
}

impl FrameHandle {
    pub fn new(key: FrameKey, asset: impl Into<String>, payload: Arc<SplatFrame>) -> Self {
        Self {
            key,
            asset: asset.into(),
            payload,
        }
    }

    pub fn key(&self) -> FrameKey {
        self.key
    }

    /// Asset identity used for refcounting.
    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn payload(&self) -> &Arc<SplatFrame> {
        &self.payload
    }
}

/// Result of one load request, delivered on the tick thread.
#[derive(Debug)]
pub struct LoadCompletion {
    pub key: FrameKey,
    pub request_id: RequestId,
    pub result: Result<FrameHandle, LoadError>,
}

pub type CompletionSender = mpsc::UnboundedSender<LoadCompletion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<LoadCompletion>;

/// A request handed to the loader.
#[derive(Debug)]
pub struct LoadRequest {
    pub key: FrameKey,
    pub request_id: RequestId,
    pub frame: FrameRef,
    reply: CompletionSender,
}

impl LoadRequest {
    pub fn new(key: FrameKey, request_id: RequestId, frame: FrameRef, reply: CompletionSender) -> Self {
        Self {
            key,
            request_id,
            frame,
            reply,
        }
    }

    /// Deliver the result to the requesting cache.
    ///
    /// If the cache is gone the completion is handed back so the caller can
    /// release the payload.
    pub fn complete(
        self,
        result: Result<Arc<SplatFrame>, LoadError>,
    ) -> Result<(), LoadCompletion> {
        let completion = LoadCompletion {
            key: self.key,
            request_id: self.request_id,
            result: result.map(|payload| FrameHandle::new(self.key, self.frame.name, payload)),
        };
        self.reply.send(completion).map_err(|e| e.0)
    }
}

/// The asynchronous asset-loading subsystem.
///
/// `load` must not block: it starts the work and returns. The outcome is
/// delivered through [`LoadRequest::complete`]. Every successful handle is
/// released exactly once through `release`.
pub trait AssetLoader: Send + Sync {
    fn load(&self, request: LoadRequest);

    fn release(&self, handle: FrameHandle);
}
