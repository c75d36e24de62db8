//! Data transfer into render resources.
//!
//! - [`upload_scheduler`]: splits a frame upload into bounded per-tick batches

pub mod upload_scheduler;

pub use upload_scheduler::{
    RenderPolicy, UploadBatch, UploadCursor, UploadMode, UploadScheduler, UploadStats,
};
