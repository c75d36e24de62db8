//! Frame sources: produce the ordered list of frame references for a session.
//!
//! A source is only consulted on an explicit reload. The cache never cares
//! how the sequence was authored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{SourceConfig, SourceKind};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error listing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Frame directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

/// A reference to one frame asset in playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRef {
    /// Asset name. Also the identity used for refcounted residency.
    pub name: String,

    /// On-disk location, when the frame is file-backed.
    pub path: Option<PathBuf>,
}

impl FrameRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path: Some(path),
        }
    }

    /// A reference with no name can never be loaded.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Produces the ordered frame sequence.
pub trait FrameSource: Send + Sync {
    fn list_frames(&self) -> Result<Vec<FrameRef>, SourceError>;
}

/// Drop invalid references and optionally sort by name (ordinal).
fn cleanup_frames(mut frames: Vec<FrameRef>, sort_by_name: bool) -> Vec<FrameRef> {
    let before = frames.len();
    frames.retain(FrameRef::is_valid);
    if frames.len() != before {
        debug!(dropped = before - frames.len(), "Dropped invalid frame references");
    }
    if sort_by_name {
        frames.sort_by(|a, b| a.name.cmp(&b.name));
    }
    frames
}

/// An explicit, hand-authored frame list.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameSource {
    frames: Vec<FrameRef>,
    sort_by_name: bool,
}

impl ManualFrameSource {
    pub fn new(frames: Vec<FrameRef>, sort_by_name: bool) -> Self {
        Self {
            frames,
            sort_by_name,
        }
    }
}

impl FrameSource for ManualFrameSource {
    fn list_frames(&self) -> Result<Vec<FrameRef>, SourceError> {
        Ok(cleanup_frames(self.frames.clone(), self.sort_by_name))
    }
}

/// Scans a directory for `.splat` and `.splat.zst` frame files.
#[derive(Debug, Clone)]
pub struct DirectoryFrameSource {
    directory: PathBuf,
    sort_by_name: bool,
}

impl DirectoryFrameSource {
    pub fn new(directory: impl Into<PathBuf>, sort_by_name: bool) -> Self {
        Self {
            directory: directory.into(),
            sort_by_name,
        }
    }

    pub fn is_frame_file(path: &Path) -> bool {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };
        name.ends_with(".splat") || name.ends_with(".splat.zst")
    }
}

impl FrameSource for DirectoryFrameSource {
    fn list_frames(&self) -> Result<Vec<FrameRef>, SourceError> {
        if !self.directory.is_dir() {
            return Err(SourceError::DirectoryNotFound(self.directory.clone()));
        }

        let io_err = |source| SourceError::Io {
            path: self.directory.clone(),
            source,
        };

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(&self.directory).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && Self::is_frame_file(&path) {
                frames.push(FrameRef::file(path));
            }
        }

        debug!(
            directory = %self.directory.display(),
            frames = frames.len(),
            "Scanned frame directory"
        );

        Ok(cleanup_frames(frames, self.sort_by_name))
    }
}

/// `count` generated frame references named `frame_0000`, `frame_0001`, ...
#[derive(Debug, Clone)]
pub struct SyntheticFrameSource {
    count: usize,
}

impl SyntheticFrameSource {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn list_frames(&self) -> Result<Vec<FrameRef>, SourceError> {
        Ok((0..self.count)
            .map(|i| FrameRef::named(format!("frame_{i:04}")))
            .collect())
    }
}

/// Build the frame source described by the configuration.
pub fn from_config(config: &SourceConfig) -> Box<dyn FrameSource> {
    match config.kind {
        SourceKind::Manual => {
            if config.frames.is_empty() {
                warn!("Manual frame source configured with an empty frame list");
            }
            Box::new(ManualFrameSource::new(
                config.frames.iter().map(|path| FrameRef::file(path.clone())).collect(),
                config.sort_by_name,
            ))
        }
        SourceKind::Directory => Box::new(DirectoryFrameSource::new(
            config.directory.clone(),
            config.sort_by_name,
        )),
        SourceKind::Synthetic => {
            if config.synthetic_frames == 0 {
                warn!("Synthetic frame source configured with zero frames");
            }
            Box::new(SyntheticFrameSource::new(config.synthetic_frames))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manual_source_drops_invalid_and_sorts() {
        let source = ManualFrameSource::new(
            vec![
                FrameRef::named("c"),
                FrameRef::named(""),
                FrameRef::named("a"),
                FrameRef::named("b"),
            ],
            true,
        );
        let names: Vec<_> = source
            .list_frames()
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_manual_source_keeps_authored_order() {
        let source =
            ManualFrameSource::new(vec![FrameRef::named("b"), FrameRef::named("a")], false);
        let frames = source.list_frames().unwrap();
        assert_eq!(frames[0].name, "b");
    }

    #[test]
    fn test_directory_source_filters_extensions() {
        let tmp = TempDir::new().unwrap();
        for name in ["f_002.splat", "f_001.splat.zst", "notes.txt", "f_000.splat"] {
            std::fs::write(tmp.path().join(name), b"").unwrap();
        }

        let source = DirectoryFrameSource::new(tmp.path(), true);
        let names: Vec<_> = source
            .list_frames()
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["f_000.splat", "f_001.splat.zst", "f_002.splat"]);
    }

    #[test]
    fn test_directory_source_missing_dir() {
        let source = DirectoryFrameSource::new("/nonexistent/splat/frames", true);
        assert!(matches!(
            source.list_frames(),
            Err(SourceError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_manual_source_from_config() {
        let config = SourceConfig {
            kind: SourceKind::Manual,
            frames: vec![
                PathBuf::from("seq/f_002.splat"),
                PathBuf::from(""),
                PathBuf::from("seq/f_001.splat.zst"),
            ],
            sort_by_name: false,
            ..Default::default()
        };
        let frames = from_config(&config).list_frames().unwrap();
        let names: Vec<_> = frames.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["f_002.splat", "f_001.splat.zst"]);
        assert_eq!(frames[0].path, Some(PathBuf::from("seq/f_002.splat")));
    }

    #[test]
    fn test_synthetic_source_names() {
        let frames = SyntheticFrameSource::new(3).list_frames().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].name, "frame_0002");
        assert!(frames.iter().all(|f| f.path.is_none()));
    }
}
