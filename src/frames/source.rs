//! Where frame bytes come from.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::frames::FrameError;

/// Fetches the encoded bytes behind a frame url.
///
/// Called from loader worker threads, hence `Send + Sync`.
pub trait FrameSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FrameError>;
}

/// Frames stored in memory under their url.
#[derive(Debug, Default)]
pub struct MemoryFrameSource {
    frames: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        if let Ok(mut frames) = self.frames.write() {
            frames.insert(url.to_string(), bytes);
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FrameError> {
        let frames = self.frames.read().map_err(|_| FrameError::fetch(url, "source lock poisoned"))?;
        frames
            .get(url)
            .cloned()
            .ok_or_else(|| FrameError::fetch(url, "not found"))
    }
}

/// Frames read from files below a root directory; urls are relative paths.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    root: PathBuf,
}

impl FileFrameSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FrameSource for FileFrameSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FrameError> {
        let path = self.root.join(url);
        std::fs::read(&path).map_err(|e| FrameError::fetch(url, e.to_string()))
    }
}
