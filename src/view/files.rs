//! Media files shown in a view slot.

use serde::{Deserialize, Serialize};

/// Still image or frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video { frames: u32 },
}

/// One file of a dataset item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn image(id: &str, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            width,
            height,
            kind: MediaKind::Image,
        }
    }

    pub fn video(id: &str, width: u32, height: u32, frames: u32) -> Self {
        Self {
            id: id.to_string(),
            width,
            height,
            kind: MediaKind::Video { frames },
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, MediaKind::Video { .. })
    }

    /// Number of frames; 1 for still images.
    pub fn frame_count(&self) -> u32 {
        match self.kind {
            MediaKind::Image => 1,
            MediaKind::Video { frames } => frames.max(1),
        }
    }
}

/// Files of the view's item and which one is current.
#[derive(Debug, Default)]
pub struct FileManager {
    files: Vec<MediaFile>,
    current: Option<usize>,
}

impl FileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the file list. The first file becomes current.
    pub fn set_files(&mut self, files: Vec<MediaFile>) {
        self.current = if files.is_empty() { None } else { Some(0) };
        self.files = files;
    }

    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn current_file(&self) -> Option<&MediaFile> {
        self.current.and_then(|i| self.files.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Make file `index` current. Returns `false` if it doesn't exist or already is.
    pub fn set_current(&mut self, index: usize) -> bool {
        if index >= self.files.len() || self.current == Some(index) {
            return false;
        }
        self.current = Some(index);
        true
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_file_is_current() {
        let mut files = FileManager::new();
        assert!(files.current_file().is_none());
        files.set_files(vec![
            MediaFile::image("a.png", 10, 10),
            MediaFile::video("b.mp4", 10, 10, 30),
        ]);
        assert_eq!(files.current_file().unwrap().id, "a.png");
        assert!(files.set_current(1));
        assert!(!files.set_current(1));
        assert!(!files.set_current(5));
        assert_eq!(files.current_file().unwrap().frame_count(), 30);
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(MediaFile::video("v", 4, 3, 9)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "v", "width": 4, "height": 3, "kind": "video", "frames": 9})
        );
    }
}
