//! Background frame loading for video and image sequences.
//!
//! The interaction thread talks to the loader only through messages: it
//! declares which frames it needs and polls for [`LoaderEvent`]s. Decoded
//! pixels come back as shared [`BitmapHandle`]s.

mod loader;
mod playback;
mod scheduler;
mod source;
mod types;

use thiserror::Error;

pub use loader::FrameLoader;
pub use playback::{Playback, PlaybackStep};
pub use scheduler::{FetchRequest, FrameScheduler, Step};
pub use source::{FileFrameSource, FrameSource, MemoryFrameSource};
pub use types::{BitmapHandle, FrameBitmap, FrameSection, LoaderEvent, Quality};

/// Errors raised while fetching or decoding frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The source could not deliver the bytes
    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    /// The bytes are not a supported image
    #[error("Failed to decode frame {index}: {message}")]
    Decode { index: u32, message: String },

    /// The frame's section has no url at all
    #[error("No url for frame {0}")]
    NoUrl(u32),

    /// Worker threads have shut down
    #[error("Frame loader workers are gone")]
    WorkerGone,

    /// Worker threads could not be started
    #[error("Failed to spawn loader thread: {0}")]
    Spawn(String),
}

impl FrameError {
    /// Create a fetch error.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}
