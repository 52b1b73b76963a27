//! Shared types for background frame loading.
//!
//! These types cross the boundary between the interaction thread and the
//! loader workers, so everything here is plain data.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Resolution tier of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Low-quality placeholder, fetched first
    Lq,
    /// Full-resolution frame
    Hq,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Lq => write!(f, "lq"),
            Quality::Hq => write!(f, "hq"),
        }
    }
}

/// Where to fetch one frame from.
///
/// Sections are handed to the loader by the host, usually in pages fetched
/// on demand after a [`LoaderEvent::SectionRequested`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSection {
    #[serde(rename = "section_index")]
    pub index: u32,
    #[serde(default)]
    pub lq_url: Option<String>,
    #[serde(default)]
    pub hq_url: Option<String>,
}

impl FrameSection {
    pub fn new(index: u32, lq_url: Option<&str>, hq_url: Option<&str>) -> Self {
        Self {
            index,
            lq_url: lq_url.map(str::to_string),
            hq_url: hq_url.map(str::to_string),
        }
    }

    /// Url for `quality`, falling back to HQ when no LQ url exists.
    ///
    /// Returns the quality actually served alongside the url.
    pub fn url_for(&self, quality: Quality) -> Option<(Quality, &str)> {
        match (quality, &self.lq_url, &self.hq_url) {
            (Quality::Lq, Some(lq), _) => Some((Quality::Lq, lq)),
            (_, _, Some(hq)) => Some((Quality::Hq, hq)),
            _ => None,
        }
    }
}

/// Shared handle to decoded RGBA pixels.
///
/// The interaction thread only ever sees these handles, never the worker's buffers.
pub type BitmapHandle = Arc<image::RgbaImage>;

/// A decoded frame held by the loader cache.
#[derive(Debug, Clone)]
pub struct FrameBitmap {
    pub index: u32,
    pub quality: Quality,
    pub bitmap: BitmapHandle,
}

impl FrameBitmap {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Notification from the loader to the render loop.
#[derive(Debug, Clone)]
pub enum LoaderEvent {
    /// New pixels for a frame are available through [`FrameBitmap`]
    FrameLoaded { index: u32, quality: Quality },
    /// The loader needs the section of this frame before it can continue
    SectionRequested { index: u32 },
    /// Fetching or decoding failed; the frame can be requested again
    FrameFailed { index: u32, error: String },
}
