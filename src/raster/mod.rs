//! Dense label rasters backing mask annotations.
//!
//! One raster exists per (view, file). Every pixel holds a label index; label 0
//! is empty and labels 1..=255 map 1:1 to mask annotation ids. Brush strokes and
//! polygon fills write labels; annotations only record which raster and label
//! they own.

mod buffer;
mod error;
mod manager;
pub mod mask;
pub mod painter;
pub mod rasterize;
pub mod rle;

pub use buffer::{EMPTY_LABEL, MAX_LABELS, PixelRegion, Raster, RasterId, RasterPatch};
pub use error::RasterError;
pub use manager::RasterManager;
