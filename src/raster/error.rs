//! Error types for raster bookkeeping.

use thiserror::Error;

use crate::model::AnnotationId;
use crate::raster::RasterId;

/// Errors raised by rasters and the raster manager.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    /// Every label index is already bound to an annotation
    #[error("All {0} raster labels are in use")]
    LabelsExhausted(usize),

    /// A raster already exists for this file
    #[error("A raster already exists for file '{0}'")]
    DuplicateRaster(String),

    /// No raster with this id
    #[error("Raster {0:?} not found")]
    UnknownRaster(RasterId),

    /// The annotation is not bound to any label on the raster
    #[error("Annotation {0} has no label on this raster")]
    NoLabel(AnnotationId),

    /// Region or buffer does not fit the raster
    #[error("Region out of bounds: {0}")]
    OutOfBounds(String),

    /// Persisted raster data could not be decoded
    #[error("Invalid raster data: {0}")]
    InvalidData(String),
}
