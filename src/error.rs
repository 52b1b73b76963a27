//! Engine-level error type.
//!
//! Each subsystem has its own error enum; `EngineError` wraps them for callers
//! that cross subsystem boundaries. Stale references are not errors: actions
//! report them by returning `false`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::frames::FrameError;
use crate::model::AnnotationId;
use crate::persistence::BackendError;
use crate::raster::RasterError;
use crate::serializer::SerializeError;

/// Errors raised by the editing engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Serializer lookup or conversion failed
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// Persistence collaborator failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Raster bookkeeping failed
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Frame loading failed
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Configuration could not be loaded or saved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required collaborator (file, raster, view) does not exist yet
    #[error("{0} is not initialized")]
    ResourceNotInitialized(&'static str),

    /// Data of one annotation type was handed to code expecting another
    #[error("Type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch {
        /// The type the operation works on
        expected: String,
        /// The type it was given
        found: String,
    },

    /// No annotation with this id exists in the view
    #[error("Annotation {0} not found")]
    NotFound(AnnotationId),

    /// An annotation with this id already exists in the view
    #[error("Annotation {0} already exists")]
    DuplicateId(AnnotationId),

    /// Video segment edit is not possible
    #[error("Invalid segment edit: {0}")]
    InvalidSegment(String),

    /// No tool with this name is registered
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    /// No command with this name is registered
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// A command with this name is already registered
    #[error("Command '{0}' is already registered")]
    DuplicateCommand(String),
}

impl EngineError {
    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
