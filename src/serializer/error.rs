//! Error types for annotation (de)serialization.

use thiserror::Error;

/// Errors raised by serializers and the serializer registry.
#[derive(Error, Debug)]
pub enum SerializeError {
    /// Data of one type handed to the serializer of another
    #[error("Type mismatch: serializer for '{expected}' cannot handle '{found}' data")]
    TypeMismatch {
        /// The type the serializer handles
        expected: String,
        /// The kind of payload it was given
        found: String,
    },

    /// No serializer is registered for this type
    #[error("No serializer registered for type '{0}'")]
    UnknownType(String),

    /// A serializer for this type is already registered
    #[error("A serializer for type '{0}' is already registered")]
    AlreadyRegistered(String),

    /// Wire data does not have the shape the type expects
    #[error("Malformed '{type_name}' data: {message}")]
    Malformed {
        /// The type being deserialized
        type_name: String,
        /// What was wrong with it
        message: String,
    },

    /// JSON conversion error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializeError {
    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a malformed data error.
    pub fn malformed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}
