//! The serializer contract.

use crate::model::{AnnotationType, Payload};
use crate::serializer::error::SerializeError;

/// Converts between in-memory payloads and the wire `data` object of one
/// annotation type.
///
/// `serialize` must reject payloads of any other type instead of passing them
/// through, since that always means a registration or plugin bug.
pub trait AnnotationSerializer {
    /// The type this serializer is registered under.
    fn annotation_type(&self) -> AnnotationType;

    /// Payload → wire `data`.
    fn serialize(&self, payload: &Payload) -> Result<serde_json::Value, SerializeError>;

    /// Wire `data` → payload.
    fn deserialize(&self, wire: &serde_json::Value) -> Result<Payload, SerializeError>;
}
