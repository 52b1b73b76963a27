//! Per-type wire (de)serialization of annotations.
//!
//! Each annotation type has one serializer converting its payload to and from
//! the JSON `data` object stored remotely. Video annotations wrap per-frame
//! payloads as `{frames: {index: data}, segments: [[start, end]]}`; the
//! registry handles that wrapping so serializers only ever see single payloads.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut registry = SerializerRegistry::new();
//! for serializer in builtin_serializers() {
//!     registry.register(serializer)?;
//! }
//! let wire = registry.to_wire(&annotation)?;
//! ```

mod builtin;
mod error;
mod registry;
mod traits;
mod wire;

pub use builtin::{
    OpaqueSerializer, PayloadVariant, TagSerializer, TypedSerializer, builtin_serializers,
};
pub use error::SerializeError;
pub use registry::{SerializerHandle, SerializerRegistry};
pub use traits::AnnotationSerializer;
pub use wire::WireAnnotation;

#[cfg(test)]
mod tests;
