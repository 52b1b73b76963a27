//! Serializers for the built-in annotation types.

use std::marker::PhantomData;

use annotate_geom::{BoundingBox, CompoundPath};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{
    AnnotationType, DirectionalVector, MaskData, Payload, Polyline, RasterLayerData, Skeleton,
    Table,
};
use crate::serializer::error::SerializeError;
use crate::serializer::traits::AnnotationSerializer;

/// A payload variant whose data serializes directly with serde.
pub trait PayloadVariant: Serialize + DeserializeOwned + Sized {
    fn annotation_type() -> AnnotationType;
    fn wrap(self) -> Payload;
    fn unwrap(payload: &Payload) -> Option<&Self>;
}

macro_rules! payload_variant {
    ($ty:ty, $variant:ident) => {
        impl PayloadVariant for $ty {
            fn annotation_type() -> AnnotationType {
                AnnotationType::$variant
            }

            fn wrap(self) -> Payload {
                Payload::$variant(self)
            }

            fn unwrap(payload: &Payload) -> Option<&Self> {
                match payload {
                    Payload::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

payload_variant!(BoundingBox, BoundingBox);
payload_variant!(CompoundPath, Polygon);
payload_variant!(Polyline, Polyline);
payload_variant!(Skeleton, Skeleton);
payload_variant!(Table, Table);
payload_variant!(DirectionalVector, DirectionalVector);
payload_variant!(MaskData, Mask);
payload_variant!(RasterLayerData, RasterLayer);

/// Serializer for any [`PayloadVariant`].
pub struct TypedSerializer<T>(PhantomData<T>);

impl<T> TypedSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypedSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PayloadVariant> AnnotationSerializer for TypedSerializer<T> {
    fn annotation_type(&self) -> AnnotationType {
        T::annotation_type()
    }

    fn serialize(&self, payload: &Payload) -> Result<serde_json::Value, SerializeError> {
        let inner = T::unwrap(payload).ok_or_else(|| {
            SerializeError::type_mismatch(T::annotation_type().as_str(), payload.kind_name())
        })?;
        Ok(serde_json::to_value(inner)?)
    }

    fn deserialize(&self, wire: &serde_json::Value) -> Result<Payload, SerializeError> {
        let inner: T = serde_json::from_value(wire.clone())
            .map_err(|e| SerializeError::malformed(T::annotation_type().as_str(), e.to_string()))?;
        Ok(inner.wrap())
    }
}

/// Tags carry no geometry; their data is `{}`.
pub struct TagSerializer;

impl AnnotationSerializer for TagSerializer {
    fn annotation_type(&self) -> AnnotationType {
        AnnotationType::Tag
    }

    fn serialize(&self, payload: &Payload) -> Result<serde_json::Value, SerializeError> {
        match payload {
            Payload::Tag => Ok(serde_json::Value::Object(serde_json::Map::new())),
            other => Err(SerializeError::type_mismatch("tag", other.kind_name())),
        }
    }

    fn deserialize(&self, wire: &serde_json::Value) -> Result<Payload, SerializeError> {
        if wire.is_object() || wire.is_null() {
            Ok(Payload::Tag)
        } else {
            Err(SerializeError::malformed("tag", "expected an object"))
        }
    }
}

/// Pass-through serializer for plugin types whose data the engine doesn't interpret.
pub struct OpaqueSerializer {
    kind: AnnotationType,
}

impl OpaqueSerializer {
    pub fn new(type_name: &str) -> Self {
        Self {
            kind: AnnotationType::Other(type_name.to_string()),
        }
    }
}

impl AnnotationSerializer for OpaqueSerializer {
    fn annotation_type(&self) -> AnnotationType {
        self.kind.clone()
    }

    fn serialize(&self, payload: &Payload) -> Result<serde_json::Value, SerializeError> {
        match payload {
            Payload::Custom(value) => Ok(value.clone()),
            other => Err(SerializeError::type_mismatch(self.kind.as_str(), other.kind_name())),
        }
    }

    fn deserialize(&self, wire: &serde_json::Value) -> Result<Payload, SerializeError> {
        Ok(Payload::Custom(wire.clone()))
    }
}

/// One serializer per built-in type.
pub fn builtin_serializers() -> Vec<Box<dyn AnnotationSerializer>> {
    vec![
        Box::new(TypedSerializer::<BoundingBox>::new()),
        Box::new(TypedSerializer::<CompoundPath>::new()),
        Box::new(TypedSerializer::<Polyline>::new()),
        Box::new(TypedSerializer::<Skeleton>::new()),
        Box::new(TagSerializer),
        Box::new(TypedSerializer::<Table>::new()),
        Box::new(TypedSerializer::<DirectionalVector>::new()),
        Box::new(TypedSerializer::<MaskData>::new()),
        Box::new(TypedSerializer::<RasterLayerData>::new()),
    ]
}
