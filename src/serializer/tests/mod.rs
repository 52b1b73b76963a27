//! Unit tests for serializers and the serializer registry.
//!
//! These verify wire shapes, round trips for every registered type, and that
//! mismatched data is rejected.

mod wire_shape_tests;

use crate::serializer::{SerializerRegistry, builtin_serializers};

/// Registry with every built-in serializer registered.
fn builtin_registry() -> SerializerRegistry {
    let mut registry = SerializerRegistry::new();
    for serializer in builtin_serializers() {
        registry.register(serializer).unwrap();
    }
    registry
}
