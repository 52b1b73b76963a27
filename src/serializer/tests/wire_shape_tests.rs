//! Tests pinning the exact wire shapes of built-in types.

use annotate_geom::{BoundingBox, CompoundPath, ImagePoint};
use serde_json::json;

use super::builtin_registry;
use crate::model::{
    Annotation, AnnotationData, AnnotationId, AnnotationType, DirectionalVector, Payload,
    VideoData,
};

#[test]
fn test_bounding_box_shape() {
    let registry = builtin_registry();
    let wire = registry
        .serialize(
            &AnnotationType::BoundingBox,
            &Payload::BoundingBox(BoundingBox::new(1.0, 2.0, 3.0, 4.0)),
        )
        .unwrap();
    assert_eq!(wire, json!({"x": 1.0, "y": 2.0, "w": 3.0, "h": 4.0}));
}

#[test]
fn test_polygon_shape() {
    let registry = builtin_registry();
    let wire = registry
        .serialize(
            &AnnotationType::Polygon,
            &Payload::Polygon(CompoundPath::new(vec![
                ImagePoint::new(0.0, 0.0),
                ImagePoint::new(1.0, 0.0),
                ImagePoint::new(1.0, 1.0),
            ])),
        )
        .unwrap();
    assert_eq!(
        wire,
        json!({"path": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]})
    );
}

#[test]
fn test_tag_and_vector_shapes() {
    let registry = builtin_registry();
    assert_eq!(
        registry.serialize(&AnnotationType::Tag, &Payload::Tag).unwrap(),
        json!({})
    );
    assert_eq!(
        registry
            .serialize(
                &AnnotationType::DirectionalVector,
                &Payload::DirectionalVector(DirectionalVector {
                    angle: 0.5,
                    length: 2.0
                })
            )
            .unwrap(),
        json!({"angle": 0.5, "length": 2.0})
    );
}

#[test]
fn test_video_wrapper_shape() {
    let registry = builtin_registry();
    let annotation = Annotation::new(
        AnnotationType::Tag,
        AnnotationData::Video(VideoData::starting_at(3, 9, Payload::Tag)),
    )
    .with_id(AnnotationId(5));

    let wire = registry.to_wire(&annotation).unwrap();
    assert_eq!(wire.data, json!({"frames": {"3": {}}, "segments": [[3, 9]]}));

    let record = serde_json::to_value(&wire).unwrap();
    assert_eq!(record["type"], json!("tag"));
    assert_eq!(record["id"], json!(5));
    assert_eq!(record["z_index"], json!(0));
}
