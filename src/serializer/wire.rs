//! Wire representation of annotations exchanged with the persistence layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnnotationId, AnnotationType, ClassId, Segment, SubAnnotations};

/// Annotation as stored remotely: `{id, type, data, actors, annotation_class_id, z_index}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireAnnotation {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    pub data: serde_json::Value,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_class_id: Option<ClassId>,
    #[serde(default)]
    pub z_index: i32,
}

/// Video wrapper around per-frame payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct VideoWire {
    pub frames: BTreeMap<u32, serde_json::Value>,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_frames: BTreeMap<u32, SubAnnotations>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub interpolated: bool,
}

/// Whether a wire `data` object is the video wrapper shape.
pub(crate) fn is_video_data(data: &serde_json::Value) -> bool {
    data.get("frames").is_some_and(serde_json::Value::is_object)
        && data.get("segments").is_some_and(serde_json::Value::is_array)
}
