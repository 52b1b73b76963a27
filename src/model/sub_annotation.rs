//! Sub-annotations attached to a parent annotation.
//!
//! On the wire, image annotations carry these keys inside their `data` object;
//! video annotations carry them per frame under `sub_frames`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::payload::DirectionalVector;

/// Wire keys reserved for sub-annotations inside a `data` object.
pub const SUB_ANNOTATION_KEYS: &[&str] = &["text", "attributes", "instance_id", "directional_vector"];

/// The set of sub-annotations on one annotation (or one video frame of it).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directional_vector: Option<DirectionalVector>,
}

impl SubAnnotations {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.attributes.is_none()
            && self.instance_id.is_none()
            && self.directional_vector.is_none()
    }

    /// Extract sub-annotation keys from a wire `data` object.
    pub fn from_wire_object(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let Some(object) = data.as_object() else {
            return Ok(Self::default());
        };
        let subset: serde_json::Map<String, serde_json::Value> = object
            .iter()
            .filter(|(k, _)| SUB_ANNOTATION_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(subset))
    }

    /// Merge these sub-annotations into a wire `data` object.
    pub fn merge_into(&self, data: &mut serde_json::Value) -> Result<(), serde_json::Error> {
        if self.is_empty() {
            return Ok(());
        }
        let serde_json::Value::Object(extra) = serde_json::to_value(self)? else {
            return Ok(());
        };
        if let Some(object) = data.as_object_mut() {
            object.extend(extra);
        }
        Ok(())
    }
}

/// Sub-annotation content resolved for the current video frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoSubAnnotationData {
    pub subs: SubAnnotations,
    /// True when `subs` was stored at exactly this frame
    pub is_keyframe: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ignores_payload_keys() {
        let data = serde_json::json!({"x": 1, "y": 2, "w": 3, "h": 4, "text": "car", "instance_id": 7});
        let subs = SubAnnotations::from_wire_object(&data).unwrap();
        assert_eq!(subs.text.as_deref(), Some("car"));
        assert_eq!(subs.instance_id, Some(7));
        assert!(subs.attributes.is_none());
    }

    #[test]
    fn test_merge_into_object() {
        let mut data = serde_json::json!({"x": 1});
        let subs = SubAnnotations {
            text: Some("hello".into()),
            ..Default::default()
        };
        subs.merge_into(&mut data).unwrap();
        assert_eq!(data, serde_json::json!({"x": 1, "text": "hello"}));
    }

    #[test]
    fn test_empty_merge_is_noop() {
        let mut data = serde_json::json!({});
        SubAnnotations::default().merge_into(&mut data).unwrap();
        assert_eq!(data, serde_json::json!({}));
    }
}
