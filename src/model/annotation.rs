//! The annotation record owned by an annotation manager.

use std::cell::OnceCell;
use std::fmt;

use annotate_geom::ImagePoint;
use serde::{Deserialize, Serialize};

use super::payload::{AnnotationType, Payload};
use super::sub_annotation::SubAnnotations;
use super::video::VideoData;

/// Unique identifier for an annotation within a view session.
///
/// `AnnotationId(0)` is reserved for "not yet assigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl AnnotationId {
    pub const UNASSIGNED: AnnotationId = AnnotationId(0);

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of an annotation class.
pub type ClassId = u64;

/// Still-image payload or keyframed video data.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationData {
    Image(Payload),
    Video(VideoData),
}

impl AnnotationData {
    pub fn as_image(&self) -> Option<&Payload> {
        match self {
            AnnotationData::Image(p) => Some(p),
            AnnotationData::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoData> {
        match self {
            AnnotationData::Video(v) => Some(v),
            AnnotationData::Image(_) => None,
        }
    }

    /// Every payload stored in this data, keyframes included.
    pub fn payloads(&self) -> Box<dyn Iterator<Item = &Payload> + '_> {
        match self {
            AnnotationData::Image(p) => Box::new(std::iter::once(p)),
            AnnotationData::Video(v) => Box::new(v.frames.values()),
        }
    }

    /// Write `payload` as the value shown at `frame`.
    ///
    /// For video data this adds or replaces the keyframe at `frame`.
    pub fn with_payload_at(&self, frame: u32, payload: Payload) -> AnnotationData {
        match self {
            AnnotationData::Image(_) => AnnotationData::Image(payload),
            AnnotationData::Video(v) => {
                let mut video = v.clone();
                video.frames.insert(frame, payload);
                AnnotationData::Video(video)
            }
        }
    }
}

/// Per-annotation display flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationFlags {
    pub is_selected: bool,
    pub is_visible: bool,
    pub is_highlighted: bool,
}

impl Default for AnnotationFlags {
    fn default() -> Self {
        Self {
            is_selected: false,
            is_visible: true,
            is_highlighted: false,
        }
    }
}

/// A single annotation.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub id: AnnotationId,
    pub annotation_type: AnnotationType,
    pub class_id: Option<ClassId>,
    data: AnnotationData,
    /// Sub-annotations of still-image annotations; video keeps them per frame
    pub sub_annotations: SubAnnotations,
    pub actors: Vec<String>,
    pub z_index: i32,
    pub flags: AnnotationFlags,
    centroid: OnceCell<Option<ImagePoint>>,
}

impl Annotation {
    /// Create an annotation with an unassigned id.
    pub fn new(annotation_type: AnnotationType, data: AnnotationData) -> Self {
        Self {
            id: AnnotationId::UNASSIGNED,
            annotation_type,
            class_id: None,
            data,
            sub_annotations: SubAnnotations::default(),
            actors: Vec::new(),
            z_index: 0,
            flags: AnnotationFlags::default(),
            centroid: OnceCell::new(),
        }
    }

    pub fn with_id(mut self, id: AnnotationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_class(mut self, class_id: Option<ClassId>) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn data(&self) -> &AnnotationData {
        &self.data
    }

    /// Replace the data, dropping the cached centroid. Returns the previous data.
    pub fn set_data(&mut self, data: AnnotationData) -> AnnotationData {
        self.centroid = OnceCell::new();
        std::mem::replace(&mut self.data, data)
    }

    pub fn is_video(&self) -> bool {
        matches!(self.data, AnnotationData::Video(_))
    }

    /// Centroid of a still-image annotation, computed once per data revision.
    pub fn centroid(&self) -> Option<ImagePoint> {
        *self.centroid.get_or_init(|| match &self.data {
            AnnotationData::Image(p) => p.centroid(),
            AnnotationData::Video(_) => None,
        })
    }

    /// Whether every stored payload fits this annotation's type.
    pub fn payloads_match_type(&self) -> bool {
        self.data.payloads().all(|p| p.matches(&self.annotation_type))
    }
}

// The centroid cache is derived state and never takes part in equality.
impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.annotation_type == other.annotation_type
            && self.class_id == other.class_id
            && self.data == other.data
            && self.sub_annotations == other.sub_annotations
            && self.actors == other.actors
            && self.z_index == other.z_index
            && self.flags == other.flags
    }
}

/// A class annotations can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationClass {
    pub id: ClassId,
    pub name: String,
    /// Types annotations of this class may have
    pub annotation_types: Vec<AnnotationType>,
    #[serde(default)]
    pub color: [u8; 3],
}

impl AnnotationClass {
    pub fn new(id: ClassId, name: &str, annotation_types: Vec<AnnotationType>) -> Self {
        Self {
            id,
            name: name.to_string(),
            annotation_types,
            color: [255, 255, 255],
        }
    }

    pub fn allows(&self, kind: &AnnotationType) -> bool {
        self.annotation_types.is_empty() || self.annotation_types.contains(kind)
    }

    pub fn is_mask_class(&self) -> bool {
        self.annotation_types.contains(&AnnotationType::Mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotate_geom::BoundingBox;

    fn bbox_annotation() -> Annotation {
        Annotation::new(
            AnnotationType::BoundingBox,
            AnnotationData::Image(Payload::BoundingBox(BoundingBox::new(0.0, 0.0, 4.0, 2.0))),
        )
    }

    #[test]
    fn test_new_annotation_is_unassigned_and_visible() {
        let a = bbox_annotation();
        assert!(!a.id.is_assigned());
        assert!(a.flags.is_visible);
        assert!(!a.flags.is_selected);
    }

    #[test]
    fn test_centroid_invalidated_by_set_data() {
        let mut a = bbox_annotation();
        assert_eq!(a.centroid(), Some(ImagePoint::new(2.0, 1.0)));

        let previous = a.set_data(AnnotationData::Image(Payload::BoundingBox(BoundingBox::new(
            10.0, 10.0, 2.0, 2.0,
        ))));
        assert!(matches!(previous, AnnotationData::Image(Payload::BoundingBox(_))));
        assert_eq!(a.centroid(), Some(ImagePoint::new(11.0, 11.0)));
    }

    #[test]
    fn test_equality_ignores_centroid_cache() {
        let a = bbox_annotation();
        let b = bbox_annotation();
        let _ = a.centroid();
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_payload_at_adds_keyframe() {
        let video = AnnotationData::Video(VideoData::starting_at(
            0,
            10,
            Payload::BoundingBox(BoundingBox::default()),
        ));
        let updated = video.with_payload_at(5, Payload::BoundingBox(BoundingBox::new(1.0, 1.0, 1.0, 1.0)));
        let frames = &updated.as_video().unwrap().frames;
        assert_eq!(frames.len(), 2);
        assert!(frames.contains_key(&5));
    }

    #[test]
    fn test_class_allows() {
        let class = AnnotationClass::new(1, "car", vec![AnnotationType::Polygon]);
        assert!(class.allows(&AnnotationType::Polygon));
        assert!(!class.allows(&AnnotationType::Mask));
        assert!(AnnotationClass::new(2, "any", vec![]).allows(&AnnotationType::Mask));
    }
}
