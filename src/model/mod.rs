//! Annotation data model.

mod annotation;
mod payload;
mod sub_annotation;
pub mod video;

pub use annotation::{Annotation, AnnotationClass, AnnotationData, AnnotationFlags, AnnotationId, ClassId};
pub use payload::{
    AnnotationType, DirectionalVector, MaskData, Payload, Polyline, RasterLayerData, Skeleton,
    SkeletonNode, Table, TableCell,
};
pub use sub_annotation::{SUB_ANNOTATION_KEYS, SubAnnotations, VideoSubAnnotationData};
pub use video::{Segment, VideoData, find_closest_keyframe};
