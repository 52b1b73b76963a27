//! Registry mapping annotation type names to serializers.

use std::collections::HashMap;

use crate::model::{
    Annotation, AnnotationData, AnnotationType, Payload, SubAnnotations, VideoData,
};
use crate::serializer::error::SerializeError;
use crate::serializer::traits::AnnotationSerializer;
use crate::serializer::wire::{VideoWire, WireAnnotation, is_video_data};

/// Handle returned by [`SerializerRegistry::register`]; pass it back to unregister.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerializerHandle(u64);

struct Entry {
    handle: u64,
    serializer: Box<dyn AnnotationSerializer>,
}

/// Registry of serializers, one per annotation type name.
///
/// Starts empty; plugins add their serializers on activation and remove them
/// again with the handle they got back.
#[derive(Default)]
pub struct SerializerRegistry {
    entries: HashMap<String, Entry>,
    next_handle: u64,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializer under its type name.
    pub fn register(
        &mut self,
        serializer: Box<dyn AnnotationSerializer>,
    ) -> Result<SerializerHandle, SerializeError> {
        let name = serializer.annotation_type().as_str().to_string();
        if self.entries.contains_key(&name) {
            return Err(SerializeError::AlreadyRegistered(name));
        }
        self.next_handle += 1;
        let handle = self.next_handle;
        log::debug!("Registered serializer '{}'", name);
        self.entries.insert(name, Entry { handle, serializer });
        Ok(SerializerHandle(handle))
    }

    /// Remove the serializer registered with `handle`. Returns false if it was already gone.
    pub fn unregister(&mut self, handle: SerializerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|name, entry| {
            let keep = entry.handle != handle.0;
            if !keep {
                log::debug!("Unregistered serializer '{}'", name);
            }
            keep
        });
        self.entries.len() != before
    }

    pub fn get(&self, type_name: &str) -> Option<&dyn AnnotationSerializer> {
        self.entries.get(type_name).map(|e| e.serializer.as_ref())
    }

    pub fn contains(&self, kind: &AnnotationType) -> bool {
        self.entries.contains_key(kind.as_str())
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, kind: &AnnotationType) -> Result<&dyn AnnotationSerializer, SerializeError> {
        self.get(kind.as_str())
            .ok_or_else(|| SerializeError::UnknownType(kind.as_str().to_string()))
    }

    pub fn serialize(
        &self,
        kind: &AnnotationType,
        payload: &Payload,
    ) -> Result<serde_json::Value, SerializeError> {
        self.lookup(kind)?.serialize(payload)
    }

    pub fn deserialize(
        &self,
        kind: &AnnotationType,
        wire: &serde_json::Value,
    ) -> Result<Payload, SerializeError> {
        self.lookup(kind)?.deserialize(wire)
    }

    /// Serialize still-image or video data, including sub-annotations.
    pub fn serialize_data(
        &self,
        kind: &AnnotationType,
        data: &AnnotationData,
        subs: &SubAnnotations,
    ) -> Result<serde_json::Value, SerializeError> {
        match data {
            AnnotationData::Image(payload) => {
                let mut value = self.serialize(kind, payload)?;
                subs.merge_into(&mut value)?;
                Ok(value)
            }
            AnnotationData::Video(video) => {
                let frames = video
                    .frames
                    .iter()
                    .map(|(index, payload)| -> Result<_, SerializeError> {
                        Ok((*index, self.serialize(kind, payload)?))
                    })
                    .collect::<Result<_, SerializeError>>()?;
                let wire = VideoWire {
                    frames,
                    segments: video.segments.clone(),
                    sub_frames: video.sub_frames.clone(),
                    interpolated: video.interpolated,
                };
                Ok(serde_json::to_value(wire)?)
            }
        }
    }

    /// Deserialize a wire `data` object, detecting the video wrapper shape.
    pub fn deserialize_data(
        &self,
        kind: &AnnotationType,
        wire: &serde_json::Value,
    ) -> Result<(AnnotationData, SubAnnotations), SerializeError> {
        if is_video_data(wire) {
            let video: VideoWire = serde_json::from_value(wire.clone())?;
            let frames = video
                .frames
                .iter()
                .map(|(index, value)| -> Result<_, SerializeError> {
                    Ok((*index, self.deserialize(kind, value)?))
                })
                .collect::<Result<_, SerializeError>>()?;
            let data = VideoData {
                frames,
                segments: video.segments,
                sub_frames: video.sub_frames,
                interpolated: video.interpolated,
            };
            Ok((AnnotationData::Video(data), SubAnnotations::default()))
        } else {
            let payload = self.deserialize(kind, wire)?;
            let subs = SubAnnotations::from_wire_object(wire)?;
            Ok((AnnotationData::Image(payload), subs))
        }
    }

    /// Full annotation → wire record.
    pub fn to_wire(&self, annotation: &Annotation) -> Result<WireAnnotation, SerializeError> {
        Ok(WireAnnotation {
            id: annotation.id,
            annotation_type: annotation.annotation_type.clone(),
            data: self.serialize_data(
                &annotation.annotation_type,
                annotation.data(),
                &annotation.sub_annotations,
            )?,
            actors: annotation.actors.clone(),
            annotation_class_id: annotation.class_id,
            z_index: annotation.z_index,
        })
    }

    /// Wire record → full annotation.
    pub fn from_wire(&self, wire: &WireAnnotation) -> Result<Annotation, SerializeError> {
        let (data, subs) = self.deserialize_data(&wire.annotation_type, &wire.data)?;
        let mut annotation = Annotation::new(wire.annotation_type.clone(), data)
            .with_id(wire.id)
            .with_class(wire.annotation_class_id);
        annotation.sub_annotations = subs;
        annotation.actors = wire.actors.clone();
        annotation.z_index = wire.z_index;
        Ok(annotation)
    }
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
