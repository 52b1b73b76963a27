//! Authoritative store of a view's annotations.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use annotate_geom::ImagePoint;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::video::interpolate_at;
use crate::model::{
    Annotation, AnnotationClass, AnnotationData, AnnotationId, ClassId, Payload, SubAnnotations,
    VideoData, VideoSubAnnotationData,
};
use crate::persistence::{AnnotationBackend, ItemKey};
use crate::serializer::SerializerRegistry;

/// How video annotations are resolved between keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyframeInference {
    /// Show the nearest keyframe at or before the frame (or the first after it)
    #[default]
    Snap,
    /// Blend neighbouring keyframes of annotations flagged `interpolated`
    Interpolate,
}

/// CRUD over one view's annotations, plus per-frame resolution of video data.
///
/// Mutations set a dirty flag that the owning view turns into a repaint of
/// the annotation layer. Local mutation and persistence are separate calls so
/// actions can roll back when the backend refuses a change.
pub struct AnnotationManager {
    annotations: HashMap<AnnotationId, Annotation>,
    /// Insertion order, used to break z-index ties
    order: Vec<AnnotationId>,
    next_id: u64,
    classes: Vec<AnnotationClass>,
    current_frame: u32,
    total_frames: u32,
    loading: bool,
    inference: KeyframeInference,
    backend: Rc<dyn AnnotationBackend>,
    item: ItemKey,
    dirty: Cell<bool>,
    /// Payloads resolved for the current frame
    resolved: RefCell<HashMap<AnnotationId, Option<Payload>>>,
}

impl AnnotationManager {
    pub fn new(backend: Rc<dyn AnnotationBackend>, item: ItemKey) -> Self {
        Self {
            annotations: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
            classes: Vec::new(),
            current_frame: 0,
            total_frames: 1,
            loading: false,
            inference: KeyframeInference::default(),
            backend,
            item,
            dirty: Cell::new(false),
            resolved: RefCell::new(HashMap::new()),
        }
    }

    pub fn item(&self) -> &ItemKey {
        &self.item
    }

    /// Point the manager at another item, dropping all local annotations.
    pub fn set_item(&mut self, item: ItemKey) {
        self.item = item;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.order.clear();
        self.invalidate_cache();
    }

    pub fn inference(&self) -> KeyframeInference {
        self.inference
    }

    pub fn set_inference(&mut self, inference: KeyframeInference) {
        self.inference = inference;
        self.invalidate_cache();
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn has_annotation(&self, id: AnnotationId) -> bool {
        self.annotations.contains_key(&id)
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    /// Annotations in draw order: ascending z-index, then insertion order.
    pub fn annotations(&self) -> Vec<&Annotation> {
        let mut out: Vec<&Annotation> = self
            .order
            .iter()
            .filter_map(|id| self.annotations.get(id))
            .collect();
        out.sort_by_key(|a| a.z_index);
        out
    }

    pub fn ids(&self) -> Vec<AnnotationId> {
        self.annotations().iter().map(|a| a.id).collect()
    }

    pub fn max_z_index(&self) -> i32 {
        self.annotations.values().map(|a| a.z_index).max().unwrap_or(0)
    }

    // ========================================================================
    // Classes
    // ========================================================================

    pub fn set_classes(&mut self, classes: Vec<AnnotationClass>) {
        self.classes = classes;
    }

    pub fn classes(&self) -> &[AnnotationClass] {
        &self.classes
    }

    pub fn class(&self, id: ClassId) -> Option<&AnnotationClass> {
        self.classes.iter().find(|c| c.id == id)
    }

    // ========================================================================
    // Local mutation
    // ========================================================================

    fn validate(&self, annotation: &Annotation) -> Result<()> {
        if let Some(payload) = annotation
            .data()
            .payloads()
            .find(|p| !p.matches(&annotation.annotation_type))
        {
            return Err(EngineError::type_mismatch(
                annotation.annotation_type.as_str(),
                payload.kind_name(),
            ));
        }
        if let Some(class) = annotation.class_id.and_then(|id| self.class(id)) {
            if !class.allows(&annotation.annotation_type) {
                return Err(EngineError::type_mismatch(
                    format!("a type of class '{}'", class.name),
                    annotation.annotation_type.as_str(),
                ));
            }
        }
        Ok(())
    }

    /// Validate and insert `annotation`, assigning an id if it has none.
    pub fn create_annotation(&mut self, mut annotation: Annotation) -> Result<AnnotationId> {
        self.validate(&annotation)?;
        if !annotation.id.is_assigned() {
            annotation.id = AnnotationId(self.next_id);
        }
        let id = annotation.id;
        if self.annotations.contains_key(&id) {
            return Err(EngineError::DuplicateId(id));
        }
        self.next_id = self.next_id.max(id.0 + 1);

        log::debug!("Created {} annotation {}", annotation.annotation_type, id);
        self.annotations.insert(id, annotation);
        self.order.push(id);
        self.touch(id);
        Ok(id)
    }

    /// Replace the annotation with the same id. Returns the previous version.
    pub fn update_annotation(&mut self, annotation: Annotation) -> Result<Annotation> {
        self.validate(&annotation)?;
        let id = annotation.id;
        let slot = self
            .annotations
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        let previous = std::mem::replace(slot, annotation);
        self.touch(id);
        Ok(previous)
    }

    /// Replace only the data of an annotation. Returns the previous data.
    pub fn set_annotation_data(
        &mut self,
        id: AnnotationId,
        data: AnnotationData,
    ) -> Result<AnnotationData> {
        let annotation = self.annotations.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        if let Some(payload) = data.payloads().find(|p| !p.matches(&annotation.annotation_type)) {
            return Err(EngineError::type_mismatch(
                annotation.annotation_type.as_str(),
                payload.kind_name(),
            ));
        }
        let previous = annotation.set_data(data);
        self.touch(id);
        Ok(previous)
    }

    pub fn set_sub_annotations(&mut self, id: AnnotationId, subs: SubAnnotations) -> Result<SubAnnotations> {
        let annotation = self.annotations.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let previous = std::mem::replace(&mut annotation.sub_annotations, subs);
        self.touch(id);
        Ok(previous)
    }

    /// Remove by id. Returns the removed annotation.
    pub fn delete_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        let annotation = self.annotations.remove(&id)?;
        self.order.retain(|other| *other != id);
        self.touch(id);
        log::debug!("Deleted annotation {}", id);
        Some(annotation)
    }

    fn touch(&self, id: AnnotationId) {
        self.resolved.borrow_mut().remove(&id);
        self.dirty.set(true);
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn persist_create(&self, id: AnnotationId, serializers: &SerializerRegistry) -> Result<()> {
        let annotation = self.annotation(id).ok_or(EngineError::NotFound(id))?;
        let wire = serializers.to_wire(annotation)?;
        self.backend.create_annotation(&self.item, &wire)?;
        Ok(())
    }

    pub fn persist_update(&self, id: AnnotationId, serializers: &SerializerRegistry) -> Result<()> {
        let annotation = self.annotation(id).ok_or(EngineError::NotFound(id))?;
        let wire = serializers.to_wire(annotation)?;
        self.backend.update_annotation(&self.item, &wire)?;
        Ok(())
    }

    pub fn persist_delete(&self, id: AnnotationId) -> Result<()> {
        self.backend.delete_annotation(&self.item, id)?;
        Ok(())
    }

    /// Replace the local set with what the backend has for the current item.
    ///
    /// Records whose type has no registered serializer are skipped with a warning.
    pub fn load(&mut self, serializers: &SerializerRegistry) -> Result<usize> {
        let records = self.backend.list_annotations(&self.item)?;
        self.clear();
        for wire in &records {
            match serializers.from_wire(wire) {
                Ok(annotation) => {
                    self.create_annotation(annotation)?;
                }
                Err(e) => log::warn!("Skipping annotation {}: {}", wire.id, e),
            }
        }
        log::info!("Loaded {} annotations for item '{}'", self.len(), self.item.item_id);
        Ok(self.len())
    }

    // ========================================================================
    // Frames
    // ========================================================================

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, total: u32) {
        self.total_frames = total.max(1);
    }

    /// Move to `frame`. Resolved payloads and sub-annotations are recomputed lazily.
    pub fn set_current_frame(&mut self, frame: u32) {
        if self.current_frame != frame {
            self.current_frame = frame;
            self.invalidate_cache();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// While loading, video annotations resolve to nothing.
    pub fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.invalidate_cache();
        }
    }

    pub fn invalidate_cache(&self) {
        self.resolved.borrow_mut().clear();
        self.dirty.set(true);
    }

    /// Whether anything changed since the last call.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    // ========================================================================
    // Video resolution
    // ========================================================================

    /// Payload shown at the current frame for keyframed `data`.
    ///
    /// Snaps to the nearest keyframe at or before the frame, else the nearest
    /// after it. Interpolates only in [`KeyframeInference::Interpolate`] mode
    /// and only for data flagged `interpolated`.
    pub fn infer_video_data(&self, data: &VideoData) -> Option<Payload> {
        let frame = self.current_frame;
        if self.loading || !data.is_visible_at(frame) {
            return None;
        }
        if self.inference == KeyframeInference::Interpolate && data.interpolated {
            return interpolate_at(&data.frames, frame);
        }
        data.closest_keyframe(frame).map(|(_, p)| p.clone())
    }

    /// Payload of `id` at the current frame, cached until the frame or the annotation changes.
    pub fn resolved_payload(&self, id: AnnotationId) -> Option<Payload> {
        if let Some(cached) = self.resolved.borrow().get(&id) {
            return cached.clone();
        }
        let annotation = self.annotations.get(&id)?;
        let payload = match annotation.data() {
            AnnotationData::Image(p) => Some(p.clone()),
            AnnotationData::Video(v) => self.infer_video_data(v),
        };
        self.resolved.borrow_mut().insert(id, payload.clone());
        payload
    }

    /// Sub-annotations stored at exactly the current frame.
    pub fn video_sub_annotation_data(&self, annotation: &Annotation) -> VideoSubAnnotationData {
        let frame = self.current_frame;
        match annotation.data() {
            AnnotationData::Video(v) if !self.loading && v.is_visible_at(frame) => v
                .sub_frames
                .get(&frame)
                .map(|subs| VideoSubAnnotationData {
                    subs: subs.clone(),
                    is_keyframe: true,
                })
                .unwrap_or_default(),
            _ => VideoSubAnnotationData::default(),
        }
    }

    /// Sub-annotations in effect at the current frame: the last ones stored at or before it.
    pub fn infer_video_sub_annotations(&self, annotation: &Annotation) -> Option<SubAnnotations> {
        let frame = self.current_frame;
        match annotation.data() {
            AnnotationData::Video(v) if !self.loading && v.is_visible_at(frame) => {
                v.previous_sub_frame(frame).map(|(_, subs)| subs.clone())
            }
            AnnotationData::Video(_) => None,
            AnnotationData::Image(_) => Some(annotation.sub_annotations.clone()),
        }
    }

    // ========================================================================
    // Hit testing and selection
    // ========================================================================

    /// Topmost visible annotation under `point`.
    pub fn annotation_at(&self, point: &ImagePoint, tolerance: f64) -> Option<AnnotationId> {
        self.annotations()
            .into_iter()
            .rev()
            .filter(|a| a.flags.is_visible)
            .find(|a| {
                self.resolved_payload(a.id)
                    .is_some_and(|p| p.hit_test(point, tolerance))
            })
            .map(|a| a.id)
    }

    fn set_flag(&mut self, id: AnnotationId, f: impl FnOnce(&mut Annotation)) -> bool {
        match self.annotations.get_mut(&id) {
            Some(annotation) => {
                f(annotation);
                self.dirty.set(true);
                true
            }
            None => false,
        }
    }

    /// Select `id` exclusively.
    pub fn select(&mut self, id: AnnotationId) -> bool {
        if !self.has_annotation(id) {
            return false;
        }
        self.deselect_all();
        self.set_flag(id, |a| a.flags.is_selected = true)
    }

    pub fn deselect(&mut self, id: AnnotationId) -> bool {
        self.set_flag(id, |a| a.flags.is_selected = false)
    }

    pub fn deselect_all(&mut self) {
        for annotation in self.annotations.values_mut() {
            annotation.flags.is_selected = false;
        }
        self.dirty.set(true);
    }

    pub fn highlight(&mut self, id: AnnotationId) -> bool {
        self.set_flag(id, |a| a.flags.is_highlighted = true)
    }

    pub fn unhighlight_all(&mut self) {
        for annotation in self.annotations.values_mut() {
            annotation.flags.is_highlighted = false;
        }
        self.dirty.set(true);
    }

    pub fn set_visible(&mut self, id: AnnotationId, visible: bool) -> bool {
        self.set_flag(id, |a| a.flags.is_visible = visible)
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.annotations()
            .into_iter()
            .find(|a| a.flags.is_selected)
            .map(|a| a.id)
    }

    /// Select the annotation after the selected one in draw order, wrapping around.
    pub fn select_next(&mut self) -> Option<AnnotationId> {
        self.select_relative(1)
    }

    /// Select the annotation before the selected one in draw order, wrapping around.
    pub fn select_previous(&mut self) -> Option<AnnotationId> {
        self.select_relative(-1)
    }

    fn select_relative(&mut self, step: isize) -> Option<AnnotationId> {
        let ids = self.ids();
        if ids.is_empty() {
            return None;
        }
        let len = ids.len() as isize;
        let next = match self.selected().and_then(|s| ids.iter().position(|id| *id == s)) {
            Some(i) => (i as isize + step).rem_euclid(len),
            None if step > 0 => 0,
            None => len - 1,
        };
        let id = ids[next as usize];
        self.select(id);
        Some(id)
    }
}

impl std::fmt::Debug for AnnotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationManager")
            .field("item", &self.item)
            .field("annotations", &self.annotations.len())
            .field("current_frame", &self.current_frame)
            .field("inference", &self.inference)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationType, Segment};
    use crate::persistence::InMemoryBackend;
    use crate::serializer::builtin_serializers;
    use annotate_geom::BoundingBox;
    use std::collections::BTreeMap;

    fn manager() -> (AnnotationManager, Rc<InMemoryBackend>) {
        let backend = Rc::new(InMemoryBackend::new());
        let manager = AnnotationManager::new(backend.clone(), ItemKey::new("item"));
        (manager, backend)
    }

    fn registry() -> SerializerRegistry {
        let mut registry = SerializerRegistry::new();
        for serializer in builtin_serializers() {
            registry.register(serializer).unwrap();
        }
        registry
    }

    fn bbox(x: f64) -> Payload {
        Payload::BoundingBox(BoundingBox::new(x, 0.0, 10.0, 10.0))
    }

    fn image_box(x: f64) -> Annotation {
        Annotation::new(AnnotationType::BoundingBox, AnnotationData::Image(bbox(x)))
    }

    fn video_box(keys: &[(u32, f64)], segment: Segment) -> Annotation {
        let data = VideoData {
            frames: keys.iter().map(|(f, x)| (*f, bbox(*x))).collect(),
            segments: vec![segment],
            sub_frames: BTreeMap::new(),
            interpolated: true,
        };
        Annotation::new(AnnotationType::BoundingBox, AnnotationData::Video(data))
    }

    #[test]
    fn test_create_assigns_ids() {
        let (mut m, _) = manager();
        let a = m.create_annotation(image_box(0.0)).unwrap();
        let b = m.create_annotation(image_box(5.0)).unwrap();
        assert_ne!(a, b);
        assert!(a.is_assigned());
        assert!(m.take_dirty());
        assert!(!m.take_dirty());
    }

    #[test]
    fn test_create_rejects_duplicates_and_mismatches() {
        let (mut m, _) = manager();
        let id = m.create_annotation(image_box(0.0)).unwrap();
        assert!(matches!(
            m.create_annotation(image_box(1.0).with_id(id)),
            Err(EngineError::DuplicateId(_))
        ));

        let wrong = Annotation::new(AnnotationType::Polygon, AnnotationData::Image(bbox(0.0)));
        assert!(matches!(
            m.create_annotation(wrong),
            Err(EngineError::TypeMismatch { .. })
        ));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_explicit_ids_advance_counter() {
        let (mut m, _) = manager();
        m.create_annotation(image_box(0.0).with_id(AnnotationId(10))).unwrap();
        let next = m.create_annotation(image_box(0.0)).unwrap();
        assert_eq!(next, AnnotationId(11));
    }

    #[test]
    fn test_class_must_allow_type() {
        let (mut m, _) = manager();
        m.set_classes(vec![AnnotationClass::new(1, "road", vec![AnnotationType::Polygon])]);
        assert!(m.create_annotation(image_box(0.0).with_class(Some(1))).is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let (mut m, _) = manager();
        let id = m.create_annotation(image_box(0.0)).unwrap();
        let previous = m.set_annotation_data(id, AnnotationData::Image(bbox(3.0))).unwrap();
        assert_eq!(previous, AnnotationData::Image(bbox(0.0)));
        assert!(m.delete_annotation(id).is_some());
        assert!(m.delete_annotation(id).is_none());
        assert!(matches!(
            m.set_annotation_data(id, AnnotationData::Image(bbox(3.0))),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_infer_snaps_to_previous_keyframe() {
        let (mut m, _) = manager();
        let id = m
            .create_annotation(video_box(&[(2, 0.0), (8, 60.0)], Segment(0, 10)))
            .unwrap();

        m.set_current_frame(5);
        assert_eq!(m.resolved_payload(id), Some(bbox(0.0)));
        m.set_current_frame(1);
        assert_eq!(m.resolved_payload(id), Some(bbox(0.0)));
        m.set_current_frame(9);
        assert_eq!(m.resolved_payload(id), Some(bbox(60.0)));
        m.set_current_frame(11);
        assert_eq!(m.resolved_payload(id), None);
    }

    #[test]
    fn test_infer_interpolates_when_enabled() {
        let (mut m, _) = manager();
        let id = m
            .create_annotation(video_box(&[(0, 0.0), (10, 100.0)], Segment(0, 10)))
            .unwrap();
        m.set_inference(KeyframeInference::Interpolate);
        m.set_current_frame(5);
        assert_eq!(m.resolved_payload(id), Some(bbox(50.0)));
    }

    #[test]
    fn test_loading_hides_video_annotations() {
        let (mut m, _) = manager();
        let id = m.create_annotation(video_box(&[(0, 0.0)], Segment(0, 10))).unwrap();
        m.set_loading(true);
        assert_eq!(m.resolved_payload(id), None);
        m.set_loading(false);
        assert!(m.resolved_payload(id).is_some());
    }

    #[test]
    fn test_video_sub_annotations() {
        let (mut m, _) = manager();
        let mut annotation = video_box(&[(0, 0.0)], Segment(0, 10));
        if let AnnotationData::Video(mut v) = annotation.data().clone() {
            v.sub_frames.insert(
                3,
                SubAnnotations {
                    text: Some("car".into()),
                    ..Default::default()
                },
            );
            annotation.set_data(AnnotationData::Video(v));
        }
        let id = m.create_annotation(annotation).unwrap();

        m.set_current_frame(3);
        let exact = m.video_sub_annotation_data(m.annotation(id).unwrap());
        assert!(exact.is_keyframe);
        assert_eq!(exact.subs.text.as_deref(), Some("car"));

        m.set_current_frame(6);
        let exact = m.video_sub_annotation_data(m.annotation(id).unwrap());
        assert!(!exact.is_keyframe);
        let inferred = m.infer_video_sub_annotations(m.annotation(id).unwrap()).unwrap();
        assert_eq!(inferred.text.as_deref(), Some("car"));
    }

    #[test]
    fn test_hit_testing_prefers_topmost() {
        let (mut m, _) = manager();
        let low = m.create_annotation(image_box(0.0)).unwrap();
        let mut top = image_box(5.0);
        top.z_index = 3;
        let top = m.create_annotation(top).unwrap();

        assert_eq!(m.annotation_at(&ImagePoint::new(7.0, 5.0), 0.0), Some(top));
        assert_eq!(m.annotation_at(&ImagePoint::new(2.0, 5.0), 0.0), Some(low));
        assert_eq!(m.annotation_at(&ImagePoint::new(50.0, 50.0), 0.0), None);
    }

    #[test]
    fn test_selection_cycles() {
        let (mut m, _) = manager();
        let a = m.create_annotation(image_box(0.0)).unwrap();
        let b = m.create_annotation(image_box(20.0)).unwrap();
        assert_eq!(m.select_next(), Some(a));
        assert_eq!(m.select_next(), Some(b));
        assert_eq!(m.select_next(), Some(a));
        assert_eq!(m.select_previous(), Some(b));
        assert_eq!(m.selected(), Some(b));
        assert!(!m.annotation(a).unwrap().flags.is_selected);
    }

    #[test]
    fn test_persist_and_load() {
        let (mut m, backend) = manager();
        let registry = registry();
        let id = m.create_annotation(image_box(1.0)).unwrap();
        m.persist_create(id, &registry).unwrap();
        assert!(backend.annotation(&ItemKey::new("item"), id).is_some());

        let mut fresh = AnnotationManager::new(backend.clone(), ItemKey::new("item"));
        assert_eq!(fresh.load(&registry).unwrap(), 1);
        assert_eq!(fresh.annotation(id).unwrap().data(), &AnnotationData::Image(bbox(1.0)));
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let (mut m, backend) = manager();
        let id = m.create_annotation(image_box(1.0)).unwrap();
        backend.set_offline(true);
        assert!(matches!(
            m.persist_create(id, &registry()),
            Err(EngineError::Backend(_))
        ));
    }
}
