//! Built-in actions over the annotation manager.
//!
//! Each action changes the local collection first and then persists the
//! change. If persisting fails the local change is rolled back and the action
//! reports `false`, so history never holds an entry the backend doesn't know.

use crate::action::{Action, ActionContext};
use crate::error::{EngineError, Result};
use crate::model::video::update_segment;
use crate::model::{Annotation, AnnotationData, AnnotationId};
use crate::raster::mask::{MaskDetachment, detach_mask, reattach_mask};
use crate::view::View;

/// Adds an annotation. Undo deletes it by id.
#[derive(Debug)]
pub struct CreateAnnotationAction {
    annotation: Annotation,
}

impl CreateAnnotationAction {
    pub fn new(annotation: Annotation) -> Self {
        Self { annotation }
    }

    /// Id of the created annotation; unassigned until the first successful perform.
    pub fn id(&self) -> AnnotationId {
        self.annotation.id
    }
}

impl Action for CreateAnnotationAction {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool {
        let manager = &mut cx.view.annotations;
        let id = match manager.create_annotation(self.annotation.clone()) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Create annotation failed: {}", e);
                return false;
            }
        };
        if let Err(e) = manager.persist_create(id, cx.serializers) {
            log::warn!("Persisting annotation {} failed: {}", id, e);
            manager.delete_annotation(id);
            return false;
        }
        // Redo must recreate the same id
        self.annotation.id = id;
        true
    }

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        let id = self.annotation.id;
        let manager = &mut cx.view.annotations;
        let Some(removed) = manager.delete_annotation(id) else {
            return false;
        };
        if let Err(e) = manager.persist_delete(id) {
            log::warn!("Deleting annotation {} remotely failed: {}", id, e);
            let _ = manager.create_annotation(removed);
            return false;
        }
        true
    }

    fn description(&self) -> String {
        format!("Create {}", self.annotation.annotation_type)
    }
}

/// An annotation removed by [`DeleteAnnotationAction`], with the mask pixels it owned.
#[derive(Debug, Clone)]
pub struct DeletedAnnotation {
    pub annotation: Annotation,
    pub mask: Option<MaskDetachment>,
}

/// Removes an annotation. Undo restores it with the same id and data.
#[derive(Debug)]
pub struct DeleteAnnotationAction {
    id: AnnotationId,
    deleted: Option<DeletedAnnotation>,
}

impl DeleteAnnotationAction {
    pub fn new(id: AnnotationId) -> Self {
        Self { id, deleted: None }
    }
}

fn remove_locally(view: &mut View, id: AnnotationId) -> Option<DeletedAnnotation> {
    let mask = detach_mask(view, id);
    let annotation = view.annotations.delete_annotation(id)?;
    Some(DeletedAnnotation { annotation, mask })
}

fn restore_locally(view: &mut View, deleted: &DeletedAnnotation) -> bool {
    if let Err(e) = view.annotations.create_annotation(deleted.annotation.clone()) {
        log::warn!("Restoring annotation {} failed: {}", deleted.annotation.id, e);
        return false;
    }
    if let Some(mask) = &deleted.mask {
        reattach_mask(view, deleted.annotation.id, mask);
    }
    true
}

impl Action for DeleteAnnotationAction {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool {
        if !cx.view.annotations.has_annotation(self.id) {
            return false;
        }
        let Some(deleted) = remove_locally(cx.view, self.id) else {
            return false;
        };
        if let Err(e) = cx.view.annotations.persist_delete(self.id) {
            log::warn!("Deleting annotation {} remotely failed: {}", self.id, e);
            restore_locally(cx.view, &deleted);
            return false;
        }
        self.deleted = Some(deleted);
        true
    }

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        let Some(deleted) = &self.deleted else {
            return false;
        };
        if cx.view.annotations.has_annotation(self.id) || !restore_locally(cx.view, deleted) {
            return false;
        }
        if let Err(e) = cx.view.annotations.persist_create(self.id, cx.serializers) {
            log::warn!("Re-creating annotation {} remotely failed: {}", self.id, e);
            remove_locally(cx.view, self.id);
            return false;
        }
        true
    }

    fn description(&self) -> String {
        match &self.deleted {
            Some(d) => format!("Delete {}", d.annotation.annotation_type),
            None => "Delete annotation".to_string(),
        }
    }
}

/// Replaces the data of an annotation.
#[derive(Debug)]
pub struct UpdateAnnotationDataAction {
    id: AnnotationId,
    before: AnnotationData,
    after: AnnotationData,
}

impl UpdateAnnotationDataAction {
    pub fn new(id: AnnotationId, before: AnnotationData, after: AnnotationData) -> Self {
        Self { id, before, after }
    }

    /// Update from the annotation's current data.
    pub fn from_current(view: &View, id: AnnotationId, after: AnnotationData) -> Result<Self> {
        let current = view
            .annotations
            .annotation(id)
            .ok_or(EngineError::NotFound(id))?;
        Ok(Self::new(id, current.data().clone(), after))
    }

    fn apply(&self, cx: &mut ActionContext<'_>, data: &AnnotationData, previous: &AnnotationData) -> bool {
        let manager = &mut cx.view.annotations;
        if let Err(e) = manager.set_annotation_data(self.id, data.clone()) {
            log::warn!("Updating annotation {} failed: {}", self.id, e);
            return false;
        }
        if let Err(e) = manager.persist_update(self.id, cx.serializers) {
            log::warn!("Persisting annotation {} failed: {}", self.id, e);
            let _ = manager.set_annotation_data(self.id, previous.clone());
            return false;
        }
        true
    }
}

impl Action for UpdateAnnotationDataAction {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool {
        self.apply(cx, &self.after, &self.before)
    }

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        self.apply(cx, &self.before, &self.after)
    }

    fn description(&self) -> String {
        "Update annotation".to_string()
    }
}

/// Moves or resizes one visibility segment of a video annotation.
#[derive(Debug)]
pub struct UpdateVideoSegmentsAction {
    update: UpdateAnnotationDataAction,
}

impl UpdateVideoSegmentsAction {
    /// Prepare moving segment `index` to `[start, end]`.
    ///
    /// Fails if the annotation is missing, is not a video annotation, or the
    /// edit would push keyframes past both ends of the video.
    pub fn new(view: &View, id: AnnotationId, index: usize, start: f64, end: f64) -> Result<Self> {
        let annotation = view
            .annotations
            .annotation(id)
            .ok_or(EngineError::NotFound(id))?;
        let video = annotation
            .data()
            .as_video()
            .ok_or_else(|| EngineError::type_mismatch("video annotation", "image annotation"))?;
        let updated = update_segment(video, index, start, end, view.annotations.total_frames())?;
        Ok(Self {
            update: UpdateAnnotationDataAction::new(
                id,
                annotation.data().clone(),
                AnnotationData::Video(updated),
            ),
        })
    }
}

impl Action for UpdateVideoSegmentsAction {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool {
        self.update.perform(cx)
    }

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        self.update.undo(cx)
    }

    fn description(&self) -> String {
        "Update video segments".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionManager;
    use crate::model::{AnnotationType, Payload, Segment, VideoData};
    use crate::persistence::{InMemoryBackend, ItemKey};
    use crate::serializer::{SerializerRegistry, builtin_serializers};
    use annotate_geom::BoundingBox;
    use std::rc::Rc;

    struct Fixture {
        view: View,
        serializers: SerializerRegistry,
        backend: Rc<InMemoryBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            let backend = Rc::new(InMemoryBackend::new());
            let mut serializers = SerializerRegistry::new();
            for s in builtin_serializers() {
                serializers.register(s).unwrap();
            }
            Self {
                view: View::for_tests(backend.clone()),
                serializers,
                backend,
            }
        }

        fn cx(&mut self) -> ActionContext<'_> {
            ActionContext::new(&mut self.view, &self.serializers)
        }

        fn stored(&self, id: AnnotationId) -> bool {
            self.backend
                .annotation(self.view.annotations.item(), id)
                .is_some()
        }
    }

    fn bbox(x: f64) -> AnnotationData {
        AnnotationData::Image(Payload::BoundingBox(BoundingBox::new(x, 0.0, 4.0, 4.0)))
    }

    fn new_box(x: f64) -> Annotation {
        Annotation::new(AnnotationType::BoundingBox, bbox(x))
    }

    #[test]
    fn test_create_undo_redo_keeps_id_and_data() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        assert!(history.perform(Box::new(CreateAnnotationAction::new(new_box(1.0))), &mut f.cx()));
        let id = f.view.annotations.ids()[0];
        let original = f.view.annotations.annotation(id).unwrap().clone();
        assert!(f.stored(id));

        assert!(history.undo(&mut f.cx()));
        assert!(f.view.annotations.is_empty());
        assert!(!f.stored(id));

        assert!(history.redo(&mut f.cx()));
        assert_eq!(f.view.annotations.annotation(id), Some(&original));
        assert!(f.stored(id));
    }

    #[test]
    fn test_create_rolls_back_when_backend_fails() {
        let mut f = Fixture::new();
        f.backend.set_offline(true);
        let mut history = ActionManager::default();
        assert!(!history.perform(Box::new(CreateAnnotationAction::new(new_box(1.0))), &mut f.cx()));
        assert!(f.view.annotations.is_empty());
        assert!(!history.can_undo());
    }

    #[test]
    fn test_delete_of_missing_annotation_is_stale() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        assert!(!history.perform(Box::new(DeleteAnnotationAction::new(AnnotationId(42))), &mut f.cx()));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_delete_undo_restores() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        history.perform(Box::new(CreateAnnotationAction::new(new_box(1.0))), &mut f.cx());
        let id = f.view.annotations.ids()[0];

        assert!(history.perform(Box::new(DeleteAnnotationAction::new(id)), &mut f.cx()));
        assert!(!f.view.annotations.has_annotation(id));
        assert!(history.undo(&mut f.cx()));
        assert_eq!(f.view.annotations.annotation(id).unwrap().data(), &bbox(1.0));
        assert!(f.stored(id));
    }

    #[test]
    fn test_update_undo_restores_previous_data() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        history.perform(Box::new(CreateAnnotationAction::new(new_box(1.0))), &mut f.cx());
        let id = f.view.annotations.ids()[0];

        let update = UpdateAnnotationDataAction::from_current(&f.view, id, bbox(9.0)).unwrap();
        assert!(history.perform(Box::new(update), &mut f.cx()));
        assert_eq!(f.view.annotations.annotation(id).unwrap().data(), &bbox(9.0));

        assert!(history.undo(&mut f.cx()));
        assert_eq!(f.view.annotations.annotation(id).unwrap().data(), &bbox(1.0));
    }

    #[test]
    fn test_update_after_target_deleted_is_stale() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        history.perform(Box::new(CreateAnnotationAction::new(new_box(1.0))), &mut f.cx());
        let id = f.view.annotations.ids()[0];
        let update = UpdateAnnotationDataAction::from_current(&f.view, id, bbox(9.0)).unwrap();
        f.view.annotations.delete_annotation(id);
        assert!(!history.perform(Box::new(update), &mut f.cx()));
    }

    #[test]
    fn test_undo_sequence_restores_initial_set() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        history.perform(Box::new(CreateAnnotationAction::new(new_box(1.0))), &mut f.cx());
        let before: Vec<Annotation> = f.view.annotations.annotations().into_iter().cloned().collect();
        let id = f.view.annotations.ids()[0];

        let steps: Vec<Box<dyn Action>> = vec![
            Box::new(CreateAnnotationAction::new(new_box(2.0))),
            Box::new(UpdateAnnotationDataAction::from_current(&f.view, id, bbox(5.0)).unwrap()),
            Box::new(CreateAnnotationAction::new(new_box(3.0))),
            Box::new(DeleteAnnotationAction::new(id)),
        ];
        let n = steps.len();
        for step in steps {
            assert!(history.perform(step, &mut f.cx()));
        }
        for _ in 0..n {
            assert!(history.undo(&mut f.cx()));
        }
        let after: Vec<Annotation> = f.view.annotations.annotations().into_iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_segment_update_shifts_keyframes() {
        let mut f = Fixture::new();
        f.view.annotations.set_total_frames(20);
        let data = VideoData {
            frames: [(2, Payload::BoundingBox(BoundingBox::default()))].into(),
            segments: vec![Segment(2, 5)],
            ..Default::default()
        };
        let id = f
            .view
            .annotations
            .create_annotation(Annotation::new(
                AnnotationType::BoundingBox,
                AnnotationData::Video(data),
            ))
            .unwrap();
        f.view.annotations.persist_create(id, &f.serializers).unwrap();

        let mut history = ActionManager::default();
        let action = UpdateVideoSegmentsAction::new(&f.view, id, 0, 6.0, 9.0).unwrap();
        assert!(history.perform(Box::new(action), &mut f.cx()));
        let video = f.view.annotations.annotation(id).unwrap().data().as_video().unwrap().clone();
        assert_eq!(video.segments, vec![Segment(6, 9)]);
        assert!(video.frames.contains_key(&6));

        assert!(history.undo(&mut f.cx()));
        let video = f.view.annotations.annotation(id).unwrap().data().as_video().unwrap().clone();
        assert_eq!(video.segments, vec![Segment(2, 5)]);
    }

    #[test]
    fn test_segment_update_on_image_annotation_is_type_mismatch() {
        let mut f = Fixture::new();
        let id = f.view.annotations.create_annotation(new_box(0.0)).unwrap();
        assert!(matches!(
            UpdateVideoSegmentsAction::new(&f.view, id, 0, 0.0, 1.0),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_item_key_is_used_for_persistence() {
        let f = Fixture::new();
        assert_eq!(f.view.annotations.item(), &ItemKey::new("test-item"));
    }
}
