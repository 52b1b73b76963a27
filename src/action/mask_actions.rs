//! Raster edits as history entries.

use crate::action::{Action, ActionContext, ActionGroup};
use crate::model::AnnotationId;
use crate::raster::{RasterId, RasterPatch};

/// A finished paint or fill on a raster, together with the mask annotation
/// changes it caused.
///
/// Built from an edit that was already applied live, so it is recorded
/// rather than performed. Redo writes the `after` pixels and re-applies the
/// annotation changes; undo reverts the annotation changes and writes the
/// `before` pixels back.
#[derive(Debug)]
pub struct MaskEditAction {
    raster_id: RasterId,
    before: RasterPatch,
    after: RasterPatch,
    labels_before: Vec<(u8, AnnotationId)>,
    labels_after: Vec<(u8, AnnotationId)>,
    annotations: ActionGroup,
}

impl MaskEditAction {
    pub fn new(
        raster_id: RasterId,
        before: RasterPatch,
        after: RasterPatch,
        labels_before: Vec<(u8, AnnotationId)>,
        labels_after: Vec<(u8, AnnotationId)>,
        annotations: ActionGroup,
    ) -> Self {
        Self {
            raster_id,
            before,
            after,
            labels_before,
            labels_after,
            annotations,
        }
    }

    pub fn raster_id(&self) -> RasterId {
        self.raster_id
    }

    /// Number of annotation changes bundled with the pixels.
    pub fn annotation_changes(&self) -> usize {
        self.annotations.len()
    }

    fn apply(
        cx: &mut ActionContext<'_>,
        raster_id: RasterId,
        patch: &RasterPatch,
        labels: &[(u8, AnnotationId)],
    ) -> bool {
        let Some(raster) = cx.view.rasters.raster_mut(raster_id) else {
            return false;
        };
        if let Err(e) = raster.write_patch(patch) {
            log::warn!("Writing raster patch failed: {}", e);
            return false;
        }
        raster.set_label_bindings(labels);
        true
    }
}

impl Action for MaskEditAction {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool {
        if !Self::apply(cx, self.raster_id, &self.after, &self.labels_after) {
            return false;
        }
        if !self.annotations.perform(cx) {
            Self::apply(cx, self.raster_id, &self.before, &self.labels_before);
            return false;
        }
        true
    }

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        if cx.view.rasters.raster(self.raster_id).is_none() {
            return false;
        }
        if !self.annotations.undo(cx) {
            return false;
        }
        Self::apply(cx, self.raster_id, &self.before, &self.labels_before)
    }

    fn description(&self) -> String {
        if self.annotations.is_empty() {
            "Edit mask".to_string()
        } else {
            format!("Edit mask ({})", self.annotations.description())
        }
    }
}
