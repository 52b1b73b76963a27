//! Mask annotations on top of a view's rasters.
//!
//! Raster pixels are edited live while a gesture runs; when the gesture ends
//! the edit is packaged as a [`MaskEditAction`] that already happened and is
//! recorded into history. Mask annotations are created, updated and deleted
//! through the regular annotation actions, grouped inside that edit.

use std::collections::BTreeSet;

use annotate_geom::{BoundingBox, CompoundPath, ImagePoint};

use crate::action::{
    Action, ActionContext, ActionGroup, CreateAnnotationAction, DeleteAnnotationAction,
    MaskEditAction, UpdateAnnotationDataAction,
};
use crate::error::{EngineError, Result};
use crate::model::{
    Annotation, AnnotationData, AnnotationId, AnnotationType, ClassId, MaskData, Payload,
    RasterLayerData,
};
use crate::raster::painter::{BrushPainter, StrokeOutcome, TipShape};
use crate::raster::rasterize::fill_compound_path;
use crate::raster::{EMPTY_LABEL, PixelRegion, RasterError, RasterId, RasterPatch};
use crate::view::View;

/// Raster of the view's current file, created on first use.
///
/// Fails if the view has no file, since labels would otherwise be allocated
/// in a raster nobody can resolve later.
pub fn get_or_create_raster_for_view(view: &mut View) -> Result<RasterId> {
    let file = view
        .files
        .current_file()
        .ok_or(EngineError::ResourceNotInitialized("current file"))?;
    if let Some(id) = view.rasters.raster_for_file(&file.id) {
        return Ok(id);
    }
    let (file_id, width, height) = (file.id.clone(), file.width, file.height);
    Ok(view.rasters.create_raster(&file_id, width, height)?)
}

/// The mask annotation of `class_id` on the raster, if any.
pub fn annotation_for_class_on_raster(
    view: &View,
    raster_id: RasterId,
    class_id: ClassId,
) -> Option<AnnotationId> {
    let raster = view.rasters.raster(raster_id)?;
    raster
        .labels_on_raster()
        .map(|(_, id)| id)
        .find(|id| {
            view.annotations
                .annotation(*id)
                .is_some_and(|a| a.class_id == Some(class_id))
        })
}

/// Create a mask annotation of `class_id` bound to `label`.
///
/// Returns the applied action, or `None` if the annotation could not be
/// created or persisted (the label stays unbound in that case).
pub fn create_mask_annotation(
    cx: &mut ActionContext<'_>,
    raster_id: RasterId,
    bounding_box: BoundingBox,
    label: u8,
    class_id: ClassId,
) -> Option<CreateAnnotationAction> {
    let annotation = Annotation::new(
        AnnotationType::Mask,
        AnnotationData::Image(Payload::Mask(MaskData {
            raster_id,
            bounding_box: Some(bounding_box),
        })),
    )
    .with_class(Some(class_id));

    let mut action = CreateAnnotationAction::new(annotation);
    if !action.perform(cx) {
        return None;
    }
    cx.view.rasters.raster_mut(raster_id)?.bind_label(label, action.id());
    Some(action)
}

/// Mask pixels removed together with their annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskDetachment {
    pub raster_id: RasterId,
    pub label: u8,
    /// Pixels over the label's extent before it was cleared
    pub patch: Option<RasterPatch>,
}

/// Clear the pixels and label of a mask annotation. `None` for other annotations.
pub fn detach_mask(view: &mut View, id: AnnotationId) -> Option<MaskDetachment> {
    let raster_id = match view.annotations.annotation(id)?.data() {
        AnnotationData::Image(Payload::Mask(mask)) => mask.raster_id,
        _ => return None,
    };
    let raster = view.rasters.raster_mut(raster_id)?;
    let label = raster.label_for(id)?;
    let patch = raster
        .label_bounds(label)
        .and_then(|region| raster.read_patch(region).ok());
    if let Some(patch) = &patch {
        raster.clear_label(label, Some(patch.region));
    }
    raster.unbind_annotation(id);
    Some(MaskDetachment {
        raster_id,
        label,
        patch,
    })
}

/// Undo [`detach_mask`].
pub fn reattach_mask(view: &mut View, id: AnnotationId, detachment: &MaskDetachment) {
    let Some(raster) = view.rasters.raster_mut(detachment.raster_id) else {
        log::warn!("Raster {:?} is gone, mask {} stays empty", detachment.raster_id, id);
        return;
    };
    if let Some(patch) = &detachment.patch {
        if let Err(e) = raster.write_patch(patch) {
            log::warn!("Restoring mask {} failed: {}", id, e);
        }
    }
    raster.bind_label(detachment.label, id);
}

/// Label to paint `class_id` with: the label of its existing mask, else the lowest free one.
fn label_for_class(
    view: &View,
    raster_id: RasterId,
    class_id: ClassId,
) -> Result<(u8, Option<AnnotationId>)> {
    let raster = view
        .rasters
        .raster(raster_id)
        .ok_or(RasterError::UnknownRaster(raster_id))?;
    match annotation_for_class_on_raster(view, raster_id, class_id) {
        Some(id) => Ok((raster.label_for(id).ok_or(RasterError::NoLabel(id))?, Some(id))),
        None => Ok((raster.next_available_label()?, None)),
    }
}

/// Raster state captured before an edit started.
struct EditStart {
    raster_id: RasterId,
    class_id: ClassId,
    label: u8,
    existing: Option<AnnotationId>,
    labels_before: Vec<(u8, AnnotationId)>,
}

fn mask_payload(raster_id: RasterId, region: Option<PixelRegion>) -> AnnotationData {
    AnnotationData::Image(Payload::Mask(MaskData {
        raster_id,
        bounding_box: region.map(|r| r.to_bounding_box()),
    }))
}

/// Bring mask annotations in line with the edited pixels and package the edit.
fn finish_edit(
    cx: &mut ActionContext<'_>,
    start: EditStart,
    before: RasterPatch,
    after: RasterPatch,
    overwritten: BTreeSet<u8>,
) -> Option<MaskEditAction> {
    let EditStart {
        raster_id,
        class_id,
        label,
        existing,
        labels_before,
    } = start;
    let mut group = ActionGroup::new();

    let painted = cx.view.rasters.raster(raster_id)?.label_bounds(label);
    match (existing, painted) {
        (Some(id), Some(region)) => {
            let data = mask_payload(raster_id, Some(region));
            if let Ok(mut update) = UpdateAnnotationDataAction::from_current(cx.view, id, data) {
                if update.perform(cx) {
                    group.push(Box::new(update));
                }
            }
        }
        (Some(id), None) => {
            let mut delete = DeleteAnnotationAction::new(id);
            if delete.perform(cx) {
                group.push(Box::new(delete));
            }
        }
        (None, Some(region)) => {
            let created =
                create_mask_annotation(cx, raster_id, region.to_bounding_box(), label, class_id);
            match created {
                Some(action) => group.push(Box::new(action)),
                None => {
                    // Could not persist: take the pixels back out
                    if let Some(raster) = cx.view.rasters.raster_mut(raster_id) {
                        let _ = raster.write_patch(&before);
                    }
                    return None;
                }
            }
        }
        (None, None) => {}
    }

    // Masks that lost pixels to this edit shrink or disappear
    for other in overwritten.into_iter().filter(|l| *l != label && *l != EMPTY_LABEL) {
        let Some(raster) = cx.view.rasters.raster(raster_id) else {
            break;
        };
        let Some(id) = raster.annotation_for(other) else {
            continue;
        };
        let bounds = raster.label_bounds(other);
        let mut action: Box<dyn Action> = match bounds {
            None => Box::new(DeleteAnnotationAction::new(id)),
            Some(region) => {
                match UpdateAnnotationDataAction::from_current(
                    cx.view,
                    id,
                    mask_payload(raster_id, Some(region)),
                ) {
                    Ok(update) => Box::new(update),
                    Err(_) => continue,
                }
            }
        };
        if action.perform(cx) {
            group.push(action);
        }
    }

    let labels_after = cx.view.rasters.raster(raster_id)?.label_bindings();
    Some(MaskEditAction::new(
        raster_id,
        before,
        after,
        labels_before,
        labels_after,
        group,
    ))
}

/// Paint `path` into the view's raster as `class_id`.
///
/// Reuses the label of the class's existing mask or allocates a new one.
/// Returns the applied edit for recording, or `None` if nothing was painted.
pub fn draw_polygon_to_raster(
    cx: &mut ActionContext<'_>,
    path: &CompoundPath,
    class_id: ClassId,
) -> Result<Option<MaskEditAction>> {
    let raster_id = get_or_create_raster_for_view(cx.view)?;
    let (label, existing) = label_for_class(cx.view, raster_id, class_id)?;
    let raster = cx.view.rasters.try_raster_mut(raster_id)?;
    let labels_before = raster.label_bindings();

    let mut pixels = Vec::new();
    let Some(region) = fill_compound_path(path, raster.width(), raster.height(), |x, y| {
        pixels.push((x, y));
    }) else {
        return Ok(None);
    };

    let before = raster.read_patch(region)?;
    let mut overwritten = BTreeSet::new();
    for (x, y) in pixels {
        if let Some(previous) = raster.set_label_at(x, y, label) {
            overwritten.insert(previous);
        }
    }
    let after = raster.read_patch(region)?;

    let start = EditStart {
        raster_id,
        class_id,
        label,
        existing,
        labels_before,
    };
    Ok(finish_edit(cx, start, before, after, overwritten))
}

/// A brush stroke on the view's raster, from pointer down to pointer up.
#[derive(Debug)]
pub struct MaskStroke {
    raster_id: RasterId,
    class_id: ClassId,
    existing: Option<AnnotationId>,
    labels_before: Vec<(u8, AnnotationId)>,
    painter: BrushPainter,
}

impl MaskStroke {
    pub fn begin(view: &mut View, class_id: ClassId, tip: TipShape, eraser: bool) -> Result<Self> {
        let raster_id = get_or_create_raster_for_view(view)?;
        let (label, existing) = label_for_class(view, raster_id, class_id)?;
        let raster = view.rasters.try_raster_mut(raster_id)?;
        Ok(Self {
            raster_id,
            class_id,
            existing,
            labels_before: raster.label_bindings(),
            painter: BrushPainter::begin(raster, label, tip, eraser),
        })
    }

    pub fn stroke(&mut self, view: &mut View, center: ImagePoint, radius: f64) {
        if let Some(raster) = view.rasters.raster_mut(self.raster_id) {
            self.painter.stroke(raster, center, radius);
        }
    }

    /// End the stroke. Returns the applied edit, or `None` if nothing changed.
    pub fn finish(self, cx: &mut ActionContext<'_>) -> Option<MaskEditAction> {
        let label = self.painter.label();
        let raster = cx.view.rasters.raster(self.raster_id)?;
        let StrokeOutcome {
            before,
            after,
            overwritten,
        } = self.painter.finish(raster)?;
        if before == after {
            return None;
        }
        let start = EditStart {
            raster_id: self.raster_id,
            class_id: self.class_id,
            label,
            existing: self.existing,
            labels_before: self.labels_before,
        };
        finish_edit(cx, start, before, after, overwritten)
    }
}

/// Persisted form of the raster of the view's current file.
pub fn raster_layer_data(view: &View) -> Option<RasterLayerData> {
    let file = view.files.current_file()?;
    let raster_id = view.rasters.raster_for_file(&file.id)?;
    Some(view.rasters.raster(raster_id)?.to_layer_data())
}

/// Load persisted raster data into the raster of the view's current file.
pub fn load_raster_layer(view: &mut View, data: &RasterLayerData) -> Result<RasterId> {
    let raster_id = get_or_create_raster_for_view(view)?;
    view.rasters.try_raster_mut(raster_id)?.load_layer_data(data)?;
    Ok(raster_id)
}
