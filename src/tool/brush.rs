//! Vector brush: paints polygon annotations as unions of brush tips.
//!
//! Each pointer sample contributes the tip footprint plus the hull between it
//! and the previous tip, so fast strokes leave no gaps. With a polygon
//! selected the stroke extends it (or cuts into it when erasing); otherwise a
//! new polygon is created on release.

use annotate_geom::compound_path::{regular_polygon_footprint, square_footprint, stroke_hull};
use annotate_geom::{CompoundPath, ImagePoint};

use crate::action::{CreateAnnotationAction, DeleteAnnotationAction, UpdateAnnotationDataAction};
use crate::model::{Annotation, AnnotationData, AnnotationId, AnnotationType, Payload};
use crate::raster::painter::TipShape;
use crate::tool::{
    Cursor, Key, KeyEvent, MouseButton, PointerEvent, Tool, ToolContext, edited_annotation_data,
    new_annotation_data,
};
use crate::view::palette::DRAFT_COLOR;
use crate::view::{DrawSurface, View};

/// Smallest brush diameter in image pixels.
pub const MIN_BRUSH_SIZE: f64 = 1.0;

/// Factor applied by the grow/shrink keys.
const SIZE_STEP: f64 = 1.25;

#[derive(Debug, Clone)]
struct Target {
    id: AnnotationId,
    base_data: AnnotationData,
}

#[derive(Debug, Clone, Default)]
enum BrushState {
    #[default]
    Idle,
    Painting {
        shape: CompoundPath,
        last_tip: CompoundPath,
        eraser: bool,
        /// Selected polygon the stroke edits
        target: Option<Target>,
    },
}

#[derive(Debug, Default)]
pub struct BrushTool {
    state: BrushState,
    /// Diameter chosen with the size keys; the configured size until then
    size: Option<f64>,
}

impl BrushTool {
    pub const NAME: &'static str = "brush";

    pub fn new() -> Self {
        Self::default()
    }

    fn size(&self, cx: &ToolContext<'_>) -> f64 {
        self.size.unwrap_or(cx.settings.brush_size).max(MIN_BRUSH_SIZE)
    }

    fn footprint(&self, cx: &ToolContext<'_>, center: ImagePoint) -> CompoundPath {
        let radius = self.size(cx) / 2.0;
        match cx.settings.brush_tip {
            TipShape::Round => regular_polygon_footprint(center, radius, cx.settings.brush_sides),
            TipShape::Square => square_footprint(center, radius),
        }
    }

    fn apply(shape: &CompoundPath, piece: &CompoundPath, eraser: bool) -> CompoundPath {
        if eraser {
            shape.subtract(piece)
        } else {
            shape.union(piece)
        }
    }

    fn selected_polygon(cx: &ToolContext<'_>) -> Option<(Target, CompoundPath)> {
        let id = cx.view.annotations.selected()?;
        let Payload::Polygon(path) = cx.view.annotations.resolved_payload(id)? else {
            return None;
        };
        let base_data = cx.view.annotations.annotation(id)?.data().clone();
        Some((Target { id, base_data }, path))
    }

    fn preview(cx: &mut ToolContext<'_>, target: &Target, shape: &CompoundPath) {
        if shape.is_empty() {
            return;
        }
        if let Some(data) = edited_annotation_data(cx.view, target.id, Payload::Polygon(shape.clone())) {
            let _ = cx.view.annotations.set_annotation_data(target.id, data);
        }
    }

    fn save(cx: &mut ToolContext<'_>, shape: CompoundPath, target: Option<Target>) {
        // Clean up slivers left by the boolean operations
        let shape = shape.normalized();
        match target {
            Some(Target { id, base_data }) => {
                let _ = cx.view.annotations.set_annotation_data(id, base_data.clone());
                if shape.is_empty() {
                    log::debug!("Brush erased annotation {} completely", id);
                    cx.perform(Box::new(DeleteAnnotationAction::new(id)));
                    return;
                }
                let Some(after) = edited_annotation_data(cx.view, id, Payload::Polygon(shape)) else {
                    return;
                };
                if after != base_data {
                    cx.perform(Box::new(UpdateAnnotationDataAction::new(id, base_data, after)));
                }
            }
            None => {
                if shape.is_empty() {
                    return;
                }
                let data = new_annotation_data(cx.view, Payload::Polygon(shape));
                let annotation = Annotation::new(AnnotationType::Polygon, data).with_class(cx.class_id);
                cx.perform(Box::new(CreateAnnotationAction::new(annotation)));
            }
        }
    }
}

impl Tool for BrushTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn reset(&mut self, cx: &mut ToolContext<'_>) {
        if let BrushState::Painting {
            target: Some(Target { id, base_data }),
            ..
        } = std::mem::take(&mut self.state)
        {
            let _ = cx.view.annotations.set_annotation_data(id, base_data);
        }
    }

    fn on_pointer_down(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        self.reset(cx);
        let eraser = event.button == MouseButton::Right || event.modifiers.alt;
        let tip = self.footprint(cx, event.image);

        let (target, base) = match Self::selected_polygon(cx) {
            Some((target, path)) => (Some(target), path),
            None if eraser => return,
            None => (None, CompoundPath::default()),
        };
        let shape = Self::apply(&base, &tip, eraser);
        if let Some(target) = &target {
            Self::preview(cx, target, &shape);
        }
        self.state = BrushState::Painting {
            shape,
            last_tip: tip,
            eraser,
            target,
        };
    }

    fn on_pointer_move(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        let tip = self.footprint(cx, event.image);
        let BrushState::Painting {
            shape,
            last_tip,
            eraser,
            target,
        } = &mut self.state
        else {
            return;
        };
        let hull = stroke_hull(last_tip, &tip);
        *shape = Self::apply(shape, &hull, *eraser);
        *last_tip = tip;
        if let Some(target) = target {
            Self::preview(cx, target, shape);
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ToolContext<'_>, _event: &PointerEvent) {
        if let BrushState::Painting { shape, target, .. } = std::mem::take(&mut self.state) {
            Self::save(cx, shape, target);
        }
    }

    fn on_key_down(&mut self, cx: &mut ToolContext<'_>, event: &KeyEvent) -> bool {
        let size = self.size(cx);
        match event.key {
            Key::Char(']') => self.size = Some(size * SIZE_STEP),
            Key::Char('[') => self.size = Some((size / SIZE_STEP).max(MIN_BRUSH_SIZE)),
            Key::Escape => self.reset(cx),
            _ => return false,
        }
        true
    }

    fn draw_overlay(&self, view: &View, surface: &mut dyn DrawSurface) {
        let BrushState::Painting { shape, target: None, .. } = &self.state else {
            return;
        };
        for ring in shape.sub_paths() {
            let points: Vec<_> = ring.iter().map(|p| view.camera.image_to_canvas(*p)).collect();
            surface.fill(&points, DRAFT_COLOR);
        }
    }

    fn cursor(&self) -> Cursor {
        Cursor::Crosshair
    }
}
