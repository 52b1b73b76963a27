//! Raster brush painting mask annotations of the current class.

use annotate_geom::ImagePoint;

use crate::raster::mask::MaskStroke;
use crate::tool::{Cursor, Key, KeyEvent, MouseButton, PointerEvent, Tool, ToolContext};
use crate::view::palette::DRAFT_COLOR;
use crate::view::{DrawSurface, View};

#[derive(Debug, Default)]
enum MaskBrushState {
    #[default]
    Idle,
    Painting(MaskStroke),
}

/// Paints (or erases) pixels of the current class's mask.
///
/// Pixels change while the pointer moves; releasing records the stroke as
/// one history entry.
#[derive(Debug, Default)]
pub struct MaskBrushTool {
    state: MaskBrushState,
    /// Tip center and radius under the pointer
    hover: Option<(ImagePoint, f64)>,
}

impl MaskBrushTool {
    pub const NAME: &'static str = "mask_brush";

    pub fn new() -> Self {
        Self::default()
    }

    fn finish(&mut self, cx: &mut ToolContext<'_>) {
        let MaskBrushState::Painting(stroke) = std::mem::take(&mut self.state) else {
            return;
        };
        if let Some(edit) = stroke.finish(&mut cx.action_context()) {
            log::debug!("Mask stroke touched {} annotations", edit.annotation_changes());
            cx.record(Box::new(edit));
        }
    }
}

impl Tool for MaskBrushTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// A half-done stroke is kept rather than thrown away.
    fn reset(&mut self, cx: &mut ToolContext<'_>) {
        self.finish(cx);
        self.hover = None;
    }

    fn on_pointer_down(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        self.finish(cx);

        let Some(class_id) = cx.class_id.filter(|c| cx.is_mask_class(*c)) else {
            cx.notices.info("Select a mask class to paint");
            return;
        };
        let eraser = event.button == MouseButton::Right || event.modifiers.alt;
        let mut stroke = match MaskStroke::begin(cx.view, class_id, cx.settings.brush_tip, eraser) {
            Ok(stroke) => stroke,
            Err(e) => {
                log::warn!("Cannot start mask stroke: {}", e);
                cx.notices.warning(format!("Cannot paint: {}", e));
                return;
            }
        };
        stroke.stroke(cx.view, event.image, cx.settings.brush_size / 2.0);
        self.state = MaskBrushState::Painting(stroke);
    }

    fn on_pointer_move(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        self.hover = Some((event.image, cx.settings.brush_size / 2.0));
        if let MaskBrushState::Painting(stroke) = &mut self.state {
            stroke.stroke(cx.view, event.image, cx.settings.brush_size / 2.0);
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ToolContext<'_>, _event: &PointerEvent) {
        self.finish(cx);
    }

    fn on_key_down(&mut self, cx: &mut ToolContext<'_>, event: &KeyEvent) -> bool {
        if event.key == Key::Escape {
            self.reset(cx);
            return true;
        }
        false
    }

    fn draw_overlay(&self, view: &View, surface: &mut dyn DrawSurface) {
        if let Some((center, radius)) = self.hover {
            let radius = view.camera.image_len_to_canvas(radius);
            surface.arc(view.camera.image_to_canvas(center), radius, DRAFT_COLOR, false);
        }
    }

    fn cursor(&self) -> Cursor {
        Cursor::Crosshair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotationType;
    use crate::tool::tests::{Harness, MASK_CLASS};

    fn painted_pixels(h: &Harness) -> usize {
        let Some(raster) = h.view.rasters.raster_for_file("image.png").and_then(|id| h.view.rasters.raster(id))
        else {
            return 0;
        };
        raster.buffer().iter().filter(|l| **l != 0).count()
    }

    #[test]
    fn test_stroke_paints_and_undoes() {
        let mut h = Harness::new();
        h.class_id = Some(MASK_CLASS);
        h.activate(MaskBrushTool::NAME);

        h.down(20.0, 20.0);
        h.move_to(40.0, 20.0);
        h.up(40.0, 20.0);

        assert!(painted_pixels(&h) > 100);
        let masks = h.view.annotations.annotations();
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].annotation_type, AnnotationType::Mask);
        assert_eq!(h.history.undo_count(), 1);

        assert!(h.undo());
        assert_eq!(painted_pixels(&h), 0);
        assert!(h.view.annotations.is_empty());
    }

    #[test]
    fn test_non_mask_class_notifies() {
        let mut h = Harness::new();
        h.activate(MaskBrushTool::NAME);
        h.click(20.0, 20.0);
        assert!(h.view.rasters.is_empty());
        assert_eq!(h.notices.len(), 1);
    }
}
