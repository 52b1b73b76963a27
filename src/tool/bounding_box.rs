use annotate_geom::{BoundingBox, ImagePoint};

use crate::action::CreateAnnotationAction;
use crate::model::{Annotation, AnnotationType, Payload};
use crate::tool::{Cursor, Key, KeyEvent, PointerEvent, Tool, ToolContext, new_annotation_data};
use crate::view::palette::DRAFT_COLOR;
use crate::view::{DrawSurface, View};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum BoxState {
    #[default]
    Idle,
    Drawing {
        start: ImagePoint,
        current: ImagePoint,
    },
}

/// Drag out a bounding box.
#[derive(Debug, Default)]
pub struct BoundingBoxTool {
    state: BoxState,
}

impl BoundingBoxTool {
    pub const NAME: &'static str = "bounding_box";

    pub fn new() -> Self {
        Self::default()
    }

    fn draft(&self) -> Option<BoundingBox> {
        match self.state {
            BoxState::Drawing { start, current } => Some(BoundingBox::from_corners(start, current)),
            BoxState::Idle => None,
        }
    }
}

impl Tool for BoundingBoxTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn reset(&mut self, _cx: &mut ToolContext<'_>) {
        self.state = BoxState::Idle;
    }

    fn on_pointer_down(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        cx.view.annotations.deselect_all();
        self.state = BoxState::Drawing {
            start: event.image,
            current: event.image,
        };
    }

    fn on_pointer_move(&mut self, _cx: &mut ToolContext<'_>, event: &PointerEvent) {
        if let BoxState::Drawing { current, .. } = &mut self.state {
            *current = event.image;
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        let BoxState::Drawing { start, .. } = std::mem::take(&mut self.state) else {
            return;
        };
        let bounds = BoundingBox::from_corners(start, event.image);
        if bounds.is_empty() {
            log::debug!("Ignoring empty bounding box");
            return;
        }

        let data = new_annotation_data(cx.view, Payload::BoundingBox(bounds));
        let annotation = Annotation::new(AnnotationType::BoundingBox, data).with_class(cx.class_id);
        cx.perform(Box::new(CreateAnnotationAction::new(annotation)));
    }

    fn on_key_down(&mut self, cx: &mut ToolContext<'_>, event: &KeyEvent) -> bool {
        if event.key == Key::Escape && self.state != BoxState::Idle {
            self.reset(cx);
            return true;
        }
        false
    }

    fn draw_overlay(&self, view: &View, surface: &mut dyn DrawSurface) {
        if let Some(draft) = self.draft() {
            let corners: Vec<_> = draft.corners().iter().map(|p| view.camera.image_to_canvas(*p)).collect();
            surface.stroke(&corners, true, DRAFT_COLOR, 1.0);
        }
    }

    fn cursor(&self) -> Cursor {
        Cursor::Crosshair
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::tests::Harness;
    use crate::view::{DrawCommand, RecordingSurface};

    #[test]
    fn test_drag_creates_box() {
        let mut h = Harness::new();
        h.activate(BoundingBoxTool::NAME);
        h.down(10.0, 20.0);
        h.move_to(30.0, 25.0);
        h.up(40.0, 50.0);

        let annotations = h.view.annotations.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(
            annotations[0].data().as_image(),
            Some(&Payload::BoundingBox(BoundingBox::new(10.0, 20.0, 30.0, 30.0)))
        );
        assert_eq!(annotations[0].class_id, h.class_id);
    }

    #[test]
    fn test_click_without_drag_creates_nothing() {
        let mut h = Harness::new();
        h.activate(BoundingBoxTool::NAME);
        h.click(10.0, 10.0);
        assert!(h.view.annotations.is_empty());
        assert!(!h.history.can_undo());
    }

    #[test]
    fn test_draft_is_drawn_on_overlay() {
        let mut h = Harness::new();
        h.activate(BoundingBoxTool::NAME);
        h.down(10.0, 10.0);
        h.move_to(20.0, 20.0);

        let mut surface = RecordingSurface::default();
        if let Some(tool) = h.view.tools.active() {
            tool.draw_overlay(&h.view, &mut surface);
        }
        assert!(matches!(surface.commands.as_slice(), [DrawCommand::Stroke { closed: true, .. }]));
    }
}
