//! Selecting, moving and reshaping existing annotations.

use annotate_geom::{CanvasPoint, ImagePoint};

use crate::action::{DeleteAnnotationAction, UpdateAnnotationDataAction};
use crate::model::{AnnotationData, AnnotationId, Payload};
use crate::tool::{Cursor, Key, KeyEvent, PointerEvent, Tool, ToolContext, edited_annotation_data};

/// Pointer travel, in canvas pixels, before a press turns into a drag.
pub const MIN_DRAG_DISTANCE: f64 = 3.0;

/// What a drag acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    /// Move the whole shape
    Body,
    /// Move one vertex, numbered as in [`Payload::vertices`]
    Vertex(usize),
}

#[derive(Debug, Clone, Default)]
enum SelectState {
    #[default]
    Idle,
    /// Pressed on a target but not moved far enough yet
    PotentialDrag {
        id: AnnotationId,
        target: DragTarget,
        start: ImagePoint,
        start_canvas: CanvasPoint,
    },
    /// Dragging; the shape is updated locally and committed on release
    Dragging {
        id: AnnotationId,
        target: DragTarget,
        start: ImagePoint,
        original_data: AnnotationData,
        original_payload: Payload,
    },
}

/// Click to select, drag to move, drag a vertex of the selection to reshape.
#[derive(Debug, Default)]
pub struct SelectTool {
    state: SelectState,
    hovering: bool,
}

impl SelectTool {
    pub const NAME: &'static str = "select";

    pub fn new() -> Self {
        Self::default()
    }

    fn vertex_of_selection(cx: &ToolContext<'_>, event: &PointerEvent) -> Option<(AnnotationId, usize)> {
        let id = cx.view.annotations.selected()?;
        let payload = cx.view.annotations.resolved_payload(id)?;
        let tolerance = cx.hit_tolerance();
        payload
            .vertices()
            .iter()
            .position(|v| v.distance(&event.image) <= tolerance)
            .map(|index| (id, index))
    }

    fn dragged_payload(original: &Payload, target: DragTarget, start: ImagePoint, to: ImagePoint) -> Payload {
        let mut payload = original.clone();
        match target {
            DragTarget::Body => payload.translate(to.x - start.x, to.y - start.y),
            DragTarget::Vertex(index) => {
                payload.move_vertex(index, to);
            }
        }
        payload
    }
}

impl Tool for SelectTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn reset(&mut self, cx: &mut ToolContext<'_>) {
        if let SelectState::Dragging { id, original_data, .. } = std::mem::take(&mut self.state) {
            // Drop the uncommitted preview
            let _ = cx.view.annotations.set_annotation_data(id, original_data);
        }
    }

    fn on_pointer_down(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        self.reset(cx);

        if let Some((id, index)) = Self::vertex_of_selection(cx, event) {
            self.state = SelectState::PotentialDrag {
                id,
                target: DragTarget::Vertex(index),
                start: event.image,
                start_canvas: event.canvas,
            };
            return;
        }

        let tolerance = cx.hit_tolerance();
        match cx.view.annotations.annotation_at(&event.image, tolerance) {
            Some(id) => {
                cx.view.annotations.deselect_all();
                cx.view.annotations.select(id);
                log::debug!("Selected annotation {}", id);
                self.state = SelectState::PotentialDrag {
                    id,
                    target: DragTarget::Body,
                    start: event.image,
                    start_canvas: event.canvas,
                };
            }
            None => cx.view.annotations.deselect_all(),
        }
    }

    fn on_pointer_move(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        if let SelectState::PotentialDrag {
            id,
            target,
            start,
            start_canvas,
        } = self.state
        {
            if start_canvas.distance(&event.canvas) < MIN_DRAG_DISTANCE {
                return;
            }
            let Some(annotation) = cx.view.annotations.annotation(id) else {
                self.state = SelectState::Idle;
                return;
            };
            let original_data = annotation.data().clone();
            let Some(original_payload) = cx.view.annotations.resolved_payload(id) else {
                self.state = SelectState::Idle;
                return;
            };
            log::debug!("Dragging annotation {} ({:?})", id, target);
            self.state = SelectState::Dragging {
                id,
                target,
                start,
                original_data,
                original_payload,
            };
        }

        match &self.state {
            SelectState::Dragging {
                id,
                target,
                start,
                original_payload,
                ..
            } => {
                let payload = Self::dragged_payload(original_payload, *target, *start, event.image);
                if let Some(data) = edited_annotation_data(cx.view, *id, payload) {
                    let _ = cx.view.annotations.set_annotation_data(*id, data);
                }
            }
            _ => {
                let tolerance = cx.hit_tolerance();
                self.hovering = Self::vertex_of_selection(cx, event).is_some()
                    || cx.view.annotations.annotation_at(&event.image, tolerance).is_some();
            }
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        let SelectState::Dragging {
            id,
            target,
            start,
            original_data,
            original_payload,
        } = std::mem::take(&mut self.state)
        else {
            self.state = SelectState::Idle;
            return;
        };

        let payload = Self::dragged_payload(&original_payload, target, start, event.image);
        let Some(after) = edited_annotation_data(cx.view, id, payload) else {
            return;
        };
        if after == original_data {
            return;
        }
        let action = UpdateAnnotationDataAction::new(id, original_data.clone(), after);
        if !cx.perform(Box::new(action)) {
            let _ = cx.view.annotations.set_annotation_data(id, original_data);
        }
    }

    fn on_key_down(&mut self, cx: &mut ToolContext<'_>, event: &KeyEvent) -> bool {
        match event.key {
            Key::Delete | Key::Backspace => {
                let Some(id) = cx.view.annotations.selected() else {
                    return false;
                };
                self.reset(cx);
                cx.perform(Box::new(DeleteAnnotationAction::new(id)));
                true
            }
            Key::Escape => {
                self.reset(cx);
                cx.view.annotations.deselect_all();
                true
            }
            Key::Tab if event.modifiers.shift => cx.view.annotations.select_previous().is_some(),
            Key::Tab => cx.view.annotations.select_next().is_some(),
            _ => false,
        }
    }

    fn cursor(&self) -> Cursor {
        match self.state {
            SelectState::Dragging { .. } => Cursor::Move,
            _ if self.hovering => Cursor::Pointer,
            _ => Cursor::Default,
        }
    }
}
