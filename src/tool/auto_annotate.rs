//! Server-assisted segmentation.
//!
//! The user drags a region (or clicks a point); the tool asks the server for
//! the outline of the object there and waits. Only the answer to the request
//! it is waiting for is used; resetting the tool abandons the request.

use annotate_geom::{BoundingBox, CompoundPath, ImagePoint};
use serde_json::{Value, json};

use crate::action::CreateAnnotationAction;
use crate::error::Result;
use crate::plugin::Owner;
use crate::model::{Annotation, AnnotationType, Payload};
use crate::raster::mask::draw_polygon_to_raster;
use crate::tool::select::MIN_DRAG_DISTANCE;
use crate::tool::{
    Cursor, Key, KeyEvent, PointerEvent, RequestId, ServerResponse, Tool, ToolContext, new_annotation_data,
};
use crate::view::palette::DRAFT_COLOR;
use crate::view::{DrawSurface, View};

pub const REQUEST_KIND: &str = "auto_annotate";
pub const CANCEL_COMMAND: &str = "auto_annotate.cancel";
pub const WAIT_CURSOR: &str = "auto_annotate.wait";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum AutoAnnotateState {
    #[default]
    Idle,
    /// Dragging out the region to segment
    Cropping { start: ImagePoint, current: ImagePoint },
    /// Suspended until the server answers `request`
    Waiting { request: RequestId },
}

#[derive(Debug, Default)]
pub struct AutoAnnotateTool {
    state: AutoAnnotateState,
}

impl AutoAnnotateTool {
    pub const NAME: &'static str = "auto_annotate";

    pub fn new() -> Self {
        Self::default()
    }

    fn request_payload(cx: &ToolContext<'_>, start: ImagePoint, end: ImagePoint) -> Value {
        let file = cx.view.files.current_file().map(|f| f.id.clone());
        let mut payload = json!({
            "file": file,
            "frame": cx.view.current_frame(),
            "class_id": cx.class_id,
        });
        let canvas_distance = cx.view.camera.image_len_to_canvas(start.distance(&end));
        if canvas_distance < MIN_DRAG_DISTANCE {
            payload["point"] = json!({"x": end.x, "y": end.y});
        } else {
            let region = BoundingBox::from_corners(start, end);
            payload["bounding_box"] = json!({"x": region.x, "y": region.y, "w": region.w, "h": region.h});
        }
        payload
    }

    /// Outline in a server answer, if there is a usable one.
    fn parse_path(payload: &Value) -> Option<CompoundPath> {
        let path: CompoundPath = serde_json::from_value(payload.clone()).ok()?;
        let path = path.normalized();
        (!path.is_empty()).then_some(path)
    }

    fn save(cx: &mut ToolContext<'_>, path: CompoundPath) -> Result<()> {
        if let Some(class_id) = cx.class_id.filter(|c| cx.is_mask_class(*c)) {
            if let Some(edit) = draw_polygon_to_raster(&mut cx.action_context(), &path, class_id)? {
                cx.record(Box::new(edit));
            }
            return Ok(());
        }
        let data = new_annotation_data(cx.view, Payload::Polygon(path));
        let annotation = Annotation::new(AnnotationType::Polygon, data).with_class(cx.class_id);
        cx.perform(Box::new(CreateAnnotationAction::new(annotation)));
        Ok(())
    }
}

impl Tool for AutoAnnotateTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn activate(&mut self, cx: &mut ToolContext<'_>) -> Result<()> {
        let owner = Owner::tool(Self::NAME);
        cx.registry.register_command(&owner, CANCEL_COMMAND)?;
        cx.registry.register_cursor(&owner, WAIT_CURSOR, "progress");
        Ok(())
    }

    fn reset(&mut self, _cx: &mut ToolContext<'_>) {
        if let AutoAnnotateState::Waiting { request } = self.state {
            log::info!("Abandoned auto-annotate request {}", request.0);
        }
        self.state = AutoAnnotateState::Idle;
    }

    fn on_pointer_down(&mut self, _cx: &mut ToolContext<'_>, event: &PointerEvent) {
        if let AutoAnnotateState::Waiting { .. } = self.state {
            return;
        }
        self.state = AutoAnnotateState::Cropping {
            start: event.image,
            current: event.image,
        };
    }

    fn on_pointer_move(&mut self, _cx: &mut ToolContext<'_>, event: &PointerEvent) {
        if let AutoAnnotateState::Cropping { current, .. } = &mut self.state {
            *current = event.image;
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        let AutoAnnotateState::Cropping { start, .. } = self.state else {
            return;
        };
        let payload = Self::request_payload(cx, start, event.image);
        let request = cx.requests.send(REQUEST_KIND, payload);
        self.state = AutoAnnotateState::Waiting { request };
    }

    fn on_key_down(&mut self, cx: &mut ToolContext<'_>, event: &KeyEvent) -> bool {
        if event.key == Key::Escape && self.state != AutoAnnotateState::Idle {
            self.reset(cx);
            return true;
        }
        false
    }

    fn on_command(&mut self, cx: &mut ToolContext<'_>, name: &str, _payload: &Value) -> Result<bool> {
        if name != CANCEL_COMMAND {
            return Ok(false);
        }
        self.reset(cx);
        Ok(true)
    }

    fn on_server_response(&mut self, cx: &mut ToolContext<'_>, response: &ServerResponse) {
        match self.state {
            AutoAnnotateState::Waiting { request } if request == response.id => {}
            _ => {
                log::debug!("Ignoring stale response {}", response.id.0);
                return;
            }
        }
        self.state = AutoAnnotateState::Idle;

        let Some(path) = Self::parse_path(&response.payload) else {
            cx.notices.info("No object found in the selected area");
            return;
        };
        if let Err(e) = Self::save(cx, path) {
            log::warn!("Saving auto-annotation failed: {}", e);
            cx.notices.warning(format!("Could not save the found object: {}", e));
        }
    }

    fn draw_overlay(&self, view: &View, surface: &mut dyn DrawSurface) {
        if let AutoAnnotateState::Cropping { start, current } = self.state {
            let corners: Vec<_> = BoundingBox::from_corners(start, current)
                .corners()
                .iter()
                .map(|p| view.camera.image_to_canvas(*p))
                .collect();
            surface.stroke(&corners, true, DRAFT_COLOR, 1.0);
        }
    }

    fn cursor(&self) -> Cursor {
        match self.state {
            AutoAnnotateState::Waiting { .. } => Cursor::Named(WAIT_CURSOR.to_string()),
            _ => Cursor::Crosshair,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::tests::Harness;

    fn triangle() -> Value {
        json!({"path": [{"x": 10.0, "y": 10.0}, {"x": 40.0, "y": 10.0}, {"x": 25.0, "y": 40.0}]})
    }

    fn drag_region(h: &mut Harness) -> RequestId {
        h.activate(AutoAnnotateTool::NAME);
        h.down(5.0, 5.0);
        h.move_to(30.0, 30.0);
        h.up(45.0, 45.0);
        let requests = h.requests.take();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, REQUEST_KIND);
        assert_eq!(requests[0].payload["bounding_box"]["w"], json!(40.0));
        requests[0].id
    }

    #[test]
    fn test_response_creates_polygon() {
        let mut h = Harness::new();
        let id = drag_region(&mut h);
        assert_eq!(h.cursor(), Cursor::Named(WAIT_CURSOR.to_string()));
        assert_eq!(h.resolved_cursor(), "progress");

        h.respond(id, triangle());
        assert_eq!(h.view.annotations.len(), 1);
        assert_eq!(h.cursor(), Cursor::Crosshair);
    }

    #[test]
    fn test_empty_response_notifies_without_mutation() {
        let mut h = Harness::new();
        let id = drag_region(&mut h);
        h.respond(id, json!({"path": []}));
        assert!(h.view.annotations.is_empty());
        assert!(!h.history.can_undo());
        assert_eq!(h.notices.len(), 1);

        let id = drag_region(&mut h);
        h.respond(id, Value::Null);
        assert!(h.view.annotations.is_empty());
        assert_eq!(h.notices.len(), 2);
    }

    #[test]
    fn test_cancelled_request_is_ignored() {
        let mut h = Harness::new();
        let id = drag_region(&mut h);
        assert!(h.command(CANCEL_COMMAND).unwrap());
        h.respond(id, triangle());
        assert!(h.view.annotations.is_empty());
    }

    #[test]
    fn test_click_sends_point() {
        let mut h = Harness::new();
        h.activate(AutoAnnotateTool::NAME);
        h.click(20.0, 25.0);
        let requests = h.requests.take();
        assert_eq!(requests[0].payload["point"], json!({"x": 20.0, "y": 25.0}));
    }
}
