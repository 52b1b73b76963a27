//! Polygon drawing and vertex editing.
//!
//! Clicking adds vertices to a draft; clicking the first vertex again (or
//! pressing Enter) closes it. Each draft vertex is an action in one history
//! group, so undo while drawing takes the draft back. When the polygon is
//! committed the draft group is dropped from history and replaced by a single
//! create.
//!
//! On the selected polygon, pressing near an edge inserts a vertex there and
//! pressing on a vertex moves it. An insertion and the drag that follows it
//! are one history entry.

use std::cell::RefCell;
use std::rc::Rc;

use annotate_geom::algebra::{nearest_edge, project_on_segment};
use annotate_geom::compound_path::MIN_PATH_POINTS;
use annotate_geom::{CanvasPoint, CompoundPath, ImagePoint};
use serde_json::Value;

use crate::action::{Action, ActionContext, CreateAnnotationAction, GroupId, UpdateAnnotationDataAction};
use crate::error::Result;
use crate::plugin::Owner;
use crate::model::{Annotation, AnnotationData, AnnotationId, AnnotationType, Payload};
use crate::raster::mask::draw_polygon_to_raster;
use crate::tool::select::MIN_DRAG_DISTANCE;
use crate::tool::{
    Cursor, Key, KeyEvent, PointerEvent, Tool, ToolContext, edited_annotation_data, new_annotation_data,
};
use crate::view::palette::{DRAFT_COLOR, SELECTED_COLOR};
use crate::view::{DrawSurface, View};

pub const CLOSE_COMMAND: &str = "polygon.close";
pub const CANCEL_COMMAND: &str = "polygon.cancel";

type Draft = Rc<RefCell<Vec<ImagePoint>>>;

/// Appends one vertex to the polygon being drawn.
#[derive(Debug)]
struct DraftPointAction {
    draft: Draft,
    point: ImagePoint,
}

impl Action for DraftPointAction {
    fn perform(&mut self, _cx: &mut ActionContext<'_>) -> bool {
        self.draft.borrow_mut().push(self.point);
        true
    }

    fn undo(&mut self, _cx: &mut ActionContext<'_>) -> bool {
        let mut draft = self.draft.borrow_mut();
        if draft.last() != Some(&self.point) {
            return false;
        }
        draft.pop();
        true
    }

    fn description(&self) -> String {
        "Add polygon point".to_string()
    }
}

/// Gesture state of the polygon tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PolygonToolState {
    #[default]
    Idle,
    /// Adding vertices to the draft; `group` holds the draft points in history
    Drawing { group: GroupId },
    /// Pressed near an edge of the selected polygon; releasing inserts a vertex
    DeterminingInsertion {
        id: AnnotationId,
        sub_path: usize,
        edge: usize,
        point: ImagePoint,
        start_canvas: CanvasPoint,
    },
    /// Performing the insertion's actions into its group
    CommittingInsertion {
        id: AnnotationId,
        group: GroupId,
    },
    /// Dragging one vertex of the selected polygon
    MovingVertex {
        id: AnnotationId,
        /// Insertion group the move joins, if the vertex was just inserted
        group: Option<GroupId>,
        /// Index over all sub-paths, as in [`Payload::vertices`]
        vertex: usize,
        start_canvas: CanvasPoint,
        base_data: AnnotationData,
        base_payload: Payload,
        moved: bool,
    },
}

#[derive(Debug, Default)]
pub struct PolygonTool {
    state: PolygonToolState,
    draft: Draft,
    hover: Option<CanvasPoint>,
}

impl PolygonTool {
    pub const NAME: &'static str = "polygon";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PolygonToolState {
        &self.state
    }

    /// Vertices of the polygon being drawn.
    pub fn draft(&self) -> Vec<ImagePoint> {
        self.draft.borrow().clone()
    }

    fn selected_polygon(cx: &ToolContext<'_>) -> Option<(AnnotationId, CompoundPath)> {
        let id = cx.view.annotations.selected()?;
        match cx.view.annotations.resolved_payload(id)? {
            Payload::Polygon(path) => Some((id, path)),
            _ => None,
        }
    }

    /// Start editing the selected polygon if the press hits it. Returns whether it did.
    fn begin_edit(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) -> bool {
        let Some((id, path)) = Self::selected_polygon(cx) else {
            return false;
        };
        let camera = &cx.view.camera;
        let threshold = cx.settings.hit_threshold;

        let hit_vertex = path
            .sub_paths()
            .flatten()
            .position(|v| camera.image_to_canvas(*v).distance(&event.canvas) <= threshold);
        if let Some(vertex) = hit_vertex {
            let Some(annotation) = cx.view.annotations.annotation(id) else {
                return false;
            };
            self.state = PolygonToolState::MovingVertex {
                id,
                group: None,
                vertex,
                start_canvas: event.canvas,
                base_data: annotation.data().clone(),
                base_payload: Payload::Polygon(path),
                moved: false,
            };
            return true;
        }

        // Compare in canvas space so the target keeps its size on screen
        let nearest = path
            .sub_paths()
            .enumerate()
            .filter_map(|(s, ring)| nearest_edge(ring, &event.image, true).map(|(edge, d)| (s, edge, d)))
            .min_by(|a, b| a.2.total_cmp(&b.2));
        let Some((sub_path, edge, distance)) = nearest else {
            return false;
        };
        if camera.image_len_to_canvas(distance) > threshold {
            return false;
        }
        let Some(ring) = path.sub_paths().nth(sub_path) else {
            return false;
        };
        let (point, _) = project_on_segment(&event.image, &ring[edge], &ring[(edge + 1) % ring.len()]);
        log::debug!("Vertex insertion on annotation {} edge {}", id, edge);
        self.state = PolygonToolState::DeterminingInsertion {
            id,
            sub_path,
            edge,
            point,
            start_canvas: event.canvas,
        };
        true
    }

    /// Insert the pending vertex as the first action of a new group.
    ///
    /// Returns the group, the flat index of the new vertex, and the data
    /// and payload after insertion.
    fn insert_vertex(
        cx: &mut ToolContext<'_>,
        id: AnnotationId,
        sub_path: usize,
        edge: usize,
        point: ImagePoint,
    ) -> Option<(GroupId, usize, AnnotationData, Payload)> {
        let Some(Payload::Polygon(mut path)) = cx.view.annotations.resolved_payload(id) else {
            return None;
        };
        let vertex = path.sub_paths().take(sub_path).map(Vec::len).sum::<usize>() + edge + 1;
        path.sub_paths_mut().nth(sub_path)?.insert(edge + 1, point);
        let payload = Payload::Polygon(path);

        let before = cx.view.annotations.annotation(id)?.data().clone();
        let after = edited_annotation_data(cx.view, id, payload.clone())?;
        let group = cx.history.create_group();
        let action = UpdateAnnotationDataAction::new(id, before, after.clone());
        if !cx.perform_in_group(group, Box::new(action)) {
            return None;
        }
        Some((group, vertex, after, payload))
    }

    fn add_point(&mut self, cx: &mut ToolContext<'_>, point: ImagePoint) {
        let group = match self.state {
            PolygonToolState::Drawing { group } => group,
            _ => {
                self.draft.borrow_mut().clear();
                let group = cx.history.create_group();
                self.state = PolygonToolState::Drawing { group };
                group
            }
        };
        let action = DraftPointAction {
            draft: self.draft.clone(),
            point,
        };
        cx.perform_in_group(group, Box::new(action));
    }

    fn cancel_draft(&mut self, cx: &mut ToolContext<'_>) {
        if let PolygonToolState::Drawing { group } = std::mem::take(&mut self.state) {
            cx.history.remove_group(group);
        }
        self.draft.borrow_mut().clear();
    }

    /// Turn the draft into an annotation, or paint it for mask classes.
    fn close(&mut self, cx: &mut ToolContext<'_>) -> Result<bool> {
        let PolygonToolState::Drawing { group } = self.state else {
            return Ok(false);
        };
        let points = self.draft();
        if points.len() < MIN_PATH_POINTS {
            return Ok(false);
        }
        self.state = PolygonToolState::Idle;
        self.draft.borrow_mut().clear();
        cx.history.remove_group(group);

        let path = CompoundPath::new(points).simplify(cx.settings.simplify_epsilon);
        if path.is_empty() {
            cx.notices.info("Polygon is too small");
            return Ok(false);
        }

        if let Some(class_id) = cx.class_id.filter(|c| cx.is_mask_class(*c)) {
            let edit = draw_polygon_to_raster(&mut cx.action_context(), &path, class_id)?;
            return Ok(match edit {
                Some(edit) => {
                    cx.record(Box::new(edit));
                    true
                }
                None => false,
            });
        }

        let data = new_annotation_data(cx.view, Payload::Polygon(path));
        let annotation = Annotation::new(AnnotationType::Polygon, data).with_class(cx.class_id);
        Ok(cx.perform(Box::new(CreateAnnotationAction::new(annotation))))
    }

    fn close_or_notify(&mut self, cx: &mut ToolContext<'_>) -> bool {
        match self.close(cx) {
            Ok(closed) => closed,
            Err(e) => {
                log::warn!("Closing polygon failed: {}", e);
                cx.notices.warning(format!("Could not save polygon: {}", e));
                false
            }
        }
    }

    fn commit_insertion(&mut self, cx: &mut ToolContext<'_>, point: ImagePoint) {
        match std::mem::take(&mut self.state) {
            PolygonToolState::DeterminingInsertion {
                id, sub_path, edge, ..
            } => {
                if let Some((group, ..)) = Self::insert_vertex(cx, id, sub_path, edge, point) {
                    self.state = PolygonToolState::CommittingInsertion { id, group };
                }
            }
            PolygonToolState::MovingVertex {
                id,
                group,
                vertex,
                base_data,
                base_payload,
                moved: true,
                ..
            } => {
                let mut payload = base_payload;
                payload.move_vertex(vertex, point);
                let Some(after) = edited_annotation_data(cx.view, id, payload) else {
                    return;
                };
                let action = Box::new(UpdateAnnotationDataAction::new(id, base_data.clone(), after));
                let ok = match group {
                    Some(group) => {
                        self.state = PolygonToolState::CommittingInsertion { id, group };
                        cx.perform_in_group(group, action)
                    }
                    None => cx.perform(action),
                };
                if !ok {
                    let _ = cx.view.annotations.set_annotation_data(id, base_data);
                }
            }
            _ => {}
        }
        if let PolygonToolState::CommittingInsertion { id, .. } = self.state {
            log::debug!("Committed vertex edit on annotation {}", id);
        }
        self.state = PolygonToolState::Idle;
    }
}

impl Tool for PolygonTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn activate(&mut self, cx: &mut ToolContext<'_>) -> Result<()> {
        let owner = Owner::tool(Self::NAME);
        cx.registry.register_command(&owner, CLOSE_COMMAND)?;
        cx.registry.register_command(&owner, CANCEL_COMMAND)?;
        Ok(())
    }

    fn reset(&mut self, cx: &mut ToolContext<'_>) {
        match std::mem::take(&mut self.state) {
            PolygonToolState::Drawing { group } => {
                cx.history.remove_group(group);
                self.draft.borrow_mut().clear();
            }
            PolygonToolState::MovingVertex { id, base_data, .. } => {
                let _ = cx.view.annotations.set_annotation_data(id, base_data);
            }
            _ => {}
        }
        self.hover = None;
    }

    fn on_pointer_down(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        if let PolygonToolState::Drawing { .. } = self.state {
            // Undo may have emptied the draft behind our back
            let first = self.draft.borrow().first().copied();
            let closing = self.draft.borrow().len() >= MIN_PATH_POINTS
                && first.is_some_and(|p| cx.view.camera.cursor_is_closing_path(event.canvas, p));
            if closing {
                self.close_or_notify(cx);
            } else {
                self.add_point(cx, event.image);
            }
            return;
        }

        if self.begin_edit(cx, event) {
            return;
        }
        cx.view.annotations.deselect_all();
        self.add_point(cx, event.image);
    }

    fn on_pointer_move(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        self.hover = Some(event.canvas);

        if let PolygonToolState::DeterminingInsertion {
            id,
            sub_path,
            edge,
            point,
            start_canvas,
        } = self.state
        {
            if start_canvas.distance(&event.canvas) < MIN_DRAG_DISTANCE {
                return;
            }
            self.state = match Self::insert_vertex(cx, id, sub_path, edge, point) {
                Some((group, vertex, base_data, base_payload)) => PolygonToolState::MovingVertex {
                    id,
                    group: Some(group),
                    vertex,
                    start_canvas,
                    base_data,
                    base_payload,
                    moved: false,
                },
                None => PolygonToolState::Idle,
            };
        }

        if let PolygonToolState::MovingVertex {
            id,
            vertex,
            start_canvas,
            base_payload,
            moved,
            ..
        } = &mut self.state
        {
            if !*moved && start_canvas.distance(&event.canvas) < MIN_DRAG_DISTANCE {
                return;
            }
            *moved = true;
            let mut payload = base_payload.clone();
            payload.move_vertex(*vertex, event.image);
            if let Some(data) = edited_annotation_data(cx.view, *id, payload) {
                let _ = cx.view.annotations.set_annotation_data(*id, data);
            }
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ToolContext<'_>, event: &PointerEvent) {
        match &self.state {
            PolygonToolState::DeterminingInsertion { point, .. } => {
                let point = *point;
                self.commit_insertion(cx, point);
            }
            PolygonToolState::MovingVertex { .. } => self.commit_insertion(cx, event.image),
            _ => {}
        }
    }

    fn on_key_down(&mut self, cx: &mut ToolContext<'_>, event: &KeyEvent) -> bool {
        match event.key {
            Key::Enter => self.close_or_notify(cx),
            Key::Escape if self.state != PolygonToolState::Idle => {
                self.reset(cx);
                true
            }
            _ => false,
        }
    }

    fn on_command(&mut self, cx: &mut ToolContext<'_>, name: &str, _payload: &Value) -> Result<bool> {
        match name {
            CLOSE_COMMAND => self.close(cx),
            CANCEL_COMMAND => {
                self.cancel_draft(cx);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn draw_overlay(&self, view: &View, surface: &mut dyn DrawSurface) {
        let draft = self.draft.borrow();
        if !draft.is_empty() {
            let mut points: Vec<CanvasPoint> = draft.iter().map(|p| view.camera.image_to_canvas(*p)).collect();
            for p in &points {
                surface.arc(*p, 3.0, DRAFT_COLOR, true);
            }
            if let Some(hover) = self.hover {
                points.push(hover);
            }
            surface.stroke(&points, false, DRAFT_COLOR, 1.0);
        }
        if let PolygonToolState::DeterminingInsertion { point, .. } = &self.state {
            surface.arc(view.camera.image_to_canvas(*point), 4.0, SELECTED_COLOR, false);
        }
    }

    fn cursor(&self) -> Cursor {
        match self.state {
            PolygonToolState::MovingVertex { .. } => Cursor::Move,
            _ => Cursor::Crosshair,
        }
    }
}
