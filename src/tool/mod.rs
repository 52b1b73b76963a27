//! Pluggable gesture handlers.
//!
//! Exactly one [`Tool`] is active per view. Tools turn pointer and key events
//! into actions; any state kept between events is an explicit state enum on
//! the tool. A tool is handed a [`ToolContext`] on every call and owns no
//! references into the view between calls.
//!
//! The active tool is taken out of its view while it runs, so a tool can
//! borrow the view mutably through the context.

mod auto_annotate;
mod bounding_box;
mod brush;
mod events;
mod mask_brush;
mod polygon;
mod select;
mod server;

use std::collections::BTreeMap;

use serde_json::Value;

pub use auto_annotate::AutoAnnotateTool;
pub use bounding_box::BoundingBoxTool;
pub use brush::BrushTool;
pub use events::{Cursor, Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use mask_brush::MaskBrushTool;
pub use polygon::{PolygonTool, PolygonToolState};
pub use select::SelectTool;
pub use server::{RequestId, ServerRequest, ServerRequests, ServerResponse};

use crate::action::{Action, ActionContext, ActionManager, GroupId};
use crate::config::ToolSettings;
use crate::error::{EngineError, Result};
use crate::model::{AnnotationData, AnnotationId, ClassId, Payload, VideoData};
use crate::notice::Notices;
use crate::plugin::{Owner, PluginRegistry};
use crate::view::{DrawSurface, LayerKind, View};

/// Everything a tool may touch while handling one event.
pub struct ToolContext<'a> {
    pub view: &'a mut View,
    pub history: &'a mut ActionManager,
    pub registry: &'a mut PluginRegistry,
    pub notices: &'a mut Notices,
    pub requests: &'a mut ServerRequests,
    pub settings: &'a ToolSettings,
    /// Class new annotations are created with
    pub class_id: Option<ClassId>,
}

impl<'a> ToolContext<'a> {
    pub fn action_context(&mut self) -> ActionContext<'_> {
        ActionContext::new(&mut *self.view, self.registry.serializers())
    }

    /// Perform `action` and record it in history.
    pub fn perform(&mut self, action: Box<dyn Action>) -> bool {
        let mut cx = ActionContext::new(&mut *self.view, self.registry.serializers());
        self.history.perform(action, &mut cx)
    }

    pub fn perform_in_group(&mut self, group: GroupId, action: Box<dyn Action>) -> bool {
        let mut cx = ActionContext::new(&mut *self.view, self.registry.serializers());
        self.history.perform_in_group(group, action, &mut cx)
    }

    /// Record an action whose effect is already applied.
    pub fn record(&mut self, action: Box<dyn Action>) {
        self.history.record(action);
    }

    /// Hit-test distance in image pixels: the canvas threshold at the current zoom.
    pub fn hit_tolerance(&self) -> f64 {
        self.view.camera.canvas_len_to_image(self.settings.hit_threshold)
    }

    pub fn mark_overlay_dirty(&mut self) {
        self.view.layers.mark_dirty(LayerKind::Overlay);
    }

    /// Whether `class_id` paints into the raster instead of creating vector shapes.
    pub fn is_mask_class(&self, class_id: ClassId) -> bool {
        self.view
            .annotations
            .class(class_id)
            .is_some_and(|c| c.is_mask_class())
    }
}

/// Data for a new annotation showing `payload` at the view's current frame.
///
/// On video the payload becomes the first keyframe, visible to the last frame.
pub fn new_annotation_data(view: &View, payload: Payload) -> AnnotationData {
    let is_video = view.files.current_file().is_some_and(|f| f.is_video());
    if is_video {
        let last = view.annotations.total_frames().saturating_sub(1);
        AnnotationData::Video(VideoData::starting_at(view.current_frame(), last, payload))
    } else {
        AnnotationData::Image(payload)
    }
}

/// Data of `id` with `payload` written at the current frame.
pub fn edited_annotation_data(view: &View, id: AnnotationId, payload: Payload) -> Option<AnnotationData> {
    let annotation = view.annotations.annotation(id)?;
    Some(annotation.data().with_payload_at(view.current_frame(), payload))
}

/// A gesture handler.
///
/// Every handler has a default that ignores the event, so tools implement
/// only what they react to.
pub trait Tool {
    /// Unique name. Registrations made while active belong to [`Owner::Tool`] with this name.
    fn name(&self) -> &str;

    /// Register commands and cursors. Runs when the tool becomes active.
    fn activate(&mut self, _cx: &mut ToolContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs before the tool's registrations are released.
    fn deactivate(&mut self, cx: &mut ToolContext<'_>) {
        self.reset(cx);
    }

    /// Abandon the current gesture, including any pending server request.
    fn reset(&mut self, cx: &mut ToolContext<'_>);

    fn on_pointer_down(&mut self, _cx: &mut ToolContext<'_>, _event: &PointerEvent) {}

    fn on_pointer_move(&mut self, _cx: &mut ToolContext<'_>, _event: &PointerEvent) {}

    fn on_pointer_up(&mut self, _cx: &mut ToolContext<'_>, _event: &PointerEvent) {}

    /// Returns whether the key was consumed.
    fn on_key_down(&mut self, _cx: &mut ToolContext<'_>, _event: &KeyEvent) -> bool {
        false
    }

    /// Handle a command this tool registered. Returns whether it was handled.
    fn on_command(&mut self, _cx: &mut ToolContext<'_>, _name: &str, _payload: &Value) -> Result<bool> {
        Ok(false)
    }

    fn on_server_response(&mut self, _cx: &mut ToolContext<'_>, _response: &ServerResponse) {}

    /// Draw the in-progress gesture.
    fn draw_overlay(&self, _view: &View, _surface: &mut dyn DrawSurface) {}

    fn cursor(&self) -> Cursor {
        Cursor::Default
    }
}

/// The tools of one view and which one is active.
#[derive(Default)]
pub struct ToolManager {
    tools: BTreeMap<String, Box<dyn Tool>>,
    active: Option<Box<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Returns `false` if a tool of that name exists.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        if self.has_tool(&name) {
            return false;
        }
        self.tools.insert(name, tool);
        true
    }

    /// Remove an inactive tool.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name) || self.active_name() == Some(name)
    }

    /// Names of all tools, active one included, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .keys()
            .map(String::as_str)
            .chain(self.active_name())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn active(&self) -> Option<&dyn Tool> {
        self.active.as_deref()
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.name())
    }

    /// Make `name` the active tool, deactivating the current one.
    ///
    /// If the new tool fails to activate, whatever it registered is released
    /// and no tool is active.
    pub fn activate(cx: &mut ToolContext<'_>, name: &str) -> Result<()> {
        if cx.view.tools.active_name() == Some(name) {
            return Ok(());
        }
        if !cx.view.tools.tools.contains_key(name) {
            return Err(EngineError::UnknownTool(name.to_string()));
        }
        Self::deactivate(cx);
        let Some(mut tool) = cx.view.tools.tools.remove(name) else {
            return Err(EngineError::UnknownTool(name.to_string()));
        };
        if let Err(e) = tool.activate(cx) {
            log::warn!("Tool '{}' failed to activate: {}", name, e);
            cx.registry.release_owner(&Owner::tool(name));
            cx.view.tools.tools.insert(name.to_string(), tool);
            return Err(e);
        }
        log::info!("Activated tool '{}'", name);
        cx.view.tools.active = Some(tool);
        cx.mark_overlay_dirty();
        Ok(())
    }

    /// Deactivate the active tool and release everything it registered.
    pub fn deactivate(cx: &mut ToolContext<'_>) {
        let Some(mut tool) = cx.view.tools.active.take() else {
            return;
        };
        tool.deactivate(cx);
        let released = cx.registry.release_owner(&Owner::tool(tool.name()));
        log::info!("Deactivated tool '{}' ({} registrations released)", tool.name(), released);
        cx.view.tools.tools.insert(tool.name().to_string(), tool);
        cx.mark_overlay_dirty();
    }

    pub fn reset(cx: &mut ToolContext<'_>) {
        Self::dispatch(cx, |tool, cx| tool.reset(cx));
    }

    /// Run `f` on the active tool. Returns `None` if no tool is active.
    pub fn dispatch<R>(
        cx: &mut ToolContext<'_>,
        f: impl FnOnce(&mut dyn Tool, &mut ToolContext<'_>) -> R,
    ) -> Option<R> {
        let mut tool = cx.view.tools.active.take()?;
        let result = f(tool.as_mut(), cx);
        cx.view.tools.active = Some(tool);
        cx.mark_overlay_dirty();
        Some(result)
    }
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("tools", &self.names())
            .field("active", &self.active_name())
            .finish()
    }
}

#[cfg(test)]
mod tests;
