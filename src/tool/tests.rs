//! Test harness driving tools the way the editor does, plus tool manager tests.

use std::rc::Rc;

use annotate_geom::CanvasPoint;
use serde_json::Value;

use crate::action::{Action, ActionContext, ActionManager, CreateAnnotationAction};
use crate::config::ToolSettings;
use crate::error::{EngineError, Result};
use crate::model::{Annotation, AnnotationClass, AnnotationData, AnnotationId, AnnotationType, ClassId, Payload};
use crate::notice::Notices;
use crate::persistence::InMemoryBackend;
use crate::plugin::{CorePlugin, Owner, Plugin, PluginRegistry};
use crate::tool::{
    Cursor, Key, KeyEvent, MouseButton, PointerEvent, RequestId, ServerRequests, ServerResponse, Tool,
    ToolContext, ToolManager,
};
use crate::view::{DrawCommand, MediaFile, RecordingSurface, View};

/// Class allowing every vector type.
pub const OBJECT_CLASS: ClassId = 1;
/// Class painting into the raster.
pub const MASK_CLASS: ClassId = 2;

/// One view with the core plugin's tools, on a 100x100 image at scale 1.
pub struct Harness {
    pub view: View,
    pub history: ActionManager,
    pub registry: PluginRegistry,
    pub notices: Notices,
    pub requests: ServerRequests,
    pub settings: ToolSettings,
    pub class_id: Option<ClassId>,
    pub backend: Rc<InMemoryBackend>,
}

impl Harness {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let backend = Rc::new(InMemoryBackend::new());
        let mut view = View::for_tests(backend.clone());
        view.set_files(vec![MediaFile::image("image.png", 100, 100)]);
        view.annotations.set_classes(vec![
            AnnotationClass::new(OBJECT_CLASS, "object", Vec::new()),
            AnnotationClass::new(MASK_CLASS, "mask", vec![AnnotationType::Mask]),
        ]);

        let mut registry = PluginRegistry::new();
        let mut core = CorePlugin;
        core.activate(&mut registry).unwrap();
        for tool in core.create_tools() {
            view.tools.register(tool);
        }

        Self {
            view,
            history: ActionManager::default(),
            registry,
            notices: Notices::new(),
            requests: ServerRequests::new(),
            settings: ToolSettings::default(),
            class_id: Some(OBJECT_CLASS),
            backend,
        }
    }

    pub fn cx(&mut self) -> ToolContext<'_> {
        ToolContext {
            view: &mut self.view,
            history: &mut self.history,
            registry: &mut self.registry,
            notices: &mut self.notices,
            requests: &mut self.requests,
            settings: &self.settings,
            class_id: self.class_id,
        }
    }

    pub fn activate(&mut self, name: &str) {
        ToolManager::activate(&mut self.cx(), name).unwrap();
    }

    /// Create and persist an annotation outside of history.
    pub fn create_image_annotation(&mut self, payload: Payload) -> AnnotationId {
        let kind = payload.builtin_type().unwrap();
        let annotation = Annotation::new(kind, AnnotationData::Image(payload)).with_class(Some(OBJECT_CLASS));
        let mut action = CreateAnnotationAction::new(annotation);
        let mut cx = ActionContext::new(&mut self.view, self.registry.serializers());
        assert!(action.perform(&mut cx));
        action.id()
    }

    pub fn payload(&self, id: AnnotationId) -> Option<Payload> {
        self.view.annotations.resolved_payload(id)
    }

    fn pointer(&self, x: f64, y: f64, button: MouseButton) -> PointerEvent {
        let canvas = CanvasPoint::new(x, y);
        PointerEvent::new(canvas, self.view.camera.canvas_to_image(canvas)).with_button(button)
    }

    fn dispatch<R>(&mut self, f: impl FnOnce(&mut dyn Tool, &mut ToolContext<'_>) -> R) -> Option<R> {
        ToolManager::dispatch(&mut self.cx(), f)
    }

    pub fn down_with(&mut self, x: f64, y: f64, button: MouseButton) {
        let event = self.pointer(x, y, button);
        self.dispatch(|tool, cx| tool.on_pointer_down(cx, &event));
    }

    pub fn down(&mut self, x: f64, y: f64) {
        self.down_with(x, y, MouseButton::Left);
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        let event = self.pointer(x, y, MouseButton::Left);
        self.dispatch(|tool, cx| tool.on_pointer_move(cx, &event));
    }

    pub fn up(&mut self, x: f64, y: f64) {
        let event = self.pointer(x, y, MouseButton::Left);
        self.dispatch(|tool, cx| tool.on_pointer_up(cx, &event));
    }

    pub fn click(&mut self, x: f64, y: f64) {
        self.down(x, y);
        self.up(x, y);
    }

    pub fn key(&mut self, key: Key) -> bool {
        let event = KeyEvent::new(key);
        self.dispatch(|tool, cx| tool.on_key_down(cx, &event)).unwrap_or(false)
    }

    pub fn command(&mut self, name: &str) -> Result<bool> {
        self.dispatch(|tool, cx| tool.on_command(cx, name, &Value::Null))
            .unwrap_or(Ok(false))
    }

    pub fn respond(&mut self, id: RequestId, payload: Value) {
        let response = ServerResponse { id, payload };
        self.dispatch(|tool, cx| tool.on_server_response(cx, &response));
    }

    pub fn undo(&mut self) -> bool {
        let mut cx = ActionContext::new(&mut self.view, self.registry.serializers());
        self.history.undo(&mut cx)
    }

    pub fn redo(&mut self) -> bool {
        let mut cx = ActionContext::new(&mut self.view, self.registry.serializers());
        self.history.redo(&mut cx)
    }

    pub fn overlay(&self) -> Vec<DrawCommand> {
        let mut surface = RecordingSurface::default();
        if let Some(tool) = self.view.tools.active() {
            tool.draw_overlay(&self.view, &mut surface);
        }
        surface.commands
    }

    pub fn cursor(&self) -> Cursor {
        self.view.tools.active().map(|t| t.cursor()).unwrap_or_default()
    }

    pub fn resolved_cursor(&self) -> String {
        self.registry.resolve_cursor(&self.cursor())
    }
}

#[derive(Debug)]
struct FailingTool;

impl Tool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }

    fn activate(&mut self, cx: &mut ToolContext<'_>) -> Result<()> {
        cx.registry.register_command(&Owner::tool("failing"), "failing.go")?;
        Err(EngineError::ResourceNotInitialized("test fixture"))
    }

    fn reset(&mut self, _cx: &mut ToolContext<'_>) {}
}

#[test]
fn test_core_tools_are_registered() {
    let h = Harness::new();
    assert_eq!(
        h.view.tools.names(),
        vec!["auto_annotate", "bounding_box", "brush", "mask_brush", "polygon", "select"]
    );
    assert_eq!(h.view.tools.active_name(), None);
}

#[test]
fn test_switching_tools_releases_commands() {
    let mut h = Harness::new();
    h.activate("polygon");
    assert_eq!(h.registry.command_owner("polygon.close"), Some(&Owner::tool("polygon")));

    h.activate("select");
    assert_eq!(h.view.tools.active_name(), Some("select"));
    assert_eq!(h.registry.command_owner("polygon.close"), None);
    assert_eq!(h.registry.registration_count(&Owner::tool("polygon")), 0);

    // Reactivating registers again without a duplicate error
    h.activate("polygon");
    assert_eq!(h.registry.registration_count(&Owner::tool("polygon")), 2);
}

#[test]
fn test_switching_tools_abandons_gesture() {
    let mut h = Harness::new();
    h.activate("polygon");
    h.click(10.0, 10.0);
    h.click(20.0, 10.0);
    assert!(h.history.can_undo());

    h.activate("select");
    assert!(!h.history.can_undo());
}

#[test]
fn test_unknown_tool() {
    let mut h = Harness::new();
    assert!(matches!(
        ToolManager::activate(&mut h.cx(), "lasso"),
        Err(EngineError::UnknownTool(_))
    ));
}

#[test]
fn test_failed_activation_releases_partial_registrations() {
    let mut h = Harness::new();
    assert!(h.view.tools.register(Box::new(FailingTool)));
    assert!(!h.view.tools.register(Box::new(FailingTool)));

    assert!(ToolManager::activate(&mut h.cx(), "failing").is_err());
    assert_eq!(h.view.tools.active_name(), None);
    assert_eq!(h.registry.command_owner("failing.go"), None);
    assert!(h.view.tools.has_tool("failing"));
}

#[test]
fn test_events_without_active_tool_are_ignored() {
    let mut h = Harness::new();
    h.click(10.0, 10.0);
    assert!(!h.key(Key::Escape));
    assert!(!h.command("polygon.close").unwrap());
}
