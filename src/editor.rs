//! The editor: owner of views, history, plugins and frame loading.
//!
//! Hosts feed raw input (canvas positions, keys, commands, server answers)
//! into the [`Editor`]; it converts coordinates through the active view's
//! camera and routes events to that view's active tool. Everything a tool
//! needs is handed over as a [`ToolContext`] built from the editor's fields.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use annotate_geom::{CanvasPoint, Size};
use serde_json::Value;

use crate::action::{ActionContext, ActionManager};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::frames::{FrameBitmap, FrameLoader, FrameSection, FrameSource, LoaderEvent, Playback, PlaybackStep};
use crate::model::{AnnotationClass, ClassId};
use crate::notice::{Notice, Notices};
use crate::persistence::{AnnotationBackend, ItemKey};
use crate::plugin::{CorePlugin, Owner, Plugin, PluginRegistry};
use crate::tool::{
    Key, KeyEvent, Modifiers, MouseButton, PointerEvent, ServerRequest, ServerRequests, ServerResponse,
    Tool, ToolContext, ToolManager,
};
use crate::view::{LayerKind, LayerSurfaces, MediaFile, View, ViewId};

/// A plugin and the tools it contributed to every view.
struct InstalledPlugin {
    plugin: Box<dyn Plugin>,
    tools: Vec<String>,
}

pub struct Editor {
    config: EngineConfig,
    backend: Rc<dyn AnnotationBackend>,
    views: BTreeMap<ViewId, View>,
    active_view: Option<ViewId>,
    next_view: u32,
    history: ActionManager,
    registry: PluginRegistry,
    plugins: Vec<InstalledPlugin>,
    notices: Notices,
    requests: ServerRequests,
    class_id: Option<ClassId>,
    frames: Option<FrameLoader>,
    playback: Playback,
}

impl Editor {
    /// Create an editor with the core plugin installed.
    pub fn new(config: EngineConfig, backend: Rc<dyn AnnotationBackend>) -> Result<Self> {
        let mut editor = Self {
            history: ActionManager::new(config.preferences.max_history),
            playback: Playback::new(config.preferences.playback_fps),
            config,
            backend,
            views: BTreeMap::new(),
            active_view: None,
            next_view: 0,
            registry: PluginRegistry::new(),
            plugins: Vec::new(),
            notices: Notices::new(),
            requests: ServerRequests::new(),
            class_id: None,
            frames: None,
        };
        editor.install_plugin(Box::new(CorePlugin))?;
        Ok(editor)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &ActionManager {
        &self.history
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    // --- Plugins ---

    /// Activate `plugin` and give every view its tools.
    ///
    /// If activation fails, whatever the plugin registered so far is released.
    pub fn install_plugin(&mut self, mut plugin: Box<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if self.plugins.iter().any(|p| p.plugin.name() == name) {
            log::warn!("Plugin '{}' is already installed", name);
            return Ok(());
        }
        if let Err(e) = plugin.activate(&mut self.registry) {
            let released = self.registry.release_owner(&Owner::plugin(&name));
            log::warn!("Plugin '{}' failed to activate ({} registrations released): {}", name, released, e);
            return Err(e);
        }

        let tools: Vec<String> = plugin.create_tools().iter().map(|t| t.name().to_string()).collect();
        for view in self.views.values_mut() {
            for tool in plugin.create_tools() {
                view.tools.register(tool);
            }
        }
        log::info!("🔌 Installed plugin '{}' with tools {:?}", name, tools);
        self.plugins.push(InstalledPlugin { plugin, tools });
        Ok(())
    }

    /// Remove a plugin, its tools and everything it registered.
    pub fn uninstall_plugin(&mut self, name: &str) -> bool {
        let Some(index) = self.plugins.iter().position(|p| p.plugin.name() == name) else {
            return false;
        };
        let installed = self.plugins.remove(index);

        let ids: Vec<ViewId> = self.views.keys().copied().collect();
        for id in ids {
            let uses_plugin_tool = self
                .views
                .get(&id)
                .and_then(|v| v.tools.active_name())
                .is_some_and(|active| installed.tools.iter().any(|t| t == active));
            let cx = if uses_plugin_tool { self.tool_context_for(id) } else { None };
            if let Some(mut cx) = cx {
                ToolManager::deactivate(&mut cx);
            }
            if let Some(view) = self.views.get_mut(&id) {
                for tool in &installed.tools {
                    view.tools.unregister(tool);
                }
            }
        }

        let released = self.registry.release_owner(&Owner::plugin(name));
        log::info!("Uninstalled plugin '{}' ({} registrations released)", name, released);
        true
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.plugin.name()).collect()
    }

    // --- Views ---

    /// Add a view slot for `item`. The first view becomes active.
    pub fn add_view(&mut self, item: ItemKey, viewport: Size) -> ViewId {
        let id = ViewId(self.next_view);
        self.next_view += 1;

        let mut view = View::new(id, self.backend.clone(), item, viewport);
        view.annotations.set_inference(self.config.preferences.keyframe_inference);
        for installed in &self.plugins {
            for tool in installed.plugin.create_tools() {
                view.tools.register(tool);
            }
        }
        self.views.insert(id, view);
        if self.active_view.is_none() {
            self.active_view = Some(id);
        }
        log::debug!("Added view {}", id.0);
        id
    }

    pub fn remove_view(&mut self, id: ViewId) -> bool {
        if self.active_view == Some(id) {
            self.leave_context();
            if let Some(mut cx) = self.tool_context_for(id) {
                ToolManager::deactivate(&mut cx);
            }
            self.active_view = None;
        }
        let removed = self.views.remove(&id).is_some();
        if self.active_view.is_none() {
            self.active_view = self.views.keys().next().copied();
        }
        removed
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.get_mut(&id)
    }

    pub fn active_view_id(&self) -> Option<ViewId> {
        self.active_view
    }

    pub fn active_view(&self) -> Option<&View> {
        self.views.get(&self.active_view?)
    }

    pub fn active_view_mut(&mut self) -> Option<&mut View> {
        self.views.get_mut(&self.active_view?)
    }

    /// Make `id` the active view. The active tool moves along with it.
    pub fn set_active_view(&mut self, id: ViewId) -> Result<()> {
        if !self.views.contains_key(&id) {
            return Err(EngineError::ResourceNotInitialized("view"));
        }
        if self.active_view == Some(id) {
            return Ok(());
        }

        let tool = self.active_tool_name().map(str::to_string);
        if let Some(mut cx) = self.tool_context() {
            ToolManager::deactivate(&mut cx);
        }
        self.leave_context();
        self.active_view = Some(id);
        log::debug!("Active view is now {}", id.0);

        match tool {
            Some(name) => self.activate_tool(&name),
            None => Ok(()),
        }
    }

    /// Replace the files of the active view.
    pub fn set_files(&mut self, files: Vec<MediaFile>) -> Result<()> {
        self.reset_active_tool();
        self.leave_context();
        let view = self.active_view_mut().ok_or(EngineError::ResourceNotInitialized("view"))?;
        view.set_files(files);
        Ok(())
    }

    /// Show file `index` of the active view.
    pub fn set_current_file(&mut self, index: usize) -> Result<bool> {
        let view = self.active_view().ok_or(EngineError::ResourceNotInitialized("view"))?;
        if view.files.current_index() == Some(index) || index >= view.files.files().len() {
            return Ok(false);
        }
        self.reset_active_tool();
        self.leave_context();
        Ok(self.active_view_mut().is_some_and(|v| v.set_current_file(index)))
    }

    /// Move the active view to `frame`, clamped to the current file.
    ///
    /// History is cleared; the frame loader reprioritizes around the new frame.
    pub fn set_current_frame(&mut self, frame: u32) {
        let Some((current, total)) = self
            .active_view()
            .map(|v| (v.current_frame(), v.annotations.total_frames()))
        else {
            return;
        };
        let frame = frame.min(total.saturating_sub(1));
        if current == frame {
            return;
        }
        self.reset_active_tool();
        self.history.clear();
        if let Some(view) = self.active_view_mut() {
            view.set_current_frame(frame);
        }
        let frame = self.current_frame();
        if let Some(loader) = &mut self.frames {
            loader.set_next_frame_to_load(frame);
        }
    }

    pub fn current_frame(&self) -> u32 {
        self.active_view().map(View::current_frame).unwrap_or_default()
    }

    /// Classes of the active view's item.
    pub fn set_classes(&mut self, classes: Vec<AnnotationClass>) {
        if let Some(view) = self.active_view_mut() {
            view.annotations.set_classes(classes);
        }
    }

    pub fn selected_class(&self) -> Option<ClassId> {
        self.class_id
    }

    pub fn select_class(&mut self, class_id: Option<ClassId>) {
        self.class_id = class_id;
    }

    /// Load annotations and comment threads of the active view's item.
    ///
    /// Returns the number of annotations loaded.
    pub fn load_annotations(&mut self) -> Result<usize> {
        let active = self.active_view.ok_or(EngineError::ResourceNotInitialized("view"))?;
        self.reset_active_tool();
        self.history.clear();
        let view = self.views.get_mut(&active).ok_or(EngineError::ResourceNotInitialized("view"))?;
        let count = view.annotations.load(self.registry.serializers())?;
        let threads = view.comments.load()?;
        log::info!("Loaded {} annotations and {} comment threads", count, threads);
        Ok(count)
    }

    /// Called when the history context goes away.
    fn leave_context(&mut self) {
        self.history.clear();
        self.playback.pause();
        if let Some(loader) = &mut self.frames {
            loader.cleanup();
        }
    }

    // --- Tools ---

    fn tool_context_for(&mut self, id: ViewId) -> Option<ToolContext<'_>> {
        let view = self.views.get_mut(&id)?;
        Some(ToolContext {
            view,
            history: &mut self.history,
            registry: &mut self.registry,
            notices: &mut self.notices,
            requests: &mut self.requests,
            settings: &self.config.tools,
            class_id: self.class_id,
        })
    }

    fn tool_context(&mut self) -> Option<ToolContext<'_>> {
        let id = self.active_view?;
        self.tool_context_for(id)
    }

    fn dispatch<R>(&mut self, f: impl FnOnce(&mut dyn Tool, &mut ToolContext<'_>) -> R) -> Option<R> {
        let mut cx = self.tool_context()?;
        ToolManager::dispatch(&mut cx, f)
    }

    fn reset_active_tool(&mut self) {
        if let Some(mut cx) = self.tool_context() {
            ToolManager::reset(&mut cx);
        }
    }

    pub fn activate_tool(&mut self, name: &str) -> Result<()> {
        let mut cx = self.tool_context().ok_or(EngineError::ResourceNotInitialized("view"))?;
        ToolManager::activate(&mut cx, name)
    }

    pub fn deactivate_tool(&mut self) {
        if let Some(mut cx) = self.tool_context() {
            ToolManager::deactivate(&mut cx);
        }
    }

    pub fn active_tool_name(&self) -> Option<&str> {
        self.active_view()?.tools.active_name()
    }

    /// Host cursor name for the active tool.
    pub fn cursor(&self) -> String {
        let cursor = self
            .active_view()
            .and_then(|v| v.tools.active())
            .map(|t| t.cursor())
            .unwrap_or_default();
        self.registry.resolve_cursor(&cursor)
    }

    // --- Input ---

    fn pointer_event(&self, canvas: CanvasPoint, button: MouseButton, modifiers: Modifiers) -> Option<PointerEvent> {
        let view = self.active_view()?;
        let image = view.camera.canvas_to_image(canvas);
        Some(
            PointerEvent::new(canvas, image)
                .with_button(button)
                .with_modifiers(modifiers),
        )
    }

    pub fn pointer_down(&mut self, canvas: CanvasPoint, button: MouseButton, modifiers: Modifiers) {
        if let Some(event) = self.pointer_event(canvas, button, modifiers) {
            self.dispatch(|tool, cx| tool.on_pointer_down(cx, &event));
        }
    }

    pub fn pointer_move(&mut self, canvas: CanvasPoint, modifiers: Modifiers) {
        if let Some(event) = self.pointer_event(canvas, MouseButton::Left, modifiers) {
            self.dispatch(|tool, cx| tool.on_pointer_move(cx, &event));
        }
    }

    pub fn pointer_up(&mut self, canvas: CanvasPoint, button: MouseButton, modifiers: Modifiers) {
        if let Some(event) = self.pointer_event(canvas, button, modifiers) {
            self.dispatch(|tool, cx| tool.on_pointer_up(cx, &event));
        }
    }

    /// Handle a key press. Returns `true` if something used it.
    ///
    /// History shortcuts come first, then the active tool, then the hotkeys
    /// that switch tools.
    pub fn key_down(&mut self, event: KeyEvent) -> bool {
        let modifiers = event.modifiers;
        if modifiers.command() {
            return match event.key {
                Key::Char('z') | Key::Char('Z') if modifiers.shift => self.redo(),
                Key::Char('z') | Key::Char('Z') => self.undo(),
                Key::Char('y') | Key::Char('Y') => self.redo(),
                _ => false,
            };
        }

        if self.dispatch(|tool, cx| tool.on_key_down(cx, &event)).unwrap_or(false) {
            return true;
        }

        if event.key == Key::Space {
            self.playback.toggle();
            return true;
        }
        if modifiers.alt {
            return false;
        }
        let Some(tool) = self.config.tool_for_key(&event.key.name()).map(str::to_string) else {
            return false;
        };
        match self.activate_tool(&tool) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Hotkey '{}' could not activate '{}': {}", event.key.name(), tool, e);
                false
            }
        }
    }

    /// Run a registered command.
    ///
    /// Commands reach the tool that registered them, and only while it is
    /// active. Returns `Ok(false)` if the owner is not the active tool.
    pub fn command(&mut self, name: &str, payload: &Value) -> Result<bool> {
        let Some(owner) = self.registry.command_owner(name) else {
            return Err(EngineError::UnknownCommand(name.to_string()));
        };
        let reaches_tool = owner
            .tool_name()
            .is_some_and(|tool| self.active_tool_name() == Some(tool));
        if !reaches_tool {
            log::debug!("Command '{}' of {} has no active tool to reach", name, owner);
            return Ok(false);
        }
        self.dispatch(|tool, cx| tool.on_command(cx, name, payload))
            .unwrap_or(Ok(false))
    }

    /// Requests sent by tools since the last call.
    pub fn take_requests(&mut self) -> Vec<ServerRequest> {
        self.requests.take()
    }

    pub fn server_response(&mut self, response: ServerResponse) {
        self.dispatch(|tool, cx| tool.on_server_response(cx, &response));
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        let Some(view) = self.active_view.and_then(|id| self.views.get_mut(&id)) else {
            return false;
        };
        let mut cx = ActionContext::new(view, self.registry.serializers());
        self.history.undo(&mut cx)
    }

    pub fn redo(&mut self) -> bool {
        let Some(view) = self.active_view.and_then(|id| self.views.get_mut(&id)) else {
            return false;
        };
        let mut cx = ActionContext::new(view, self.registry.serializers());
        self.history.redo(&mut cx)
    }

    // --- Frames and playback ---

    /// Start loading frames of the active video from `source`.
    ///
    /// Replaces any previous loader. Sections arrive through
    /// [`push_frame_sections`](Self::push_frame_sections).
    pub fn attach_frame_source(&mut self, source: Arc<dyn FrameSource>) -> Result<()> {
        let total = self.active_view().map(|v| v.annotations.total_frames()).unwrap_or(1);
        let current = self.current_frame();
        let mut loader = FrameLoader::spawn(source, &self.config.frames)?;
        loader.set_frames_to_load(0..total);
        loader.set_next_frame_to_load(current);
        self.frames = Some(loader);
        Ok(())
    }

    pub fn push_frame_sections(&mut self, sections: Vec<FrameSection>) {
        match &mut self.frames {
            Some(loader) => loader.push_sections(sections),
            None => log::debug!("No frame loader; dropped {} sections", sections.len()),
        }
    }

    pub fn frame_loader(&self) -> Option<&FrameLoader> {
        self.frames.as_ref()
    }

    /// Pixels of the active view's current frame, if loaded.
    pub fn current_bitmap(&self) -> Option<&FrameBitmap> {
        self.frames.as_ref()?.frame(self.current_frame())
    }

    fn handle_loader_events(&mut self, events: &[LoaderEvent]) {
        let current = self.current_frame();
        for event in events {
            match event {
                LoaderEvent::FrameLoaded { index, quality } if *index == current => {
                    log::trace!("Current frame {} now has {} pixels", index, quality);
                    if let Some(view) = self.active_view_mut() {
                        view.layers.mark_dirty(LayerKind::Image);
                    }
                }
                LoaderEvent::FrameFailed { index, error } => {
                    log::warn!("Frame {} failed to load: {}", index, error);
                }
                _ => {}
            }
        }
    }

    /// Collect loader results without blocking.
    pub fn poll_frames(&mut self) -> Vec<LoaderEvent> {
        let events = self.frames.as_mut().map(FrameLoader::poll).unwrap_or_default();
        self.handle_loader_events(&events);
        events
    }

    /// Like [`poll_frames`](Self::poll_frames), waiting up to `timeout` for a result.
    pub fn wait_frames(&mut self, timeout: Duration) -> Vec<LoaderEvent> {
        let events = self.frames.as_mut().map(|l| l.wait(timeout)).unwrap_or_default();
        self.handle_loader_events(&events);
        events
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn toggle_playback(&mut self) {
        self.playback.toggle();
    }

    /// Advance playback by `dt`.
    ///
    /// Without a frame loader every frame counts as loaded.
    pub fn tick(&mut self, dt: Duration) -> PlaybackStep {
        let Some(total) = self.active_view().map(|v| v.annotations.total_frames()) else {
            return PlaybackStep::Idle;
        };
        let current = self.current_frame();
        let frames = &self.frames;
        let step = self.playback.tick(dt, current, total, |index| {
            frames.as_ref().is_none_or(|loader| loader.is_loaded(index))
        });

        match step {
            PlaybackStep::Idle => {}
            PlaybackStep::Advanced(frame) => {
                self.set_current_frame(frame);
                if let Some(view) = self.active_view_mut() {
                    view.annotations.set_loading(false);
                }
            }
            PlaybackStep::Waiting(frame) => {
                self.set_current_frame(frame);
                if let Some(view) = self.active_view_mut() {
                    view.annotations.set_loading(true);
                }
            }
        }
        step
    }

    // --- Rendering ---

    /// Redraw the dirty layers of the active view.
    pub fn repaint(&mut self, surfaces: &mut dyn LayerSurfaces) -> Vec<LayerKind> {
        let current = self.current_frame();
        let Some(view) = self.active_view.and_then(|id| self.views.get_mut(&id)) else {
            return Vec::new();
        };
        let frame = self.frames.as_ref().and_then(|loader| loader.frame(current));
        view.repaint(frame, surfaces)
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("views", &self.views.len())
            .field("active_view", &self.active_view)
            .field("plugins", &self.plugin_names())
            .field("history", &self.history.undo_count())
            .field("playing", &self.playback.is_playing())
            .finish()
    }
}
