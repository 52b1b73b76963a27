//! Input events delivered to tools.

use annotate_geom::{CanvasPoint, ImagePoint};

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer event, in both coordinate spaces.
///
/// Hosts only supply the canvas position; the editor fills in the image
/// position through the view's camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub canvas: CanvasPoint,
    pub image: ImagePoint,
    pub button: MouseButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(canvas: CanvasPoint, image: ImagePoint) -> Self {
        Self {
            canvas,
            image,
            button: MouseButton::Left,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Keyboard keys (simplified set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    Space,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    /// Name used in hotkey maps: the lowercase character, or the key name.
    pub fn name(&self) -> String {
        match self {
            Key::Char(c) => c.to_lowercase().collect(),
            Key::Enter => "enter".into(),
            Key::Escape => "escape".into(),
            Key::Backspace => "backspace".into(),
            Key::Delete => "delete".into(),
            Key::Tab => "tab".into(),
            Key::Space => "space".into(),
            Key::Up => "up".into(),
            Key::Down => "down".into(),
            Key::Left => "left".into(),
            Key::Right => "right".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Pointer appearance requested by the active tool.
///
/// Hosts map these to their own cursors; plugins can override the mapping
/// through [`PluginRegistry::register_cursor`](crate::plugin::PluginRegistry::register_cursor).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Crosshair,
    Pointer,
    Move,
    Wait,
    /// Tool-specific cursor, resolved through registered mappings
    Named(String),
}

impl Cursor {
    pub fn as_str(&self) -> &str {
        match self {
            Cursor::Default => "default",
            Cursor::Crosshair => "crosshair",
            Cursor::Pointer => "pointer",
            Cursor::Move => "move",
            Cursor::Wait => "wait",
            Cursor::Named(name) => name,
        }
    }
}
