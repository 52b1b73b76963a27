//! End-to-end scenarios driven through the [`Editor`](crate::Editor).
//!
//! Input goes in as canvas positions and key events, the way a host delivers
//! it; assertions look at the view, the history and the backend.

mod history_tests;
mod plugin_tests;

use std::rc::Rc;

use annotate_geom::{CanvasPoint, Size};

use crate::config::EngineConfig;
use crate::editor::Editor;
use crate::model::{AnnotationClass, AnnotationId, ClassId, Payload};
use crate::persistence::{InMemoryBackend, ItemKey};
use crate::tool::{Key, KeyEvent, Modifiers, MouseButton};
use crate::view::MediaFile;

const OBJECT_CLASS: ClassId = 1;

/// Editor with one 100x100 view showing `files`, drawing in [`OBJECT_CLASS`].
fn editor_with(files: Vec<MediaFile>) -> (Editor, Rc<InMemoryBackend>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = Rc::new(InMemoryBackend::new());
    let mut editor = Editor::new(EngineConfig::default(), backend.clone()).unwrap();
    editor.add_view(item(), Size::new(100.0, 100.0));
    editor.set_files(files).unwrap();
    editor.set_classes(vec![AnnotationClass::new(OBJECT_CLASS, "object", Vec::new())]);
    editor.select_class(Some(OBJECT_CLASS));
    (editor, backend)
}

fn editor() -> (Editor, Rc<InMemoryBackend>) {
    editor_with(vec![MediaFile::image("image.png", 100, 100)])
}

fn item() -> ItemKey {
    ItemKey::new("item-1")
}

fn down(editor: &mut Editor, x: f64, y: f64) {
    editor.pointer_down(CanvasPoint::new(x, y), MouseButton::Left, Modifiers::default());
}

fn move_to(editor: &mut Editor, x: f64, y: f64) {
    editor.pointer_move(CanvasPoint::new(x, y), Modifiers::default());
}

fn up(editor: &mut Editor, x: f64, y: f64) {
    editor.pointer_up(CanvasPoint::new(x, y), MouseButton::Left, Modifiers::default());
}

fn click(editor: &mut Editor, x: f64, y: f64) {
    down(editor, x, y);
    up(editor, x, y);
}

fn drag(editor: &mut Editor, from: (f64, f64), to: (f64, f64)) {
    down(editor, from.0, from.1);
    move_to(editor, (from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0);
    up(editor, to.0, to.1);
}

fn key(editor: &mut Editor, key: Key) -> bool {
    editor.key_down(KeyEvent::new(key))
}

fn ctrl(editor: &mut Editor, key: Key, shift: bool) -> bool {
    let modifiers = Modifiers {
        ctrl: true,
        shift,
        ..Modifiers::default()
    };
    editor.key_down(KeyEvent::new(key).with_modifiers(modifiers))
}

fn ids(editor: &Editor) -> Vec<AnnotationId> {
    editor.active_view().map(|v| v.annotations.ids()).unwrap_or_default()
}

fn payload(editor: &Editor, id: AnnotationId) -> Option<Payload> {
    editor.active_view()?.annotations.resolved_payload(id)
}
