//! Undo/redo across whole gestures.

use annotate_geom::{BoundingBox, CompoundPath, ImagePoint};

use super::{click, ctrl, down, drag, editor, ids, item, key, move_to, payload, up};
use crate::model::Payload;
use crate::tool::Key;

fn square() -> Vec<ImagePoint> {
    vec![
        ImagePoint::new(10.0, 10.0),
        ImagePoint::new(50.0, 10.0),
        ImagePoint::new(50.0, 50.0),
        ImagePoint::new(10.0, 50.0),
    ]
}

#[test]
fn test_create_undo_redo_restores_identical_annotation() {
    let (mut editor, backend) = editor();
    editor.activate_tool("bounding_box").unwrap();
    drag(&mut editor, (10.0, 10.0), (40.0, 30.0));

    let id = ids(&editor)[0];
    let created = editor.active_view().unwrap().annotations.annotation(id).cloned().unwrap();
    assert_eq!(
        created.data().as_image(),
        Some(&Payload::BoundingBox(BoundingBox::new(10.0, 10.0, 30.0, 20.0)))
    );
    let stored = backend.annotation(&item(), id).unwrap();

    assert!(editor.undo());
    assert!(ids(&editor).is_empty());
    assert!(backend.annotation(&item(), id).is_none());

    assert!(editor.redo());
    let restored = editor.active_view().unwrap().annotations.annotation(id).cloned().unwrap();
    assert_eq!(restored.id, created.id);
    assert_eq!(restored.data(), created.data());
    assert_eq!(restored.class_id, created.class_id);
    assert_eq!(backend.annotation(&item(), id), Some(stored));
}

#[test]
fn test_undoing_every_step_restores_initial_state() {
    let (mut editor, _backend) = editor();
    editor.activate_tool("bounding_box").unwrap();
    drag(&mut editor, (10.0, 10.0), (20.0, 20.0));
    drag(&mut editor, (30.0, 30.0), (40.0, 40.0));
    drag(&mut editor, (50.0, 50.0), (70.0, 60.0));

    // Move the last box, then delete the first
    editor.activate_tool("select").unwrap();
    drag(&mut editor, (60.0, 55.0), (65.0, 60.0));
    click(&mut editor, 15.0, 15.0);
    assert!(key(&mut editor, Key::Delete));

    assert_eq!(ids(&editor).len(), 2);
    assert_eq!(editor.history().undo_count(), 5);

    for _ in 0..5 {
        assert!(editor.undo());
    }
    assert!(ids(&editor).is_empty());
    assert!(!editor.history().can_undo());
    assert_eq!(editor.history().redo_count(), 5);
}

#[test]
fn test_vertex_insertion_gesture_undoes_in_one_step() {
    let (mut editor, _backend) = editor();
    editor.activate_tool("polygon").unwrap();
    for p in square() {
        click(&mut editor, p.x, p.y);
    }
    click(&mut editor, 10.0, 10.0);
    let id = ids(&editor)[0];
    let original = payload(&editor, id);
    assert_eq!(original, Some(Payload::Polygon(CompoundPath::new(square()))));

    editor.active_view_mut().unwrap().annotations.select(id);
    let before = editor.history().undo_count();

    // Press on the right edge, drag twice, release
    down(&mut editor, 51.0, 30.0);
    move_to(&mut editor, 60.0, 30.0);
    move_to(&mut editor, 70.0, 30.0);
    up(&mut editor, 75.0, 30.0);

    let Some(Payload::Polygon(path)) = payload(&editor, id) else {
        panic!("expected polygon");
    };
    assert_eq!(path.path.len(), 5);
    assert_eq!(path.path[2], ImagePoint::new(75.0, 30.0));
    assert_eq!(editor.history().undo_count(), before + 1);

    assert!(editor.undo());
    assert_eq!(payload(&editor, id), original);
}

#[test]
fn test_history_shortcuts() {
    let (mut editor, _backend) = editor();
    editor.activate_tool("bounding_box").unwrap();
    drag(&mut editor, (10.0, 10.0), (40.0, 30.0));

    assert!(ctrl(&mut editor, Key::Char('z'), false));
    assert!(ids(&editor).is_empty());
    assert!(ctrl(&mut editor, Key::Char('z'), true));
    assert_eq!(ids(&editor).len(), 1);
    assert!(ctrl(&mut editor, Key::Char('z'), false));
    assert!(ctrl(&mut editor, Key::Char('y'), false));
    assert_eq!(ids(&editor).len(), 1);
    assert!(!ctrl(&mut editor, Key::Char('y'), false));
}

#[test]
fn test_new_action_clears_redo() {
    let (mut editor, _backend) = editor();
    editor.activate_tool("bounding_box").unwrap();
    drag(&mut editor, (10.0, 10.0), (40.0, 30.0));
    assert!(editor.undo());
    assert!(editor.history().can_redo());

    drag(&mut editor, (50.0, 50.0), (60.0, 60.0));
    assert!(!editor.history().can_redo());
    assert!(!editor.redo());
}
