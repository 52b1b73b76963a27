//! Reversible edits and the undo/redo history.
//!
//! Every mutation a tool makes is wrapped in an [`Action`]. Actions capture
//! their target by id and look it up again on every `perform`/`undo`, so an
//! action whose target disappeared reports `false` instead of touching
//! unrelated state. Gestures that produce several actions collect them in an
//! [`ActionGroup`] so one undo reverts the whole gesture.

mod annotation_actions;
mod manager;
mod mask_actions;

use std::fmt;

pub use annotation_actions::{
    CreateAnnotationAction, DeleteAnnotationAction, DeletedAnnotation, UpdateAnnotationDataAction,
    UpdateVideoSegmentsAction,
};
pub use manager::{ActionManager, GroupId};
pub use mask_actions::MaskEditAction;

use crate::serializer::SerializerRegistry;
use crate::view::View;

/// What an action may touch while it runs.
pub struct ActionContext<'a> {
    pub view: &'a mut View,
    pub serializers: &'a SerializerRegistry,
}

impl<'a> ActionContext<'a> {
    pub fn new(view: &'a mut View, serializers: &'a SerializerRegistry) -> Self {
        Self { view, serializers }
    }
}

/// A reversible unit of mutation.
///
/// `perform` and `undo` must be exact inverses of each other's observable
/// effect. Both return `false` when the target no longer exists or the
/// backend refused the change; in that case nothing was changed.
pub trait Action: fmt::Debug {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool;

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool;

    /// Human-readable label for history menus and logs.
    fn description(&self) -> String;
}

/// Ordered actions treated as one history entry.
///
/// `perform` runs members in order and `undo` in reverse. If a member fails,
/// the members that already ran are reverted so the group is all-or-nothing.
#[derive(Debug, Default)]
pub struct ActionGroup {
    actions: Vec<Box<dyn Action>>,
}

impl ActionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Box<dyn Action>) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Action for ActionGroup {
    fn perform(&mut self, cx: &mut ActionContext<'_>) -> bool {
        for i in 0..self.actions.len() {
            if !self.actions[i].perform(cx) {
                for done in self.actions[..i].iter_mut().rev() {
                    done.undo(cx);
                }
                return false;
            }
        }
        true
    }

    fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        let len = self.actions.len();
        for i in (0..len).rev() {
            if !self.actions[i].undo(cx) {
                for undone in self.actions[i + 1..].iter_mut() {
                    undone.perform(cx);
                }
                return false;
            }
        }
        true
    }

    fn description(&self) -> String {
        match self.actions.as_slice() {
            [] => "Empty group".to_string(),
            [only] => only.description(),
            [first, rest @ ..] => format!("{} (+{} more)", first.description(), rest.len()),
        }
    }
}
