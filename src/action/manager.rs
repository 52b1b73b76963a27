//! Undo/redo history.

use crate::action::{Action, ActionContext, ActionGroup};

/// Identifies an open action group, see [`ActionManager::create_group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u64);

#[derive(Debug)]
enum Entry {
    Single(Box<dyn Action>),
    Group { id: GroupId, group: ActionGroup },
}

impl Entry {
    fn action(&mut self) -> &mut dyn Action {
        match self {
            Entry::Single(action) => action.as_mut(),
            Entry::Group { group, .. } => group as &mut dyn Action,
        }
    }

    fn description(&self) -> String {
        match self {
            Entry::Single(action) => action.description(),
            Entry::Group { group, .. } => group.description(),
        }
    }

    fn group_id(&self) -> Option<GroupId> {
        match self {
            Entry::Single(_) => None,
            Entry::Group { id, .. } => Some(*id),
        }
    }
}

/// The undo/redo history.
///
/// Maintains two stacks:
/// - `undo_stack`: entries that can be undone (most recent at the end)
/// - `redo_stack`: entries that can be redone (most recent at the end)
///
/// A successful `perform` pushes to the undo stack and clears the redo stack.
/// An entry whose `undo`/`redo` fails is dropped. History is strict LIFO and
/// every call takes `&mut self`, so no two history operations can interleave.
#[derive(Debug)]
pub struct ActionManager {
    undo_stack: Vec<Entry>,
    redo_stack: Vec<Entry>,
    max_history: usize,
    next_group: u64,
    /// Bumped on every perform/undo/redo call, successful or not
    revision: u64,
}

impl Default for ActionManager {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ActionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history: max_history.max(1),
            next_group: 0,
            revision: 0,
        }
    }

    /// Execute `action` and record it. Returns false (and records nothing) if it failed.
    pub fn perform(&mut self, mut action: Box<dyn Action>, cx: &mut ActionContext<'_>) -> bool {
        self.revision += 1;
        if !action.perform(cx) {
            log::debug!("🚫 Discarded '{}'", action.description());
            return false;
        }
        self.push(Entry::Single(action));
        true
    }

    /// Record an action whose effect has already been applied.
    pub fn record(&mut self, action: Box<dyn Action>) {
        self.revision += 1;
        self.push(Entry::Single(action));
    }

    /// Start a group. Actions performed into it form one history entry.
    pub fn create_group(&mut self) -> GroupId {
        self.next_group += 1;
        GroupId(self.next_group)
    }

    /// Execute `action` as part of `group`.
    ///
    /// The action joins the group's entry when that entry is on top of the
    /// undo stack; otherwise the group is re-opened as a new entry.
    pub fn perform_in_group(
        &mut self,
        group: GroupId,
        mut action: Box<dyn Action>,
        cx: &mut ActionContext<'_>,
    ) -> bool {
        self.revision += 1;
        if !action.perform(cx) {
            log::debug!("🚫 Discarded '{}'", action.description());
            return false;
        }
        self.append_to_group(group, action);
        true
    }

    /// Record an already-applied action as part of `group`.
    pub fn record_in_group(&mut self, group: GroupId, action: Box<dyn Action>) {
        self.revision += 1;
        self.append_to_group(group, action);
    }

    fn append_to_group(&mut self, id: GroupId, action: Box<dyn Action>) {
        self.redo_stack.clear();
        if let Some(Entry::Group { id: top, group }) = self.undo_stack.last_mut() {
            if *top == id {
                log::debug!("📝 History: '{}' joined group", action.description());
                group.push(action);
                return;
            }
        }
        let mut group = ActionGroup::new();
        group.push(action);
        self.push(Entry::Group { id, group });
    }

    fn push(&mut self, entry: Entry) {
        log::debug!("📝 History: pushed '{}'", entry.description());
        self.undo_stack.push(entry);
        self.redo_stack.clear();

        while self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
    }

    /// Revert the most recent entry. Returns false if there was nothing to undo
    /// or the entry could not be reverted (it is dropped in that case).
    pub fn undo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        self.revision += 1;
        let Some(mut entry) = self.undo_stack.pop() else {
            return false;
        };
        if entry.action().undo(cx) {
            log::debug!("⏪ Undo: '{}'", entry.description());
            self.redo_stack.push(entry);
            true
        } else {
            log::warn!("Undo of '{}' failed, dropping it", entry.description());
            false
        }
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self, cx: &mut ActionContext<'_>) -> bool {
        self.revision += 1;
        let Some(mut entry) = self.redo_stack.pop() else {
            return false;
        };
        if entry.action().perform(cx) {
            log::debug!("⏩ Redo: '{}'", entry.description());
            self.undo_stack.push(entry);
            true
        } else {
            log::warn!("Redo of '{}' failed, dropping it", entry.description());
            false
        }
    }

    /// Remove a group from both stacks without reverting it.
    pub fn remove_group(&mut self, id: GroupId) -> bool {
        let before = self.undo_stack.len() + self.redo_stack.len();
        self.undo_stack.retain(|e| e.group_id() != Some(id));
        self.redo_stack.retain(|e| e.group_id() != Some(id));
        before != self.undo_stack.len() + self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(Entry::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(Entry::description)
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Discard all history. Required whenever the view, file or frame changes.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        log::debug!("🗑️ History cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryBackend;
    use crate::serializer::SerializerRegistry;
    use crate::view::View;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Counts calls; fails when told to.
    #[derive(Debug)]
    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        succeed: bool,
    }

    impl Action for Probe {
        fn perform(&mut self, _cx: &mut ActionContext<'_>) -> bool {
            self.log.borrow_mut().push(format!("do {}", self.name));
            self.succeed
        }

        fn undo(&mut self, _cx: &mut ActionContext<'_>) -> bool {
            self.log.borrow_mut().push(format!("undo {}", self.name));
            self.succeed
        }

        fn description(&self) -> String {
            self.name.to_string()
        }
    }

    struct Fixture {
        view: View,
        serializers: SerializerRegistry,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                view: View::for_tests(Rc::new(InMemoryBackend::new())),
                serializers: SerializerRegistry::new(),
                log: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn probe(&self, name: &'static str) -> Box<dyn Action> {
            Box::new(Probe {
                name,
                log: self.log.clone(),
                succeed: true,
            })
        }

        fn failing(&self, name: &'static str) -> Box<dyn Action> {
            Box::new(Probe {
                name,
                log: self.log.clone(),
                succeed: false,
            })
        }

        fn cx(&mut self) -> ActionContext<'_> {
            ActionContext::new(&mut self.view, &self.serializers)
        }

        fn calls(&self) -> Vec<String> {
            self.log.borrow().clone()
        }
    }

    #[test]
    fn test_can_undo_and_redo() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());

        let a = f.probe("a");
        assert!(history.perform(a, &mut f.cx()));
        assert!(history.can_undo());
        assert!(!history.can_redo());

        assert!(history.undo(&mut f.cx()));
        assert!(!history.can_undo());
        assert!(history.can_redo());

        assert!(history.redo(&mut f.cx()));
        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(f.calls(), ["do a", "undo a", "do a"]);
    }

    #[test]
    fn test_undo_is_lifo() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let (a, b) = (f.probe("a"), f.probe("b"));
        history.perform(a, &mut f.cx());
        history.perform(b, &mut f.cx());
        history.undo(&mut f.cx());
        history.undo(&mut f.cx());
        assert!(!history.undo(&mut f.cx()));
        history.redo(&mut f.cx());
        history.redo(&mut f.cx());
        assert_eq!(
            f.calls(),
            ["do a", "do b", "undo b", "undo a", "do a", "do b"]
        );
    }

    #[test]
    fn test_new_action_after_undo_clears_redo() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let (a, b, c) = (f.probe("a"), f.probe("b"), f.probe("c"));
        history.perform(a, &mut f.cx());
        history.perform(b, &mut f.cx());
        history.undo(&mut f.cx());
        history.perform(c, &mut f.cx());
        assert!(!history.can_redo());
        assert!(!history.redo(&mut f.cx()));
        assert_eq!(history.undo_count(), 2);
    }

    #[test]
    fn test_failed_perform_is_not_recorded() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let bad = f.failing("stale");
        assert!(!history.perform(bad, &mut f.cx()));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_failed_undo_drops_entry() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let bad = f.failing("stale");
        history.record(bad);
        assert!(!history.undo(&mut f.cx()));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_group_is_one_entry() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let group = history.create_group();
        let (a, b, c) = (f.probe("a"), f.probe("b"), f.probe("c"));
        history.perform_in_group(group, a, &mut f.cx());
        history.perform_in_group(group, b, &mut f.cx());
        history.perform_in_group(group, c, &mut f.cx());
        assert_eq!(history.undo_count(), 1);

        assert!(history.undo(&mut f.cx()));
        assert!(!history.can_undo());
        assert_eq!(
            f.calls(),
            ["do a", "do b", "do c", "undo c", "undo b", "undo a"]
        );

        assert!(history.redo(&mut f.cx()));
        assert_eq!(&f.calls()[6..], ["do a", "do b", "do c"]);
    }

    #[test]
    fn test_group_reopens_when_not_on_top() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let group = history.create_group();
        let (a, b, c) = (f.probe("a"), f.probe("b"), f.probe("c"));
        history.perform_in_group(group, a, &mut f.cx());
        history.perform(b, &mut f.cx());
        history.perform_in_group(group, c, &mut f.cx());
        assert_eq!(history.undo_count(), 3);
    }

    #[test]
    fn test_remove_group_from_both_stacks() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let g1 = history.create_group();
        let g2 = history.create_group();
        let (a, b) = (f.probe("a"), f.probe("b"));
        history.perform_in_group(g1, a, &mut f.cx());
        history.perform_in_group(g2, b, &mut f.cx());
        history.undo(&mut f.cx());
        assert!(history.can_redo());
        assert!(history.can_undo());

        assert!(history.remove_group(g2));
        assert!(!history.can_redo());
        assert!(history.can_undo());
        assert!(history.remove_group(g1));
        assert!(!history.can_undo());
        assert!(!history.remove_group(g1));
        // Removing never reverts
        assert!(!f.calls().contains(&"undo a".to_string()));
    }

    #[test]
    fn test_revision_counts_every_call() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        history.undo(&mut f.cx());
        history.redo(&mut f.cx());
        assert_eq!(history.revision(), 2);
        let a = f.probe("a");
        history.perform(a, &mut f.cx());
        assert_eq!(history.revision(), 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut f = Fixture::new();
        let mut history = ActionManager::new(2);
        for name in ["a", "b", "c"] {
            let p = f.probe(name);
            history.perform(p, &mut f.cx());
        }
        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.undo_description().as_deref(), Some("c"));
    }

    #[test]
    fn test_failing_group_member_rolls_back() {
        let mut f = Fixture::new();
        let mut group = ActionGroup::new();
        group.push(f.probe("a"));
        group.push(f.failing("b"));
        assert!(!group.perform(&mut f.cx()));
        assert_eq!(f.calls(), ["do a", "do b", "undo a"]);
    }

    #[test]
    fn test_clear() {
        let mut f = Fixture::new();
        let mut history = ActionManager::default();
        let a = f.probe("a");
        history.perform(a, &mut f.cx());
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
