//! Persistence collaborator.
//!
//! The engine never talks to a network itself. Hosts implement
//! [`AnnotationBackend`] over whatever transport they use; [`InMemoryBackend`]
//! serves tests and offline sessions.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use thiserror::Error;

use crate::manager::comments::{CommentThread, ThreadId};
use crate::model::AnnotationId;
use crate::serializer::WireAnnotation;

/// Identifies the item (and workflow stage) a view's annotations belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ItemKey {
    pub item_id: String,
    pub stage_id: Option<String>,
}

impl ItemKey {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            stage_id: None,
        }
    }

    pub fn with_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }
}

/// Errors reported by a persistence backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The backend could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The record does not exist remotely
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The backend refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Create/update/delete/list for annotations and comment threads.
pub trait AnnotationBackend {
    fn create_annotation(&self, key: &ItemKey, annotation: &WireAnnotation) -> Result<(), BackendError>;

    fn update_annotation(&self, key: &ItemKey, annotation: &WireAnnotation) -> Result<(), BackendError>;

    fn delete_annotation(&self, key: &ItemKey, id: AnnotationId) -> Result<(), BackendError>;

    fn list_annotations(&self, key: &ItemKey) -> Result<Vec<WireAnnotation>, BackendError>;

    fn create_comment_thread(&self, key: &ItemKey, thread: &CommentThread) -> Result<(), BackendError>;

    fn update_comment_thread(&self, key: &ItemKey, thread: &CommentThread) -> Result<(), BackendError>;

    fn delete_comment_thread(&self, key: &ItemKey, id: ThreadId) -> Result<(), BackendError>;

    fn list_comment_threads(&self, key: &ItemKey) -> Result<Vec<CommentThread>, BackendError>;
}

#[derive(Debug, Default)]
struct Store {
    annotations: BTreeMap<ItemKey, BTreeMap<AnnotationId, WireAnnotation>>,
    threads: BTreeMap<ItemKey, BTreeMap<ThreadId, CommentThread>>,
}

/// Backend keeping everything in memory.
///
/// `set_offline(true)` makes every call fail with [`BackendError::Unavailable`].
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: RefCell<Store>,
    offline: Cell<bool>,
    writes: Cell<usize>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Number of successful create/update/delete calls.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// The stored record for `id`, if any.
    pub fn annotation(&self, key: &ItemKey, id: AnnotationId) -> Option<WireAnnotation> {
        self.store
            .borrow()
            .annotations
            .get(key)
            .and_then(|m| m.get(&id))
            .cloned()
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.offline.get() {
            Err(BackendError::Unavailable("backend is offline".into()))
        } else {
            Ok(())
        }
    }

    fn wrote(&self) {
        self.writes.set(self.writes.get() + 1);
    }
}

impl AnnotationBackend for InMemoryBackend {
    fn create_annotation(&self, key: &ItemKey, annotation: &WireAnnotation) -> Result<(), BackendError> {
        self.check()?;
        let mut store = self.store.borrow_mut();
        let records = store.annotations.entry(key.clone()).or_default();
        if records.contains_key(&annotation.id) {
            return Err(BackendError::Rejected(format!("annotation {} exists", annotation.id)));
        }
        records.insert(annotation.id, annotation.clone());
        self.wrote();
        Ok(())
    }

    fn update_annotation(&self, key: &ItemKey, annotation: &WireAnnotation) -> Result<(), BackendError> {
        self.check()?;
        let mut store = self.store.borrow_mut();
        let record = store
            .annotations
            .get_mut(key)
            .and_then(|m| m.get_mut(&annotation.id))
            .ok_or_else(|| BackendError::NotFound(annotation.id.to_string()))?;
        *record = annotation.clone();
        self.wrote();
        Ok(())
    }

    fn delete_annotation(&self, key: &ItemKey, id: AnnotationId) -> Result<(), BackendError> {
        self.check()?;
        let mut store = self.store.borrow_mut();
        store
            .annotations
            .get_mut(key)
            .and_then(|m| m.remove(&id))
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        self.wrote();
        Ok(())
    }

    fn list_annotations(&self, key: &ItemKey) -> Result<Vec<WireAnnotation>, BackendError> {
        self.check()?;
        Ok(self
            .store
            .borrow()
            .annotations
            .get(key)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn create_comment_thread(&self, key: &ItemKey, thread: &CommentThread) -> Result<(), BackendError> {
        self.check()?;
        self.store
            .borrow_mut()
            .threads
            .entry(key.clone())
            .or_default()
            .insert(thread.id, thread.clone());
        self.wrote();
        Ok(())
    }

    fn update_comment_thread(&self, key: &ItemKey, thread: &CommentThread) -> Result<(), BackendError> {
        self.check()?;
        let mut store = self.store.borrow_mut();
        let record = store
            .threads
            .get_mut(key)
            .and_then(|m| m.get_mut(&thread.id))
            .ok_or_else(|| BackendError::NotFound(format!("thread {}", thread.id.0)))?;
        *record = thread.clone();
        self.wrote();
        Ok(())
    }

    fn delete_comment_thread(&self, key: &ItemKey, id: ThreadId) -> Result<(), BackendError> {
        self.check()?;
        self.store
            .borrow_mut()
            .threads
            .get_mut(key)
            .and_then(|m| m.remove(&id))
            .ok_or_else(|| BackendError::NotFound(format!("thread {}", id.0)))?;
        self.wrote();
        Ok(())
    }

    fn list_comment_threads(&self, key: &ItemKey) -> Result<Vec<CommentThread>, BackendError> {
        self.check()?;
        Ok(self
            .store
            .borrow()
            .threads
            .get(key)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}
