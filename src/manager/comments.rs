//! Comment threads pinned to image regions.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use annotate_geom::{BoundingBox, ImagePoint};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::persistence::{AnnotationBackend, BackendError, ItemKey};

/// Identifier of a comment thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u64);

/// A single comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
}

/// Discussion attached to a region of an image or video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentThread {
    pub id: ThreadId,
    pub bounding_box: BoundingBox,
    /// Frame the thread belongs to; `None` on still images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_index: Option<u32>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Sole owner of a view's comment threads.
///
/// Every mutation is written through to the backend first; the local copy
/// only changes once the backend accepted it.
pub struct CommentManager {
    threads: BTreeMap<ThreadId, CommentThread>,
    next_id: u64,
    selected: Option<ThreadId>,
    current_frame: Option<u32>,
    backend: Rc<dyn AnnotationBackend>,
    item: ItemKey,
    dirty: Cell<bool>,
}

impl CommentManager {
    pub fn new(backend: Rc<dyn AnnotationBackend>, item: ItemKey) -> Self {
        Self {
            threads: BTreeMap::new(),
            next_id: 1,
            selected: None,
            current_frame: None,
            backend,
            item,
            dirty: Cell::new(false),
        }
    }

    pub fn set_item(&mut self, item: ItemKey) {
        self.item = item;
        self.threads.clear();
        self.selected = None;
        self.dirty.set(true);
    }

    pub fn thread(&self, id: ThreadId) -> Option<&CommentThread> {
        self.threads.get(&id)
    }

    pub fn threads(&self) -> impl Iterator<Item = &CommentThread> {
        self.threads.values()
    }

    /// Threads shown at the current frame: still-image threads plus those of this frame.
    pub fn visible_threads(&self) -> impl Iterator<Item = &CommentThread> {
        self.threads
            .values()
            .filter(|t| t.frame_index.is_none() || t.frame_index == self.current_frame)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    /// Open a thread with its first comment.
    pub fn create_thread(&mut self, bounding_box: BoundingBox, first: Comment) -> Result<ThreadId> {
        let id = ThreadId(self.next_id);
        let thread = CommentThread {
            id,
            bounding_box,
            frame_index: self.current_frame,
            resolved: false,
            comments: vec![first],
        };
        self.backend.create_comment_thread(&self.item, &thread)?;
        self.next_id += 1;
        self.threads.insert(id, thread);
        self.dirty.set(true);
        log::debug!("Created comment thread {}", id.0);
        Ok(id)
    }

    fn modify(&mut self, id: ThreadId, f: impl FnOnce(&mut CommentThread)) -> Result<()> {
        let current = self
            .threads
            .get(&id)
            .ok_or_else(|| BackendError::NotFound(format!("thread {}", id.0)))?;
        let mut updated = current.clone();
        f(&mut updated);
        self.backend.update_comment_thread(&self.item, &updated)?;
        self.threads.insert(id, updated);
        self.dirty.set(true);
        Ok(())
    }

    pub fn add_comment(&mut self, id: ThreadId, comment: Comment) -> Result<()> {
        self.modify(id, |t| t.comments.push(comment))
    }

    pub fn set_resolved(&mut self, id: ThreadId, resolved: bool) -> Result<()> {
        self.modify(id, |t| t.resolved = resolved)
    }

    pub fn move_thread(&mut self, id: ThreadId, bounding_box: BoundingBox) -> Result<()> {
        self.modify(id, |t| t.bounding_box = bounding_box)
    }

    pub fn delete_thread(&mut self, id: ThreadId) -> Result<()> {
        self.backend.delete_comment_thread(&self.item, id)?;
        self.threads.remove(&id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.dirty.set(true);
        Ok(())
    }

    /// Replace local threads with the backend's.
    pub fn load(&mut self) -> Result<usize> {
        let threads = self.backend.list_comment_threads(&self.item)?;
        self.threads = threads.into_iter().map(|t| (t.id, t)).collect();
        self.next_id = self.threads.keys().map(|id| id.0 + 1).max().unwrap_or(1);
        self.selected = None;
        self.dirty.set(true);
        Ok(self.threads.len())
    }

    pub fn selected(&self) -> Option<ThreadId> {
        self.selected
    }

    pub fn select(&mut self, id: ThreadId) -> bool {
        if !self.threads.contains_key(&id) {
            return false;
        }
        self.selected = Some(id);
        self.dirty.set(true);
        true
    }

    pub fn deselect(&mut self) {
        if self.selected.take().is_some() {
            self.dirty.set(true);
        }
    }

    /// Frame changes drop the selection, since the thread may not exist on the new frame.
    pub fn set_current_frame(&mut self, frame: Option<u32>) {
        if self.current_frame != frame {
            self.current_frame = frame;
            self.deselect();
            self.dirty.set(true);
        }
    }

    /// Topmost visible thread whose box contains `point`.
    pub fn thread_at(&self, point: &ImagePoint) -> Option<ThreadId> {
        self.visible_threads()
            .filter(|t| t.bounding_box.contains(point))
            .last()
            .map(|t| t.id)
    }
}

impl std::fmt::Debug for CommentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentManager")
            .field("item", &self.item)
            .field("threads", &self.threads.len())
            .field("selected", &self.selected)
            .finish()
    }
}
