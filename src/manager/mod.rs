//! Per-view collection managers.
//!
//! Each manager is the only writer of its collection. Tools and actions go
//! through the manager methods; nothing else holds references into the
//! collections.

mod annotations;
pub mod comments;

pub use annotations::{AnnotationManager, KeyframeInference};
pub use comments::{Comment, CommentManager, CommentThread, ThreadId};
