//! Annotate - interactive image and video annotation engine
//!
//! The engine behind an annotation canvas: typed annotations per view, tools
//! that turn pointer gestures into reversible actions, a bounded undo/redo
//! history, per-type wire serializers, label rasters for masks and background
//! frame loading for video playback. Rendering and transport stay with the
//! host; it feeds input into an [`Editor`] and draws the layers it reports
//! dirty.

pub mod action;
pub mod config;
pub mod editor;
pub mod error;
pub mod frames;
pub mod manager;
pub mod model;
pub mod notice;
pub mod persistence;
pub mod plugin;
pub mod raster;
pub mod serializer;
pub mod tool;
pub mod view;

#[cfg(test)]
mod tests;

pub use action::{Action, ActionContext, ActionManager};
pub use annotate_geom::{BoundingBox, Camera, CanvasPoint, CompoundPath, ImagePoint, Size};
pub use config::{EngineConfig, init_logging};
pub use editor::Editor;
pub use error::{EngineError, Result};
pub use model::{Annotation, AnnotationData, AnnotationId, AnnotationType, ClassId, Payload};
pub use persistence::{AnnotationBackend, InMemoryBackend, ItemKey};
pub use plugin::{Owner, Plugin, PluginRegistry};
pub use view::{View, ViewId};
