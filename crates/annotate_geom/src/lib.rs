//! Geometry primitives for the annotation editor.
//!
//! Points are tagged with the coordinate space they live in, so image-pixel
//! coordinates and canvas coordinates cannot be mixed up by accident.

pub mod algebra;
pub mod bounds;
pub mod camera;
pub mod compound_path;
pub mod point;
pub mod zoom_window;

pub use bounds::BoundingBox;
pub use camera::{
    CANVAS_CONTENT_VISIBILITY_MARGIN, CURSOR_FIRST_VERTEX_MAX_DISTANCE, Camera, MAX_SCALE, Size,
};
pub use compound_path::CompoundPath;
pub use point::{Canvas, CanvasPoint, Image, ImagePoint, Point};
pub use zoom_window::{ZoomWindow, zoom_window};
