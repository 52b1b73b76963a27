//! Image ↔ canvas affine transform.
//!
//! The mapping is `canvas = origin + image * scale - offset`, where `origin` is the
//! canvas position of the media slot and `offset` is the pan in canvas pixels.
//! Both directions are computed from the same three values, so a round trip is
//! exact up to floating-point rounding.

use crate::bounds::BoundingBox;
use crate::point::{CanvasPoint, ImagePoint};

/// Largest zoom factor the camera allows.
pub const MAX_SCALE: f64 = 50.0;

/// Minimum number of canvas pixels of the image that stay visible while scrolling.
pub const CANVAS_CONTENT_VISIBILITY_MARGIN: f64 = 20.0;

/// Canvas distance to the first vertex within which a click closes a path.
pub const CURSOR_FIRST_VERTEX_MAX_DISTANCE: f64 = 8.0;

/// Width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Pan/zoom state of a single view slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    scale: f64,
    offset: CanvasPoint,
    origin: CanvasPoint,
    viewport: Size,
    image: Size,
}

impl Camera {
    /// Camera for an image shown in a viewport, initially fitted to it.
    pub fn new(viewport: Size, image: Size) -> Self {
        let mut camera = Self {
            scale: 1.0,
            offset: CanvasPoint::origin(),
            origin: CanvasPoint::origin(),
            viewport,
            image,
        };
        camera.reset();
        camera
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> CanvasPoint {
        self.offset
    }

    pub fn origin(&self) -> CanvasPoint {
        self.origin
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    /// Position of this slot inside a shared multi-slot canvas.
    pub fn set_origin(&mut self, origin: CanvasPoint) {
        self.origin = origin;
    }

    /// Set scale and pan directly.
    pub fn set_transform(&mut self, scale: f64, offset: CanvasPoint) {
        self.scale = scale.clamp(self.min_zoom(), MAX_SCALE);
        self.offset = offset;
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Switch to new media and fit it to the viewport.
    pub fn set_image_size(&mut self, image: Size) {
        self.image = image;
        self.reset();
    }

    /// Fit the whole image with no padding.
    pub fn reset(&mut self) {
        let full = BoundingBox::new(0.0, 0.0, self.image.width, self.image.height);
        self.scale_to_fit(&full, 0.0);
    }

    /// Half of the scale that fits the image into the viewport.
    pub fn min_zoom(&self) -> f64 {
        if self.image.width <= 0.0 || self.image.height <= 0.0 {
            return f64::MIN_POSITIVE;
        }
        let fit = (self.viewport.height / self.image.height).min(self.viewport.width / self.image.width);
        (fit / 2.0).max(f64::MIN_POSITIVE)
    }

    pub fn image_to_canvas(&self, p: ImagePoint) -> CanvasPoint {
        CanvasPoint::new(
            self.origin.x + p.x * self.scale - self.offset.x,
            self.origin.y + p.y * self.scale - self.offset.y,
        )
    }

    pub fn canvas_to_image(&self, p: CanvasPoint) -> ImagePoint {
        ImagePoint::new(
            (p.x - self.origin.x + self.offset.x) / self.scale,
            (p.y - self.origin.y + self.offset.y) / self.scale,
        )
    }

    /// Convert an image-space length to canvas pixels.
    pub fn image_len_to_canvas(&self, len: f64) -> f64 {
        len * self.scale
    }

    /// Convert a canvas-space length to image pixels.
    pub fn canvas_len_to_image(&self, len: f64) -> f64 {
        len / self.scale
    }

    /// Pan and zoom so `bounds` fills the viewport, keeping `padding` canvas pixels
    /// free on every side.
    pub fn scale_to_fit(&mut self, bounds: &BoundingBox, padding: f64) {
        let avail_w = (self.viewport.width - 2.0 * padding).max(1.0);
        let avail_h = (self.viewport.height - 2.0 * padding).max(1.0);
        let w = bounds.w.max(f64::EPSILON);
        let h = bounds.h.max(f64::EPSILON);

        let fit = (avail_w / w).min(avail_h / h);
        self.scale = fit.clamp(self.min_zoom(), MAX_SCALE);
        self.center_on(bounds.center());
    }

    /// Fit an arbitrary image-space box, as produced by [`crate::zoom_window`].
    pub fn zoom_to_box(&mut self, top_left: ImagePoint, bottom_right: ImagePoint) {
        let bounds = BoundingBox::from_corners(top_left, bottom_right);
        self.scale_to_fit(&bounds, 0.0);
    }

    /// Pan so the image point sits at the viewport center.
    pub fn center_on(&mut self, p: ImagePoint) {
        self.offset = CanvasPoint::new(
            p.x * self.scale - self.viewport.width / 2.0,
            p.y * self.scale - self.viewport.height / 2.0,
        );
    }

    /// Zoom in by `factor` keeping the image point under `cursor` fixed.
    pub fn zoom_in(&mut self, factor: f64, cursor: CanvasPoint) {
        self.zoom_at(self.scale * factor, cursor);
    }

    /// Zoom out by `factor` keeping the image point under `cursor` fixed.
    pub fn zoom_out(&mut self, factor: f64, cursor: CanvasPoint) {
        self.zoom_at(self.scale / factor, cursor);
    }

    fn zoom_at(&mut self, new_scale: f64, cursor: CanvasPoint) {
        let anchor = self.canvas_to_image(cursor);
        self.scale = new_scale.clamp(self.min_zoom(), MAX_SCALE);
        self.offset = CanvasPoint::new(
            self.origin.x + anchor.x * self.scale - cursor.x,
            self.origin.y + anchor.y * self.scale - cursor.y,
        );
    }

    /// Pan by a canvas delta, keeping part of the image on screen.
    pub fn scroll(&mut self, dx: f64, dy: f64) {
        let margin = CANVAS_CONTENT_VISIBILITY_MARGIN;
        let max_x = self.image.width * self.scale - margin;
        let max_y = self.image.height * self.scale - margin;
        let min_x = margin - self.viewport.width;
        let min_y = margin - self.viewport.height;

        self.offset = CanvasPoint::new(
            clamp_loose(self.offset.x + dx, min_x, max_x),
            clamp_loose(self.offset.y + dy, min_y, max_y),
        );
    }

    /// Whether `cursor` is close enough to `first_vertex` to close the path being drawn.
    pub fn cursor_is_closing_path(&self, cursor: CanvasPoint, first_vertex: ImagePoint) -> bool {
        self.image_to_canvas(first_vertex).distance(&cursor) <= CURSOR_FIRST_VERTEX_MAX_DISTANCE
    }
}

// Unlike `f64::clamp`, tolerates `min > max` (tiny images) by preferring `min`.
fn clamp_loose(v: f64, min: f64, max: f64) -> f64 {
    v.min(max).max(min)
}
