//! Drawing a view's layers onto host surfaces.
//!
//! The engine does not own any drawing backend. Hosts implement
//! [`DrawSurface`] per layer; everything here is expressed in canvas
//! coordinates through the view's camera.

use std::sync::Arc;

use annotate_geom::{Camera, CanvasPoint, ImagePoint};

use crate::frames::{BitmapHandle, FrameBitmap};
use crate::model::Payload;
use crate::raster::Raster;
use crate::view::palette::{self, Rgba};
use crate::view::{LayerKind, View};

/// A 2D surface accepting stroke, fill, arc and blit calls.
pub trait DrawSurface {
    fn clear(&mut self);

    fn stroke(&mut self, points: &[CanvasPoint], closed: bool, color: Rgba, width: f64);

    fn fill(&mut self, points: &[CanvasPoint], color: Rgba);

    fn arc(&mut self, center: CanvasPoint, radius: f64, color: Rgba, filled: bool);

    /// Draw `bitmap` with its top-left pixel at `top_left`, scaled by `scale`.
    fn blit(&mut self, bitmap: &BitmapHandle, top_left: CanvasPoint, scale: f64);
}

/// Hands out the surface backing each layer.
pub trait LayerSurfaces {
    fn surface(&mut self, kind: LayerKind) -> &mut dyn DrawSurface;
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Stroke {
        points: Vec<CanvasPoint>,
        closed: bool,
        color: Rgba,
    },
    Fill {
        points: Vec<CanvasPoint>,
        color: Rgba,
    },
    Arc {
        center: CanvasPoint,
        radius: f64,
        filled: bool,
    },
    Blit {
        width: u32,
        height: u32,
        top_left: CanvasPoint,
        scale: f64,
    },
}

/// Surface that records calls instead of drawing, for headless hosts.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
}

impl DrawSurface for RecordingSurface {
    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke(&mut self, points: &[CanvasPoint], closed: bool, color: Rgba, _width: f64) {
        self.commands.push(DrawCommand::Stroke {
            points: points.to_vec(),
            closed,
            color,
        });
    }

    fn fill(&mut self, points: &[CanvasPoint], color: Rgba) {
        self.commands.push(DrawCommand::Fill {
            points: points.to_vec(),
            color,
        });
    }

    fn arc(&mut self, center: CanvasPoint, radius: f64, _color: Rgba, filled: bool) {
        self.commands.push(DrawCommand::Arc {
            center,
            radius,
            filled,
        });
    }

    fn blit(&mut self, bitmap: &BitmapHandle, top_left: CanvasPoint, scale: f64) {
        self.commands.push(DrawCommand::Blit {
            width: bitmap.width(),
            height: bitmap.height(),
            top_left,
            scale,
        });
    }
}

/// Radius of vertex handles, in canvas pixels.
const VERTEX_RADIUS: f64 = 3.5;

fn to_canvas(camera: &Camera, points: &[ImagePoint]) -> Vec<CanvasPoint> {
    points.iter().map(|p| camera.image_to_canvas(*p)).collect()
}

fn with_alpha(color: Rgba, alpha: u8) -> Rgba {
    [color[0], color[1], color[2], alpha]
}

/// Draw one payload.
pub fn draw_payload(
    camera: &Camera,
    payload: &Payload,
    color: Rgba,
    selected: bool,
    surface: &mut dyn DrawSurface,
) {
    let stroke_color = if selected { palette::SELECTED_COLOR } else { color };
    let width = if selected { 2.0 } else { 1.0 };

    match payload {
        Payload::BoundingBox(b) => {
            let corners = to_canvas(camera, &b.corners());
            surface.fill(&corners, with_alpha(color, 48));
            surface.stroke(&corners, true, stroke_color, width);
        }
        Payload::Polygon(path) => {
            for ring in path.sub_paths() {
                let ring = to_canvas(camera, ring);
                surface.fill(&ring, with_alpha(color, 48));
                surface.stroke(&ring, true, stroke_color, width);
            }
        }
        Payload::Polyline(line) => {
            surface.stroke(&to_canvas(camera, &line.path), false, stroke_color, width);
        }
        Payload::Skeleton(skeleton) => {
            for node in &skeleton.nodes {
                surface.arc(camera.image_to_canvas(node.point()), VERTEX_RADIUS, color, true);
            }
        }
        Payload::Table(table) => {
            surface.stroke(&to_canvas(camera, &table.bounding_box.corners()), true, stroke_color, width);
            for cell in &table.cells {
                surface.stroke(&to_canvas(camera, &cell.bounding_box.corners()), true, color, 1.0);
            }
        }
        Payload::Mask(mask) => {
            // Pixels are on the mask layer; only the selection outline is drawn here
            if let (true, Some(b)) = (selected, mask.bounding_box) {
                surface.stroke(&to_canvas(camera, &b.corners()), true, stroke_color, width);
            }
        }
        Payload::Tag
        | Payload::DirectionalVector(_)
        | Payload::RasterLayer(_)
        | Payload::Custom(_) => {}
    }

    if selected {
        for vertex in payload.vertices() {
            surface.arc(camera.image_to_canvas(vertex), VERTEX_RADIUS, stroke_color, false);
        }
    }
}

/// Colorize a raster's labels into an RGBA bitmap.
pub fn raster_bitmap(raster: &Raster) -> BitmapHandle {
    let mut image = image::RgbaImage::new(raster.width(), raster.height());
    for (pixel, label) in image.pixels_mut().zip(raster.buffer()) {
        pixel.0 = palette::label_color(*label);
    }
    Arc::new(image)
}

/// Draw layer `kind` of `view`. `frame` is the current media frame, if loaded.
pub fn render_layer(
    view: &View,
    kind: LayerKind,
    frame: Option<&FrameBitmap>,
    surface: &mut dyn DrawSurface,
) {
    let camera = &view.camera;
    match kind {
        LayerKind::Image => {
            let (Some(frame), Some(file)) = (frame, view.files.current_file()) else {
                return;
            };
            // LQ frames are smaller than the file; stretch them to its size
            let stretch = f64::from(file.width) / f64::from(frame.width().max(1));
            surface.blit(
                &frame.bitmap,
                camera.image_to_canvas(ImagePoint::origin()),
                camera.scale() * stretch,
            );
        }
        LayerKind::Masks => {
            let raster = view
                .files
                .current_file()
                .and_then(|f| view.rasters.raster_for_file(&f.id))
                .and_then(|id| view.rasters.raster(id));
            if let Some(raster) = raster {
                surface.blit(
                    &raster_bitmap(raster),
                    camera.image_to_canvas(ImagePoint::origin()),
                    camera.scale(),
                );
            }
        }
        LayerKind::Annotations => {
            for annotation in view.annotations.annotations() {
                if !annotation.flags.is_visible {
                    continue;
                }
                let Some(payload) = view.annotations.resolved_payload(annotation.id) else {
                    continue;
                };
                let mut color = palette::class_color(annotation.class_id);
                if annotation.flags.is_highlighted {
                    color = with_alpha(color, 255);
                }
                draw_payload(camera, &payload, color, annotation.flags.is_selected, surface);
            }
        }
        LayerKind::Comments => {
            for thread in view.comments.visible_threads() {
                let corners = to_canvas(camera, &thread.bounding_box.corners());
                let selected = view.comments.selected() == Some(thread.id);
                let width = if selected { 2.0 } else { 1.0 };
                surface.stroke(&corners, true, palette::COMMENT_COLOR, width);
            }
        }
        LayerKind::Overlay => {
            if let Some(tool) = view.tools.active() {
                tool.draw_overlay(view, surface);
            }
        }
    }
}
