//! Pixel brush strokes on a raster.
//!
//! A [`BrushPainter`] paints one stroke of one label. Consecutive stamps
//! further apart than [`MIN_INTERPOLATION_DISTANCE`] are joined by a filled
//! quad so fast pointer moves leave no gaps.

use std::collections::BTreeSet;

use annotate_geom::{CompoundPath, ImagePoint};
use serde::{Deserialize, Serialize};

use crate::raster::rasterize::fill_compound_path;
use crate::raster::{EMPTY_LABEL, PixelRegion, Raster, RasterPatch};

/// Moves shorter than this on both axes would only change sub-pixel coverage.
pub const MIN_INTERPOLATION_DISTANCE: f64 = 2.0;

/// Shape of the brush tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipShape {
    #[default]
    Round,
    Square,
}

#[derive(Debug, Clone, Copy)]
struct Stamp {
    center: ImagePoint,
    radius: f64,
}

/// Result of a finished stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeOutcome {
    /// Pixels as they were before the stroke, over the touched region
    pub before: RasterPatch,
    /// Pixels after the stroke, over the same region
    pub after: RasterPatch,
    /// Other labels that lost pixels to this stroke (and, for erasers, the painted label)
    pub overwritten: BTreeSet<u8>,
}

/// Paints a single stroke of `label`.
#[derive(Debug)]
pub struct BrushPainter {
    label: u8,
    tip: TipShape,
    eraser: bool,
    snapshot: Vec<u8>,
    touched: Option<PixelRegion>,
    overwritten: BTreeSet<u8>,
    previous: Option<Stamp>,
}

impl BrushPainter {
    /// Start a stroke, remembering the raster state for undo.
    pub fn begin(raster: &Raster, label: u8, tip: TipShape, eraser: bool) -> Self {
        let mut overwritten = BTreeSet::new();
        if eraser {
            overwritten.insert(label);
        }
        Self {
            label,
            tip,
            eraser,
            snapshot: raster.buffer().to_vec(),
            touched: None,
            overwritten,
            previous: None,
        }
    }

    pub fn label(&self) -> u8 {
        self.label
    }

    pub fn is_eraser(&self) -> bool {
        self.eraser
    }

    /// Region touched so far.
    pub fn touched(&self) -> Option<PixelRegion> {
        self.touched
    }

    /// Stamp the tip at `center`, interpolating from the previous stamp.
    pub fn stroke(&mut self, raster: &mut Raster, center: ImagePoint, radius: f64) {
        let stamp = Stamp { center, radius };

        if let Some(range) = self.tip_range(raster, &stamp) {
            for y in range.y_min..=range.y_max {
                for x in range.x_min..=range.x_max {
                    if self.tip_covers(&stamp, x, y) {
                        self.paint(raster, x, y);
                    }
                }
            }
            self.touch(range);
        }

        if let Some(previous) = self.previous {
            let dx = (previous.center.x - center.x).abs();
            let dy = (previous.center.y - center.y).abs();
            if dx >= MIN_INTERPOLATION_DISTANCE || dy >= MIN_INTERPOLATION_DISTANCE {
                self.fill_between(raster, &previous, &stamp);
            }
        }

        self.previous = Some(stamp);
    }

    /// Finish the stroke. Returns `None` if nothing was touched.
    pub fn finish(self, raster: &Raster) -> Option<StrokeOutcome> {
        let region = self.touched?;
        let after = raster.read_patch(region).ok()?;
        let before = RasterPatch {
            region,
            pixels: slice_region(&self.snapshot, raster.width(), region),
        };
        Some(StrokeOutcome {
            before,
            after,
            overwritten: self.overwritten,
        })
    }

    fn paint(&mut self, raster: &mut Raster, x: u32, y: u32) {
        let Some(current) = raster.label_at(x, y) else {
            return;
        };
        if self.eraser {
            if current == self.label {
                raster.set_label_at(x, y, EMPTY_LABEL);
            }
        } else if current != self.label {
            if current != EMPTY_LABEL {
                self.overwritten.insert(current);
            }
            raster.set_label_at(x, y, self.label);
        }
    }

    fn touch(&mut self, region: PixelRegion) {
        self.touched = Some(self.touched.map_or(region, |t| t.union(&region)));
    }

    fn half_extent(&self, stamp: &Stamp) -> f64 {
        match self.tip {
            TipShape::Round => stamp.radius,
            TipShape::Square => stamp.radius / std::f64::consts::SQRT_2,
        }
    }

    fn tip_range(&self, raster: &Raster, stamp: &Stamp) -> Option<PixelRegion> {
        let r = self.half_extent(stamp);
        let c = stamp.center;
        let x0 = (c.x - r).floor().max(0.0);
        let y0 = (c.y - r).floor().max(0.0);
        let x1 = (c.x + r).ceil().min(f64::from(raster.width()) - 1.0);
        let y1 = (c.y + r).ceil().min(f64::from(raster.height()) - 1.0);
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some(PixelRegion::new(x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn tip_covers(&self, stamp: &Stamp, x: u32, y: u32) -> bool {
        match self.tip {
            TipShape::Square => true,
            TipShape::Round => {
                let center = ImagePoint::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                center.distance(&stamp.center) < stamp.radius
            }
        }
    }

    fn fill_between(&mut self, raster: &mut Raster, previous: &Stamp, current: &Stamp) {
        let mut quad = quad_linking(previous, current);
        if self.tip == TipShape::Square {
            let prev_corners = square_corners(previous);
            let cur_corners = square_corners(current);
            quad[0] = snap_to_corner(quad[0], &prev_corners);
            quad[1] = snap_to_corner(quad[1], &prev_corners);
            quad[2] = snap_to_corner(quad[2], &cur_corners);
            quad[3] = snap_to_corner(quad[3], &cur_corners);
        }

        let mut pixels = Vec::new();
        let path = CompoundPath::new(quad.to_vec());
        let region = fill_compound_path(&path, raster.width(), raster.height(), |x, y| {
            pixels.push((x, y));
        });
        for (x, y) in pixels {
            self.paint(raster, x, y);
        }
        if let Some(region) = region {
            self.touch(region);
        }
    }
}

/// Quad joining two stamps through the points perpendicular to their direction.
fn quad_linking(previous: &Stamp, current: &Stamp) -> [ImagePoint; 4] {
    let (p, c) = (previous.center, current.center);
    let dist = p.distance(&c);
    let (dx, dy) = ((c.x - p.x) / dist, (c.y - p.y) / dist);
    let (nx, ny) = (-dy, dx);
    [
        ImagePoint::new(p.x + nx * previous.radius, p.y + ny * previous.radius),
        ImagePoint::new(p.x - nx * previous.radius, p.y - ny * previous.radius),
        ImagePoint::new(c.x - nx * current.radius, c.y - ny * current.radius),
        ImagePoint::new(c.x + nx * current.radius, c.y + ny * current.radius),
    ]
}

fn square_corners(stamp: &Stamp) -> [ImagePoint; 4] {
    let r = stamp.radius / std::f64::consts::SQRT_2;
    let c = stamp.center;
    [
        ImagePoint::new(c.x - r, c.y - r),
        ImagePoint::new(c.x + r, c.y - r),
        ImagePoint::new(c.x + r, c.y + r),
        ImagePoint::new(c.x - r, c.y + r),
    ]
}

fn snap_to_corner(p: ImagePoint, corners: &[ImagePoint; 4]) -> ImagePoint {
    corners
        .iter()
        .copied()
        .min_by(|a, b| a.distance(&p).total_cmp(&b.distance(&p)))
        .unwrap_or(p)
}

fn slice_region(buffer: &[u8], width: u32, region: PixelRegion) -> Vec<u8> {
    let mut out = Vec::with_capacity(region.area());
    let row = region.width() as usize;
    for y in region.y_min..=region.y_max {
        let start = y as usize * width as usize + region.x_min as usize;
        out.extend_from_slice(&buffer[start..start + row]);
    }
    out
}
