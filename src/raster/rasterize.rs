//! Scan-line polygon filling.
//!
//! A pixel is inside when its center is inside the compound path under the
//! even-odd rule, so holes cut out of the outer boundary stay empty.

use annotate_geom::{CompoundPath, ImagePoint};

use crate::raster::PixelRegion;

struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

fn edges(path: &CompoundPath) -> Vec<Edge> {
    let mut out = Vec::new();
    for ring in path.sub_paths() {
        if ring.len() < 3 {
            continue;
        }
        for (i, a) in ring.iter().enumerate() {
            let b: &ImagePoint = &ring[(i + 1) % ring.len()];
            if a.y != b.y {
                out.push(Edge {
                    x0: a.x,
                    y0: a.y,
                    x1: b.x,
                    y1: b.y,
                });
            }
        }
    }
    out
}

/// Call `f(x, y)` for every pixel of a `width` x `height` raster covered by `path`.
///
/// Returns the region that was touched, or `None` if no pixel is covered.
pub fn fill_compound_path(
    path: &CompoundPath,
    width: u32,
    height: u32,
    mut f: impl FnMut(u32, u32),
) -> Option<PixelRegion> {
    if width == 0 || height == 0 {
        return None;
    }
    let bounds = path.bounds()?;
    let edges = edges(path);
    if edges.is_empty() {
        return None;
    }

    let row_start = (bounds.y - 0.5).ceil().max(0.0) as u32;
    let row_end = ((bounds.y + bounds.h - 0.5).floor()).min(f64::from(height - 1));
    if row_end < 0.0 {
        return None;
    }
    let row_end = row_end as u32;

    let mut touched: Option<PixelRegion> = None;
    let mut crossings = Vec::new();
    for y in row_start..=row_end {
        let yc = f64::from(y) + 0.5;
        crossings.clear();
        for e in &edges {
            if (e.y0 <= yc) != (e.y1 <= yc) {
                crossings.push(e.x0 + (yc - e.y0) * (e.x1 - e.x0) / (e.y1 - e.y0));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let first = (span[0] - 0.5).ceil().max(0.0);
            let last = ((span[1] - 0.5).ceil() - 1.0).min(f64::from(width - 1));
            if last < first {
                continue;
            }
            let (first, last) = (first as u32, last as u32);
            for x in first..=last {
                f(x, y);
            }
            let span_region = PixelRegion::new(first, y, last, y);
            touched = Some(touched.map_or(span_region, |t| t.union(&span_region)));
        }
    }
    touched
}
