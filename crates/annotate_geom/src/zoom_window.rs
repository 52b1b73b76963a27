//! Target viewport computation for "zoom to annotation".

use crate::bounds::BoundingBox;
use crate::point::ImagePoint;

/// Default fraction of the image dimension used as padding.
pub const DEFAULT_PADDING_PCT: f64 = 0.1;

/// Padding never exceeds this many times the shape's own extent.
const MAX_PADDING_EXTENT_RATIO: f64 = 5.0;

/// Image-space rectangle to zoom the camera to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomWindow {
    pub top_left: ImagePoint,
    pub bottom_right: ImagePoint,
}

/// Window around `vertices`, padded on each axis by
/// `min(dimension * padding_pct, |extent| * 5)`.
///
/// Returns `None` when there are no vertices.
pub fn zoom_window(
    vertices: &[ImagePoint],
    width: f64,
    height: f64,
    padding_pct: f64,
) -> Option<ZoomWindow> {
    let bounds = BoundingBox::from_points(vertices)?;

    let pad_x = (width * padding_pct).min(bounds.w.abs() * MAX_PADDING_EXTENT_RATIO);
    let pad_y = (height * padding_pct).min(bounds.h.abs() * MAX_PADDING_EXTENT_RATIO);

    Some(ZoomWindow {
        top_left: ImagePoint::new(bounds.x - pad_x, bounds.y - pad_y),
        bottom_right: ImagePoint::new(bounds.x + bounds.w + pad_x, bounds.y + bounds.h + pad_y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<ImagePoint> {
        vec![
            ImagePoint::new(0.0, 0.0),
            ImagePoint::new(10.0, 0.0),
            ImagePoint::new(10.0, 10.0),
            ImagePoint::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_padding_from_dimensions() {
        let w = zoom_window(&square(), 120.0, 230.0, DEFAULT_PADDING_PCT).unwrap();
        assert_eq!(w.top_left, ImagePoint::new(-12.0, -23.0));
        assert_eq!(w.bottom_right, ImagePoint::new(22.0, 33.0));
    }

    #[test]
    fn test_padding_capped_by_extent() {
        let w = zoom_window(&square(), 1200.0, 2300.0, DEFAULT_PADDING_PCT).unwrap();
        assert_eq!(w.top_left, ImagePoint::new(-50.0, -50.0));
        assert_eq!(w.bottom_right, ImagePoint::new(60.0, 60.0));
    }

    #[test]
    fn test_empty_vertices() {
        assert_eq!(zoom_window(&[], 100.0, 100.0, 0.1), None);
    }
}
