//! Axis-aligned boxes in image space.

use serde::{Deserialize, Serialize};

use crate::point::ImagePoint;

/// Axis-aligned bounding box, wire shape `{x, y, w, h}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Box spanned by two corners, in any order.
    pub fn from_corners(a: ImagePoint, b: ImagePoint) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a ImagePoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (first.x, first.y, first.x, first.y);
        for p in iter {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }
        Some(Self::new(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    pub fn min(&self) -> ImagePoint {
        ImagePoint::new(self.x, self.y)
    }

    pub fn max(&self) -> ImagePoint {
        ImagePoint::new(self.x + self.w, self.y + self.h)
    }

    pub fn center(&self) -> ImagePoint {
        ImagePoint::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, p: &ImagePoint) -> bool {
        p.x >= self.x && p.x <= self.x + self.w && p.y >= self.y && p.y <= self.y + self.h
    }

    pub fn union(&self, other: &Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x_max = (self.x + self.w).max(other.x + other.w);
        let y_max = (self.y + self.h).max(other.y + other.h);
        Self::new(x, y, x_max - x, y_max - y)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// The four corners, clockwise from the top-left.
    pub fn corners(&self) -> [ImagePoint; 4] {
        [
            ImagePoint::new(self.x, self.y),
            ImagePoint::new(self.x + self.w, self.y),
            ImagePoint::new(self.x + self.w, self.y + self.h),
            ImagePoint::new(self.x, self.y + self.h),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_normalizes() {
        let b = BoundingBox::from_corners(ImagePoint::new(10.0, 5.0), ImagePoint::new(2.0, 9.0));
        assert_eq!(b, BoundingBox::new(2.0, 5.0, 8.0, 4.0));
    }

    #[test]
    fn test_from_points() {
        let pts = [
            ImagePoint::new(1.0, 1.0),
            ImagePoint::new(4.0, -2.0),
            ImagePoint::new(3.0, 6.0),
        ];
        assert_eq!(
            BoundingBox::from_points(&pts),
            Some(BoundingBox::new(1.0, -2.0, 3.0, 8.0))
        );
        assert_eq!(BoundingBox::from_points(&[]), None);
    }

    #[test]
    fn test_union() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BoundingBox::new(5.0, 1.0, 1.0, 4.0);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, 0.0, 6.0, 5.0));
    }
}
