//! Compound paths and the boolean operations brush editing relies on.
//!
//! A [`CompoundPath`] is an outer boundary plus extra boundaries (holes or
//! disjoint islands). Sub-paths are combined with the even-odd rule, the same
//! way a canvas fills them. Boolean operations go through `geo`, and any
//! sub-path with fewer than three points is dropped on the way in and out.

use std::f64::consts::{FRAC_PI_4, PI, SQRT_2};

use geo::{BooleanOps, ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Polygon, Simplify};
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;
use crate::point::ImagePoint;

/// Minimum number of points a sub-path needs to enclose any area.
pub const MIN_PATH_POINTS: usize = 3;

/// Fixed precision used when generating analytic brush footprints.
const FOOTPRINT_PRECISION: f64 = 1e6;

/// Outer boundary plus additional boundaries, wire shape `{path, additional_paths}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompoundPath {
    pub path: Vec<ImagePoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_paths: Vec<Vec<ImagePoint>>,
}

impl CompoundPath {
    pub fn new(path: Vec<ImagePoint>) -> Self {
        Self {
            path,
            additional_paths: Vec::new(),
        }
    }

    pub fn with_additional(path: Vec<ImagePoint>, additional_paths: Vec<Vec<ImagePoint>>) -> Self {
        Self {
            path,
            additional_paths,
        }
    }

    /// True when no sub-path could enclose any area.
    pub fn is_empty(&self) -> bool {
        self.sub_paths().all(|p| p.len() < MIN_PATH_POINTS)
    }

    /// The outer path followed by every additional path.
    pub fn sub_paths(&self) -> impl Iterator<Item = &Vec<ImagePoint>> {
        std::iter::once(&self.path).chain(self.additional_paths.iter())
    }

    pub fn sub_paths_mut(&mut self) -> impl Iterator<Item = &mut Vec<ImagePoint>> {
        std::iter::once(&mut self.path).chain(self.additional_paths.iter_mut())
    }

    pub fn point_count(&self) -> usize {
        self.sub_paths().map(Vec::len).sum()
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.sub_paths().flatten())
    }

    /// Even-odd containment over all sub-paths.
    pub fn contains(&self, p: &ImagePoint) -> bool {
        self.sub_paths()
            .filter(|ring| crate::algebra::ring_contains(ring, p))
            .count()
            % 2
            == 1
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for ring in self.sub_paths_mut() {
            for p in ring.iter_mut() {
                p.x += dx;
                p.y += dy;
            }
        }
    }

    /// Convert into a `geo` multipolygon, dropping degenerate sub-paths.
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        let mut result = MultiPolygon::new(Vec::new());
        for ring in self.sub_paths() {
            if ring.len() < MIN_PATH_POINTS {
                log::debug!("Dropping degenerate sub-path with {} points", ring.len());
                continue;
            }
            let polygon = Polygon::new(ring_to_line_string(ring), Vec::new());
            result = if result.0.is_empty() {
                MultiPolygon::new(vec![polygon])
            } else {
                result.xor(&MultiPolygon::new(vec![polygon]))
            };
        }
        result
    }

    /// Flatten a `geo` multipolygon back into outer path plus additional paths.
    ///
    /// The first ring becomes `path`; every other exterior and interior ring is
    /// appended to `additional_paths`. An empty result is `{path: [], additional_paths: []}`.
    pub fn from_multi_polygon(multi: &MultiPolygon<f64>) -> Self {
        let mut rings = Vec::new();
        for polygon in &multi.0 {
            rings.push(line_string_to_ring(polygon.exterior()));
            rings.extend(polygon.interiors().iter().map(line_string_to_ring));
        }
        rings.retain(|r| r.len() >= MIN_PATH_POINTS);

        let mut rings = rings.into_iter();
        match rings.next() {
            Some(path) => Self::with_additional(path, rings.collect()),
            None => Self::default(),
        }
    }

    /// Round trip through the boolean backend, discarding degenerate sub-paths.
    pub fn normalized(&self) -> Self {
        Self::from_multi_polygon(&self.to_multi_polygon())
    }

    pub fn union(&self, other: &CompoundPath) -> CompoundPath {
        let a = self.to_multi_polygon();
        let b = other.to_multi_polygon();
        if a.0.is_empty() {
            return Self::from_multi_polygon(&b);
        }
        if b.0.is_empty() {
            return Self::from_multi_polygon(&a);
        }
        Self::from_multi_polygon(&a.union(&b))
    }

    pub fn subtract(&self, other: &CompoundPath) -> CompoundPath {
        let a = self.to_multi_polygon();
        let b = other.to_multi_polygon();
        if a.0.is_empty() || b.0.is_empty() {
            return Self::from_multi_polygon(&a);
        }
        Self::from_multi_polygon(&a.difference(&b))
    }

    pub fn intersection(&self, other: &CompoundPath) -> CompoundPath {
        let a = self.to_multi_polygon();
        let b = other.to_multi_polygon();
        if a.0.is_empty() || b.0.is_empty() {
            return Self::default();
        }
        Self::from_multi_polygon(&a.intersection(&b))
    }

    /// Ramer-Douglas-Peucker simplification of every sub-path.
    pub fn simplify(&self, epsilon: f64) -> CompoundPath {
        let mut simplified: Vec<Vec<ImagePoint>> = self
            .sub_paths()
            .filter(|ring| ring.len() >= MIN_PATH_POINTS)
            .map(|ring| line_string_to_ring(&ring_to_line_string(ring).simplify(&epsilon)))
            .filter(|ring| ring.len() >= MIN_PATH_POINTS)
            .collect();

        if simplified.is_empty() {
            return Self::default();
        }
        let path = simplified.remove(0);
        Self::with_additional(path, simplified)
    }
}

/// Axis-aligned square brush tip of half-size `radius`, sampled as a rotated square.
pub fn square_footprint(center: ImagePoint, radius: f64) -> CompoundPath {
    let r = radius * SQRT_2;
    let path = (0..4u32)
        .map(|i| {
            let angle = FRAC_PI_4 + f64::from(i) * PI / 2.0;
            ImagePoint::new(
                center.x + round_footprint(r * angle.cos()),
                center.y + round_footprint(r * angle.sin()),
            )
        })
        .collect();
    CompoundPath::new(path)
}

/// Regular polygon brush tip approximating a circle of `radius`.
pub fn regular_polygon_footprint(center: ImagePoint, radius: f64, sides: u32) -> CompoundPath {
    let sides = sides.max(3);
    let path = (0..sides)
        .map(|i| {
            let angle = 2.0 * PI * f64::from(i) / f64::from(sides);
            ImagePoint::new(
                center.x + round_footprint(radius * angle.cos()),
                center.y + round_footprint(radius * angle.sin()),
            )
        })
        .collect();
    CompoundPath::new(path)
}

/// Convex hull of two brush tips, covering the gap between consecutive samples.
pub fn stroke_hull(from: &CompoundPath, to: &CompoundPath) -> CompoundPath {
    let points: Vec<geo::Point<f64>> = from
        .sub_paths()
        .chain(to.sub_paths())
        .flatten()
        .map(|p| geo::Point::new(p.x, p.y))
        .collect();
    if points.len() < MIN_PATH_POINTS {
        return CompoundPath::default();
    }
    let hull = MultiPoint::new(points).convex_hull();
    let ring = line_string_to_ring(hull.exterior());
    if ring.len() < MIN_PATH_POINTS {
        return CompoundPath::default();
    }
    CompoundPath::new(ring)
}

// Snap to a fixed grid and turn -0.0 into 0.0.
fn round_footprint(v: f64) -> f64 {
    let rounded = (v * FOOTPRINT_PRECISION).round() / FOOTPRINT_PRECISION;
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn ring_to_line_string(ring: &[ImagePoint]) -> LineString<f64> {
    LineString::new(ring.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
}

fn line_string_to_ring(ls: &LineString<f64>) -> Vec<ImagePoint> {
    let mut ring: Vec<ImagePoint> = ls.coords().map(|c| ImagePoint::new(c.x, c.y)).collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Vec<ImagePoint> {
        vec![
            ImagePoint::new(x, y),
            ImagePoint::new(x + w, y),
            ImagePoint::new(x + w, y + h),
            ImagePoint::new(x, y + h),
        ]
    }

    fn area(path: &CompoundPath) -> f64 {
        use geo::Area;
        path.to_multi_polygon().unsigned_area()
    }

    #[test]
    fn test_degenerate_sub_paths_are_dropped() {
        let path = CompoundPath::with_additional(
            rect(0.0, 0.0, 10.0, 10.0),
            vec![vec![ImagePoint::new(1.0, 1.0), ImagePoint::new(2.0, 2.0)]],
        );
        let normalized = path.normalized();
        assert_eq!(normalized.path.len(), 4);
        assert!(normalized.additional_paths.is_empty());
    }

    #[test]
    fn test_all_degenerate_yields_empty() {
        let path = CompoundPath::with_additional(
            vec![ImagePoint::new(0.0, 0.0), ImagePoint::new(1.0, 0.0)],
            vec![vec![ImagePoint::new(5.0, 5.0)]],
        );
        let normalized = path.normalized();
        assert!(normalized.path.is_empty());
        assert!(normalized.additional_paths.is_empty());
        assert!(path.is_empty());
    }

    #[test]
    fn test_union_of_overlapping_squares() {
        let a = CompoundPath::new(rect(0.0, 0.0, 10.0, 10.0));
        let b = CompoundPath::new(rect(5.0, 0.0, 10.0, 10.0));
        let u = a.union(&b);
        assert!(u.additional_paths.is_empty());
        assert!((area(&u) - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_of_disjoint_squares_flattens_into_additional_paths() {
        let a = CompoundPath::new(rect(0.0, 0.0, 2.0, 2.0));
        let b = CompoundPath::new(rect(10.0, 10.0, 2.0, 2.0));
        let u = a.union(&b);
        assert_eq!(u.additional_paths.len(), 1);
        assert!((area(&u) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_subtract_makes_hole() {
        let outer = CompoundPath::new(rect(0.0, 0.0, 10.0, 10.0));
        let inner = CompoundPath::new(rect(3.0, 3.0, 4.0, 4.0));
        let holed = outer.subtract(&inner);
        assert_eq!(holed.additional_paths.len(), 1);
        assert!((area(&holed) - 84.0).abs() < 1e-6);
        assert!(!holed.contains(&ImagePoint::new(5.0, 5.0)));
        assert!(holed.contains(&ImagePoint::new(1.0, 1.0)));

        // Round trip keeps the hole as a hole
        assert!((area(&holed.normalized()) - 84.0).abs() < 1e-6);
    }

    #[test]
    fn test_subtract_everything() {
        let a = CompoundPath::new(rect(2.0, 2.0, 1.0, 1.0));
        let b = CompoundPath::new(rect(0.0, 0.0, 10.0, 10.0));
        assert_eq!(a.subtract(&b), CompoundPath::default());
    }

    #[test]
    fn test_square_footprint_has_no_signed_zero() {
        let sq = square_footprint(ImagePoint::origin(), 1.0);
        let expected = vec![
            ImagePoint::new(1.0, 1.0),
            ImagePoint::new(-1.0, 1.0),
            ImagePoint::new(-1.0, -1.0),
            ImagePoint::new(1.0, -1.0),
        ];
        assert_eq!(sq.path, expected);

        let zero = square_footprint(ImagePoint::origin(), 0.0);
        for p in &zero.path {
            assert!(!p.x.is_sign_negative());
            assert!(!p.y.is_sign_negative());
        }
    }

    #[test]
    fn test_regular_polygon_footprint() {
        let tip = regular_polygon_footprint(ImagePoint::new(5.0, 5.0), 2.0, 12);
        assert_eq!(tip.path.len(), 12);
        for p in &tip.path {
            assert!((p.distance(&ImagePoint::new(5.0, 5.0)) - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_stroke_hull_covers_gap() {
        let a = square_footprint(ImagePoint::new(0.0, 0.0), 1.0);
        let b = square_footprint(ImagePoint::new(10.0, 0.0), 1.0);
        let hull = stroke_hull(&a, &b);
        assert!(hull.contains(&ImagePoint::new(5.0, 0.0)));
        assert!((area(&hull) - 24.0).abs() < 1e-6);
    }

    #[test]
    fn test_simplify_drops_collinear_points() {
        let mut ring = rect(0.0, 0.0, 10.0, 10.0);
        ring.insert(1, ImagePoint::new(5.0, 0.0));
        let simplified = CompoundPath::new(ring).simplify(0.5);
        assert_eq!(simplified.path.len(), 4);
    }

    #[test]
    fn test_additional_paths_omitted_when_empty() {
        let path = CompoundPath::new(rect(0.0, 0.0, 1.0, 1.0));
        let json = serde_json::to_value(&path).unwrap();
        assert!(json.get("additional_paths").is_none());
        let back: CompoundPath = serde_json::from_value(json).unwrap();
        assert_eq!(back, path);
    }
}
