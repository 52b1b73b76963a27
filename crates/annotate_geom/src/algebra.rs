//! Small vector-algebra helpers used for hit testing and centroids.

use crate::point::Point;

/// Closest point on segment `a`-`b` to `p`, with the segment parameter `t` in `[0, 1]`.
pub fn project_on_segment<S>(p: &Point<S>, a: &Point<S>, b: &Point<S>) -> (Point<S>, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (*a, 0.0);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    (Point::new(a.x + t * dx, a.y + t * dy), t)
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_to_segment<S>(p: &Point<S>, a: &Point<S>, b: &Point<S>) -> f64 {
    let (closest, _) = project_on_segment(p, a, b);
    p.distance(&closest)
}

/// Even-odd ray casting test against a closed ring.
pub fn ring_contains<S>(ring: &[Point<S>], p: &Point<S>) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let vi = &ring[i];
        let vj = &ring[j];
        if ((vi.y > p.y) != (vj.y > p.y)) && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Signed shoelace area; positive for counter-clockwise rings in a y-up frame.
pub fn signed_area<S>(ring: &[Point<S>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = &ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Arithmetic mean of the points.
pub fn mean<S>(points: &[Point<S>]) -> Option<Point<S>> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Area-weighted centroid of a ring, falling back to the vertex mean for degenerate rings.
pub fn ring_centroid<S>(ring: &[Point<S>]) -> Option<Point<S>> {
    let area = signed_area(ring);
    if area.abs() < f64::EPSILON {
        return mean(ring);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = &ring[(i + 1) % ring.len()];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    Some(Point::new(cx / (6.0 * area), cy / (6.0 * area)))
}

/// Index of the closed-ring edge nearest to `p` together with its distance.
///
/// Edge `i` runs from vertex `i` to vertex `(i + 1) % len`.
pub fn nearest_edge<S>(ring: &[Point<S>], p: &Point<S>, closed: bool) -> Option<(usize, f64)> {
    if ring.len() < 2 {
        return None;
    }
    let edge_count = if closed { ring.len() } else { ring.len() - 1 };
    (0..edge_count)
        .map(|i| {
            let a = &ring[i];
            let b = &ring[(i + 1) % ring.len()];
            (i, distance_to_segment(p, a, b))
        })
        .min_by(|x, y| x.1.total_cmp(&y.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::ImagePoint;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn square() -> Vec<ImagePoint> {
        vec![
            ImagePoint::new(0.0, 0.0),
            ImagePoint::new(10.0, 0.0),
            ImagePoint::new(10.0, 10.0),
            ImagePoint::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_distance_to_segment_interior_and_endpoint() {
        let a = ImagePoint::new(0.0, 0.0);
        let b = ImagePoint::new(10.0, 0.0);
        assert!(approx_eq(distance_to_segment(&ImagePoint::new(5.0, 3.0), &a, &b), 3.0));
        assert!(approx_eq(distance_to_segment(&ImagePoint::new(13.0, 4.0), &a, &b), 5.0));
    }

    #[test]
    fn test_degenerate_segment() {
        let a = ImagePoint::new(1.0, 1.0);
        assert!(approx_eq(distance_to_segment(&ImagePoint::new(4.0, 5.0), &a, &a), 5.0));
    }

    #[test]
    fn test_ring_contains() {
        let ring = square();
        assert!(ring_contains(&ring, &ImagePoint::new(5.0, 5.0)));
        assert!(!ring_contains(&ring, &ImagePoint::new(15.0, 5.0)));
        assert!(!ring_contains(&ring[..2], &ImagePoint::new(5.0, 5.0)));
    }

    #[test]
    fn test_centroid_of_square() {
        let c = ring_centroid(&square()).unwrap();
        assert!(approx_eq(c.x, 5.0));
        assert!(approx_eq(c.y, 5.0));
    }

    #[test]
    fn test_centroid_of_collinear_falls_back_to_mean() {
        let line = vec![
            ImagePoint::new(0.0, 0.0),
            ImagePoint::new(2.0, 0.0),
            ImagePoint::new(4.0, 0.0),
        ];
        assert_eq!(ring_centroid(&line), Some(ImagePoint::new(2.0, 0.0)));
    }

    #[test]
    fn test_nearest_edge_closing_edge() {
        let ring = square();
        let (edge, dist) = nearest_edge(&ring, &ImagePoint::new(-1.0, 5.0), true).unwrap();
        assert_eq!(edge, 3);
        assert!(approx_eq(dist, 1.0));

        let (edge, _) = nearest_edge(&ring, &ImagePoint::new(-1.0, 5.0), false).unwrap();
        assert_ne!(edge, 3);
    }
}
