//! Ramer–Douglas–Peucker simplification for polylines and rings.

use super::{is_closed, Planar};
use crate::core::geo::LatLng;

/// Paths this short are returned unchanged
const MIN_SIMPLIFY_LEN: usize = 5;

/// Distance from `p` to the segment `a`–`b` (to `a` when the segment is a point)
pub fn perpendicular_distance<C: Planar>(p: &C, a: &C, b: &C) -> f64 {
    let (px, py) = p.xy();
    let (ax, ay) = a.xy();
    let (bx, by) = b.xy();
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    if len_sq < 1e-24 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let proj_x = ax + t * dx;
    let proj_y = ay + t * dy;
    ((px - proj_x).powi(2) + (py - proj_y).powi(2)).sqrt()
}

/// Simplifies a path with RDP.
///
/// Closed rings stay closed: the ring is split at the vertex farthest from
/// its start and each half is simplified as a polyline. The output is always
/// a subsequence of the input and never shorter than 2 points.
pub fn simplify<C: Planar>(points: &[C], tolerance: f64) -> Vec<C> {
    if points.len() < MIN_SIMPLIFY_LEN || !(tolerance > 0.0) || !tolerance.is_finite() {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    let last = points.len() - 1;
    keep[0] = true;
    keep[last] = true;

    if is_closed(points) {
        let far = farthest_from(points, 0);
        keep[far] = true;
        rdp(points, 0, far, tolerance, &mut keep);
        rdp(points, far, last, tolerance, &mut keep);
    } else {
        rdp(points, 0, last, tolerance, &mut keep);
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

/// Geographic convenience wrapper (tolerance in degrees)
pub fn simplify_latlng(points: &[LatLng], tolerance_deg: f64) -> Vec<LatLng> {
    simplify(points, tolerance_deg)
}

fn rdp<C: Planar>(points: &[C], start: usize, end: usize, tolerance: f64, keep: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let (a, b) = (&points[start], &points[end]);
    let mut max_distance = 0.0;
    let mut index = start;
    for (i, point) in points.iter().enumerate().take(end).skip(start + 1) {
        let distance = perpendicular_distance(point, a, b);
        if distance > max_distance {
            max_distance = distance;
            index = i;
        }
    }

    if max_distance > tolerance {
        keep[index] = true;
        rdp(points, start, index, tolerance, keep);
        rdp(points, index, end, tolerance, keep);
    }
}

fn farthest_from<C: Planar>(points: &[C], origin: usize) -> usize {
    let (ox, oy) = points[origin].xy();
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let (x, y) = p.xy();
            (i, (x - ox).powi(2) + (y - oy).powi(2))
        })
        .fold((origin, 0.0), |best, (i, d)| if d > best.1 { (i, d) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Point;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_zero_tolerance_is_identity() {
        let open = pts(&[(0.0, 0.0), (1.0, 0.1), (2.0, -0.1), (3.0, 5.0), (4.0, 6.0), (5.0, 7.0)]);
        assert_eq!(simplify(&open, 0.0), open);

        let mut closed = open.clone();
        closed.push(open[0]);
        assert_eq!(simplify(&closed, 0.0), closed);
    }

    #[test]
    fn test_short_paths_unchanged() {
        let path = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        assert_eq!(simplify(&path, 10.0), path);
    }

    #[test]
    fn test_collinear_polyline_collapses_to_endpoints() {
        let path: Vec<Point> = (0..20).map(|i| Point::new(i as f64, 2.0 * i as f64)).collect();
        let simplified = simplify(&path, 0.01);
        assert_eq!(simplified, vec![path[0], path[19]]);
    }

    #[test]
    fn test_keeps_significant_vertex() {
        let path = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 3.0), (4.0, 0.0), (5.0, 0.0)]);
        let simplified = simplify(&path, 0.5);
        assert!(simplified.contains(&Point::new(3.0, 3.0)));
        assert_eq!(simplified.first(), path.first());
        assert_eq!(simplified.last(), path.last());
    }

    #[test]
    fn test_ring_closure_preserved() {
        // Square with collinear midpoints on every edge
        let ring = pts(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (2.0, 2.0),
            (1.0, 2.0),
            (0.0, 2.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]);
        let simplified = simplify(&ring, 0.1);
        assert_eq!(simplified.len(), 5);
        assert!(is_closed(&simplified));
        for point in &simplified {
            assert!(ring.contains(point));
        }
    }

    #[test]
    fn test_open_path_stays_open() {
        let path = pts(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0), (4.0, 0.0), (5.0, 1.0)]);
        for tolerance in [0.0, 0.5, 5.0] {
            let simplified = simplify(&path, tolerance);
            assert!(simplified.len() >= 2);
            assert!(!is_closed(&simplified));
        }
    }

    #[test]
    fn test_latlng_wrapper() {
        let ring: Vec<LatLng> = [
            (52.0, 13.0),
            (52.0, 13.0005),
            (52.0, 13.001),
            (52.001, 13.001),
            (52.001, 13.0),
            (52.0, 13.0),
        ]
        .iter()
        .map(|&(lat, lng)| LatLng::new(lat, lng))
        .collect();
        let simplified = simplify_latlng(&ring, 0.0001);
        assert_eq!(simplified.len(), 5);
        assert!(simplified[0].approx_eq(&simplified[4]));
    }
}
