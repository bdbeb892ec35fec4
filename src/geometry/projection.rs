use super::{is_closed, Planar};
use crate::core::bounds::Bounds;
use crate::core::geo::{BoundingBox, LatLng, Point, METERS_PER_DEGREE};
use geo::{Area, Centroid};
use geo_types::{Coord, LineString, Polygon};

/// Linear map from the viewport's geographic extent to its pixel extent.
/// North maps to smaller y.
pub fn project(lat_lng: &LatLng, bounds: &BoundingBox, surface: Point) -> Point {
    let width = bounds.width_deg();
    let height = bounds.height_deg();
    let x = if width > 0.0 {
        (lat_lng.lng - bounds.west) / width * surface.x
    } else {
        surface.x / 2.0
    };
    let y = if height > 0.0 {
        (bounds.north - lat_lng.lat) / height * surface.y
    } else {
        surface.y / 2.0
    };
    Point::new(x, y)
}

/// Inverse of [`project`]
pub fn unproject(point: &Point, bounds: &BoundingBox, surface: Point) -> LatLng {
    let lng = if surface.x > 0.0 {
        bounds.west + point.x / surface.x * bounds.width_deg()
    } else {
        bounds.center().lng
    };
    let lat = if surface.y > 0.0 {
        bounds.north - point.y / surface.y * bounds.height_deg()
    } else {
        bounds.center().lat
    };
    LatLng::new(lat, lng)
}

pub fn project_all(points: &[LatLng], bounds: &BoundingBox, surface: Point) -> Vec<Point> {
    points
        .iter()
        .map(|point| project(point, bounds, surface))
        .collect()
}

fn to_polygon<C: Planar>(ring: &[C]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring
        .iter()
        .map(|point| {
            let (x, y) = point.xy();
            Coord { x, y }
        })
        .collect();
    Polygon::new(LineString::new(coords), Vec::new())
}

/// Shoelace area of a ring in its own planar units; positive when the
/// vertices run counter-clockwise in a y-up frame
pub fn signed_area<C: Planar>(ring: &[C]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    to_polygon(ring).signed_area()
}

/// Area-weighted centroid for rings, vertex mean otherwise
pub fn centroid(points: &[LatLng]) -> Option<LatLng> {
    if points.is_empty() {
        return None;
    }
    if is_closed(points) && signed_area(points).abs() > f64::EPSILON * 1e-6 {
        if let Some(center) = to_polygon(points).centroid() {
            return Some(LatLng::new(center.y(), center.x()));
        }
    }
    let distinct = if is_closed(points) {
        &points[..points.len() - 1]
    } else {
        points
    };
    let n = distinct.len() as f64;
    let (lat, lng) = distinct
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Some(LatLng::new(lat / n, lng / n))
}

/// Approximate ground area of a geographic ring in square metres
pub fn ring_area_m2(points: &[LatLng]) -> f64 {
    if !is_closed(points) {
        return 0.0;
    }
    let area_deg2 = to_polygon(points).unsigned_area();
    let lat = centroid(points).map_or(0.0, |c| c.lat);
    area_deg2 * METERS_PER_DEGREE * METERS_PER_DEGREE * lat.to_radians().cos().abs()
}

/// Mean of the distinct vertices of a screen path
pub fn screen_centroid(points: &[Point]) -> Point {
    let distinct = if is_closed(points) {
        &points[..points.len() - 1]
    } else {
        points
    };
    if distinct.is_empty() {
        return Point::default();
    }
    let sum = distinct
        .iter()
        .fold(Point::default(), |acc, point| acc.add(point));
    sum.multiply(1.0 / distinct.len() as f64)
}

pub fn ring_bounds(points: &[Point]) -> Bounds {
    Bounds::from_points(points)
}
