//! Pure geometry used by the pipeline: simplification, projection and
//! 2.5D extrusion.

pub mod extrude;
pub mod projection;
pub mod simplify;

use crate::core::geo::{LatLng, Point};

/// Planar view of a coordinate, shared by screen points and geographic
/// coordinates (x = longitude, y = latitude)
pub trait Planar: Copy {
    fn xy(&self) -> (f64, f64);

    fn approx_eq(&self, other: &Self) -> bool {
        let (ax, ay) = self.xy();
        let (bx, by) = other.xy();
        (ax - bx).abs() < 1e-12 && (ay - by).abs() < 1e-12
    }
}

impl Planar for Point {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Planar for LatLng {
    fn xy(&self) -> (f64, f64) {
        (self.lng, self.lat)
    }
}

/// True when the path has at least 3 points and ends where it starts
pub fn is_closed<C: Planar>(points: &[C]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 3 => first.approx_eq(last),
        _ => false,
    }
}

pub use extrude::{extrude, lighting_factor, Extrusion, WallQuad};
pub use projection::{centroid, project, ring_area_m2};
pub use simplify::{perpendicular_distance, simplify};
