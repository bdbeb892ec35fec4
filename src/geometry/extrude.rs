//! 2.5D extrusion of screen-space footprints.
//!
//! Roofs are the base ring lifted straight up the screen by the extrusion
//! height; walls are the quads between consecutive base and roof vertices.
//! Each wall carries a lighting factor derived from its outward normal and
//! the sun direction.

use super::{is_closed, projection::signed_area};
use crate::core::geo::Point;
use geo::ConvexHull;
use geo_types::{Coord, MultiPoint};
use nalgebra::Vector2;

/// One side of an extruded shape
#[derive(Debug, Clone, PartialEq)]
pub struct WallQuad {
    /// base_i, base_i+1, roof_i+1, roof_i
    pub corners: [Point; 4],
    /// Unit outward normal in screen space (y down)
    pub normal: Vector2<f64>,
    /// Lighting in [-1, 1]: positive faces the sun
    pub light: f64,
    /// False when the wall faces away from the viewer
    pub visible: bool,
}

impl WallQuad {
    /// Screen y used to paint walls back to front
    pub fn depth(&self) -> f64 {
        (self.corners[0].y + self.corners[1].y) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extrusion {
    pub base: Vec<Point>,
    pub roof: Vec<Point>,
    pub walls: Vec<WallQuad>,
}

impl Extrusion {
    /// Visible walls ordered back to front
    pub fn visible_walls(&self) -> Vec<&WallQuad> {
        let mut walls: Vec<&WallQuad> = self.walls.iter().filter(|w| w.visible).collect();
        walls.sort_by(|a, b| a.depth().total_cmp(&b.depth()));
        walls
    }
}

/// Normalizes a sun direction, falling back to "light travels down the screen"
pub fn sun_vector(direction: [f64; 2]) -> Vector2<f64> {
    let v = Vector2::new(direction[0], direction[1]);
    let norm = v.norm();
    if norm.is_finite() && norm > f64::EPSILON {
        v / norm
    } else {
        Vector2::new(0.0, 1.0)
    }
}

/// Continuous lighting factor in [-1, 1]. `sun` is the direction light
/// travels, so a wall whose normal points back toward the source is lit.
pub fn lighting_factor(normal: &Vector2<f64>, sun: &Vector2<f64>) -> f64 {
    let lit = normal.dot(&(-*sun));
    if lit.is_finite() {
        lit.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Extrudes a base ring (or polyline) upward by `height_px`
pub fn extrude(base: &[Point], height_px: f64, sun: &Vector2<f64>) -> Extrusion {
    let height = if height_px.is_finite() { height_px.max(0.0) } else { 0.0 };
    let roof: Vec<Point> = base.iter().map(|p| Point::new(p.x, p.y - height)).collect();

    // Positive shoelace area in a y-down frame means (dy, -dx) points outward
    let orientation = if signed_area(base) >= 0.0 { 1.0 } else { -1.0 };
    let closed = is_closed(base);

    let mut walls = Vec::with_capacity(base.len());
    for i in 0..base.len().saturating_sub(1) {
        walls.push(wall(base, &roof, i, i + 1, orientation, sun));
    }
    if !closed && base.len() > 2 {
        walls.push(wall(base, &roof, base.len() - 1, 0, orientation, sun));
    }

    Extrusion {
        base: base.to_vec(),
        roof,
        walls,
    }
}

fn wall(
    base: &[Point],
    roof: &[Point],
    i: usize,
    j: usize,
    orientation: f64,
    sun: &Vector2<f64>,
) -> WallQuad {
    let edge = Vector2::new(base[j].x - base[i].x, base[j].y - base[i].y);
    let normal = Vector2::new(edge.y, -edge.x) * orientation;
    let normal = if normal.norm() > f64::EPSILON {
        normal.normalize()
    } else {
        Vector2::zeros()
    };
    WallQuad {
        corners: [base[i], base[j], roof[j], roof[i]],
        normal,
        light: lighting_factor(&normal, sun),
        // The camera looks up the screen, so walls facing down are seen
        visible: normal.y > -1e-9,
    }
}

/// Ground shadow: hull of the footprint and its copy displaced by `offset`
pub fn shadow_footprint(base: &[Point], offset: Point) -> Vec<Point> {
    let coords: Vec<Coord<f64>> = base
        .iter()
        .flat_map(|p| {
            [
                Coord { x: p.x, y: p.y },
                Coord {
                    x: p.x + offset.x,
                    y: p.y + offset.y,
                },
            ]
        })
        .collect();
    if coords.len() < 3 {
        return Vec::new();
    }
    MultiPoint::from(coords)
        .convex_hull()
        .exterior()
        .points()
        .map(|p| Point::new(p.x(), p.y()))
        .collect()
}

/// Offset of a shadow cast by a shape `height_px` tall
pub fn shadow_offset(height_px: f64, sun: &Vector2<f64>, length: f64) -> Point {
    let shift = *sun * (height_px.max(0.0) * length);
    Point::new(shift.x, shift.y)
}
