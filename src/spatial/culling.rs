use crate::core::{bounds::Bounds, geo::Point};
use crate::traits::GeometryOps;

/// Screen-space culling against the drawing surface plus a margin.
///
/// The margin keeps shapes whose extrusion or shadow reaches into view even
/// though their footprint lies just outside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Culling {
    visible: Bounds,
}

impl Culling {
    pub fn new(surface: &Bounds, margin: f64) -> Self {
        Self {
            visible: surface.expanded(margin.max(0.0)),
        }
    }

    pub fn visible_area(&self) -> &Bounds {
        &self.visible
    }

    /// Returns `true` if the rectangle is at least partially visible
    pub fn aabb_visible(&self, target: &Bounds) -> bool {
        target.is_valid() && self.visible.intersects_bounds(target)
    }

    pub fn point_visible(&self, p: &Point) -> bool {
        self.visible.contains_point(p)
    }

    /// Indices of the visible rectangles
    pub fn visible_indices<'a>(&self, objects: impl Iterator<Item = &'a Bounds>) -> Vec<usize> {
        objects
            .enumerate()
            .filter(|(_, b)| self.aabb_visible(b))
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_extends_visibility() {
        let culling = Culling::new(&Bounds::from_coords(0.0, 0.0, 100.0, 100.0), 10.0);
        assert!(culling.point_visible(&Point::new(-5.0, 50.0)));
        assert!(!culling.point_visible(&Point::new(-15.0, 50.0)));

        let boxes = [
            Bounds::from_coords(20.0, 20.0, 30.0, 30.0),
            Bounds::from_coords(200.0, 200.0, 300.0, 300.0),
            Bounds::from_coords(105.0, 0.0, 120.0, 10.0),
            Bounds::empty(),
        ];
        assert_eq!(culling.visible_indices(boxes.iter()), vec![0, 2]);
    }
}
