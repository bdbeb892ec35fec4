use crate::core::{bounds::Bounds, geo::Point};
use crate::data::feature::FeatureCategory;
use crate::rendering::color::Color;

/// Drawing pass a primitive belongs to, in painting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderLayer {
    Ground,
    Water,
    Roads,
    Shadows,
    Buildings,
    Trees,
    Pois,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Closed ring, first point repeated last
    Polygon(Vec<Point>),
    Polyline(Vec<Point>),
    Marker { position: Point, radius: f64 },
}

impl Shape {
    pub fn points(&self) -> &[Point] {
        match self {
            Shape::Polygon(points) | Shape::Polyline(points) => points,
            Shape::Marker { position, .. } => std::slice::from_ref(position),
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Shape::Marker { position, radius } => Bounds::new(*position, *position).expanded(*radius),
            _ => Bounds::from_points(self.points()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
}

/// A lit wall face
#[derive(Debug, Clone, PartialEq)]
pub struct WallFace {
    pub corners: [Point; 4],
    pub color: Color,
}

/// Extruded body of a primitive: visible walls back to front, then the roof
#[derive(Debug, Clone, PartialEq)]
pub struct Extruded {
    pub roof: Vec<Point>,
    pub walls: Vec<WallFace>,
}

/// A positioned, coloured shape ready for a drawing surface.
///
/// Primitives are recomputed on every zoom or tilt change and are never
/// cached. Painting them in `z_order` gives correct overlap without a depth
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPrimitive {
    pub feature_id: String,
    pub category: FeatureCategory,
    pub layer: RenderLayer,
    /// Footprint or line in screen pixels
    pub shape: Shape,
    pub extruded: Option<Extruded>,
    pub height_px: f64,
    pub fill: Option<Color>,
    pub wall_color: Option<Color>,
    pub roof_color: Option<Color>,
    pub stroke: Option<Stroke>,
    /// Displacement of the cast shadow, when one is drawn
    pub shadow_offset: Option<Point>,
    pub label: Option<String>,
    /// Position in the final painting order
    pub z_order: usize,
}

impl RenderPrimitive {
    pub(crate) fn new(
        feature_id: impl Into<String>,
        category: FeatureCategory,
        layer: RenderLayer,
        shape: Shape,
    ) -> Self {
        Self {
            feature_id: feature_id.into(),
            category,
            layer,
            shape,
            extruded: None,
            height_px: 0.0,
            fill: None,
            wall_color: None,
            roof_color: None,
            stroke: None,
            shadow_offset: None,
            label: None,
            z_order: 0,
        }
    }

    pub fn is_extruded(&self) -> bool {
        self.extruded.is_some()
    }

    /// Screen bounds including the roof of an extruded shape
    pub fn bounds(&self) -> Bounds {
        let mut bounds = self.shape.bounds();
        if let Some(extruded) = &self.extruded {
            for point in &extruded.roof {
                bounds.extend(point);
            }
        }
        bounds
    }
}
