//! Features to ordered screen-space primitives.
//!
//! Painting order: ground (parks) → water → roads (minor below major,
//! raised layers above) → building shadows → buildings (north to south) →
//! trees → points of interest.

use crate::core::{bounds::Bounds, config::RenderConfig, geo::Point, viewport::Viewport, zoom::ZoomBucket};
use crate::data::feature::{FeatureCategory, FeatureKind, GeoFeature, WaterType};
use crate::data::lod::highway_rank;
use crate::geometry::{
    extrude::{extrude, shadow_footprint, shadow_offset, sun_vector},
    projection::screen_centroid,
    simplify::simplify,
};
use crate::layers::manager::LayerSnapshot;
use crate::rendering::{
    color::Color,
    palette::{Palette, Theme},
    primitive::{Extruded, RenderLayer, RenderPrimitive, Shape, Stroke, WallFace},
};
use crate::spatial::{culling::Culling, index::Declutter};
use nalgebra::Vector2;

/// Width used for waterways without a `width` tag
const DEFAULT_WATERWAY_WIDTH_M: f64 = 4.0;
const POI_RADIUS_PX: f64 = 4.0;
/// Crown radius relative to tree height
const TREE_CROWN_RATIO: f64 = 0.3;
const DEFAULT_TREE_HEIGHT_M: f64 = 8.0;

/// Per-call view parameters shared by every feature
struct Frame<'a> {
    viewport: &'a Viewport,
    bucket: ZoomBucket,
    tilt: f64,
    extrude: bool,
    culling: Culling,
    simplify_px: f64,
}

/// Primitive plus its position inside its layer
struct Placed {
    key: f64,
    primitive: RenderPrimitive,
}

pub struct Renderer {
    config: RenderConfig,
    palette: Palette,
    sun: Vector2<f64>,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            palette: Palette::for_theme(config.theme),
            sun: sun_vector(config.sun_direction),
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn theme(&self) -> Theme {
        self.palette.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.config.theme = theme;
        self.palette = Palette::for_theme(theme);
    }

    /// Background colour for the drawing surface
    pub fn background(&self) -> Color {
        self.palette.background
    }

    pub fn render(&self, features: &[GeoFeature], viewport: &Viewport) -> Vec<RenderPrimitive> {
        self.render_iter(features.iter(), viewport)
    }

    /// Renders every layer of a snapshot in one ordered list
    pub fn render_layers(&self, snapshot: &LayerSnapshot, viewport: &Viewport) -> Vec<RenderPrimitive> {
        self.render_iter(
            snapshot.layers.iter().flat_map(|(_, features)| features.iter()),
            viewport,
        )
    }

    pub fn render_iter<'a>(
        &self,
        features: impl IntoIterator<Item = &'a GeoFeature>,
        viewport: &Viewport,
    ) -> Vec<RenderPrimitive> {
        let bucket = viewport.zoom_bucket();
        let frame = Frame {
            viewport,
            bucket,
            tilt: viewport.tilt,
            extrude: viewport.tilt > self.config.tilt_threshold,
            culling: Culling::new(&viewport.surface(), self.config.cull_margin_px),
            simplify_px: bucket.pick(&self.config.screen_simplify_px),
        };

        let mut placed = Vec::new();
        let mut pois = Vec::new();
        for feature in features {
            match feature.kind() {
                FeatureKind::Building { .. } => self.building(feature, &frame, &mut placed),
                FeatureKind::Road { .. } => self.road(feature, &frame, &mut placed),
                FeatureKind::Water { .. } => self.water(feature, &frame, &mut placed),
                FeatureKind::Park { park_type } => {
                    let color = self.palette.park_color(park_type);
                    self.area(feature, &frame, RenderLayer::Ground, color, &mut placed)
                }
                FeatureKind::Tree { .. } => {
                    if bucket.level() >= self.config.trees_from_bucket {
                        self.tree(feature, &frame, &mut placed);
                    }
                }
                FeatureKind::Poi { .. } => {
                    if bucket.level() >= self.config.pois_from_bucket {
                        pois.push(feature);
                    }
                }
            }
        }
        self.pois(pois, &frame, &mut placed);

        placed.sort_by(|a, b| {
            a.primitive
                .layer
                .cmp(&b.primitive.layer)
                .then(a.key.total_cmp(&b.key))
                .then_with(|| a.primitive.feature_id.cmp(&b.primitive.feature_id))
        });
        let primitives: Vec<RenderPrimitive> = placed
            .into_iter()
            .enumerate()
            .map(|(z_order, placed)| RenderPrimitive {
                z_order,
                ..placed.primitive
            })
            .collect();
        log::trace!("rendered {} primitives at {}", primitives.len(), bucket);
        primitives
    }

    fn project(&self, feature: &GeoFeature, frame: &Frame) -> Vec<Point> {
        let projected: Vec<Point> = feature
            .points()
            .iter()
            .map(|point| frame.viewport.project(point))
            .collect();
        if frame.simplify_px <= 0.0 || projected.len() < 5 {
            return projected;
        }
        let simplified = simplify(&projected, frame.simplify_px);
        let required = if feature.is_ring() { 4 } else { 2 };
        if simplified.len() >= required {
            simplified
        } else {
            projected
        }
    }

    /// Screen height for `meters`, scaled by tilt and capped
    fn lift_px(&self, meters: f64, frame: &Frame) -> f64 {
        if !frame.extrude || meters <= 0.0 {
            return 0.0;
        }
        (frame.viewport.meters_to_pixels(meters) * self.config.height_scale * frame.tilt)
            .clamp(0.0, self.config.max_height_px)
    }

    fn building(&self, feature: &GeoFeature, frame: &Frame, out: &mut Vec<Placed>) {
        let FeatureKind::Building { building_type, .. } = feature.kind() else {
            return;
        };
        let footprint = self.project(feature, frame);
        let lift = self.lift_px(feature.min_height_m(), frame);
        let height_px = self.lift_px(feature.height_m() - feature.min_height_m(), frame);

        let mut reach = Bounds::from_points(&footprint);
        reach.min.y -= lift + height_px;
        if !frame.culling.aabb_visible(&reach) {
            return;
        }

        let (mut wall, mut roof) = self.palette.building_colors(building_type);
        let theme = self.palette.theme;
        if let Some(color) = feature.tag("building:colour").and_then(Color::parse) {
            wall = theme.tone(color);
        }
        if let Some(color) = feature.tag("roof:colour").and_then(Color::parse) {
            roof = theme.tone(color);
        }

        // Farther (higher up the screen) buildings paint first
        let key = screen_centroid(&footprint).y;
        let base: Vec<Point> = footprint
            .iter()
            .map(|p| Point::new(p.x, p.y - lift))
            .collect();

        let mut primitive = RenderPrimitive::new(
            feature.id(),
            FeatureCategory::Building,
            RenderLayer::Buildings,
            Shape::Polygon(base.clone()),
        );
        primitive.wall_color = Some(wall);
        primitive.roof_color = Some(roof);
        primitive.fill = Some(roof);
        primitive.stroke = Some(Stroke {
            color: wall.darken(0.25),
            width: 0.5,
        });
        primitive.label = feature.name().map(str::to_string);

        if height_px > 0.0 {
            let extrusion = extrude(&base, height_px, &self.sun);
            let walls = extrusion
                .visible_walls()
                .into_iter()
                .map(|w| WallFace {
                    corners: w.corners,
                    color: wall.shade(w.light, self.config.light_strength),
                })
                .collect();
            primitive.extruded = Some(Extruded {
                roof: extrusion.roof,
                walls,
            });
            primitive.height_px = height_px;

            let offset = shadow_offset(lift + height_px, &self.sun, self.config.shadow_length);
            primitive.shadow_offset = Some(offset);
            let shadow = shadow_footprint(&footprint, offset);
            if shadow.len() >= 4 {
                let mut cast = RenderPrimitive::new(
                    feature.id(),
                    FeatureCategory::Building,
                    RenderLayer::Shadows,
                    Shape::Polygon(shadow),
                );
                cast.fill = Some(self.palette.shadow);
                cast.shadow_offset = Some(offset);
                out.push(Placed {
                    key,
                    primitive: cast,
                });
            }
        }

        out.push(Placed { key, primitive });
    }

    fn road(&self, feature: &GeoFeature, frame: &Frame, out: &mut Vec<Placed>) {
        let FeatureKind::Road {
            highway,
            width_m,
            layer,
            tunnel,
            ..
        } = feature.kind()
        else {
            return;
        };
        let line = self.project(feature, frame);
        let width_px = frame.viewport.meters_to_pixels(*width_m).max(1.0);
        let lift = self.lift_px(feature.elevation_m(), frame);

        let mut reach = Bounds::from_points(&line).expanded(width_px);
        reach.min.y -= lift;
        if !frame.culling.aabb_visible(&reach) {
            return;
        }

        let mut color = self.palette.road_color(highway);
        if *tunnel {
            color = color.with_alpha(110);
        }
        let points: Vec<Point> = line.iter().map(|p| Point::new(p.x, p.y - lift)).collect();

        let mut primitive = RenderPrimitive::new(
            feature.id(),
            FeatureCategory::Road,
            RenderLayer::Roads,
            Shape::Polyline(points),
        );
        primitive.stroke = Some(Stroke {
            color,
            width: width_px,
        });
        primitive.label = feature.name().map(str::to_string);
        if lift > 0.0 {
            primitive.height_px = lift;
            primitive.shadow_offset =
                Some(shadow_offset(lift, &self.sun, self.config.shadow_length));
        }

        let level = if *tunnel { (*layer).min(-1) } else { *layer };
        out.push(Placed {
            key: level as f64 * 100.0 + highway_rank(highway) as f64,
            primitive,
        });
    }

    fn water(&self, feature: &GeoFeature, frame: &Frame, out: &mut Vec<Placed>) {
        let FeatureKind::Water { water_type, width_m } = feature.kind() else {
            return;
        };
        if *water_type == WaterType::Area {
            self.area(feature, frame, RenderLayer::Water, self.palette.water, out);
            return;
        }

        let line = self.project(feature, frame);
        let width_px = match water_type {
            WaterType::Coastline => 1.5,
            _ => frame
                .viewport
                .meters_to_pixels(width_m.unwrap_or(DEFAULT_WATERWAY_WIDTH_M))
                .max(1.0),
        };
        if !frame
            .culling
            .aabb_visible(&Bounds::from_points(&line).expanded(width_px))
        {
            return;
        }

        let mut primitive = RenderPrimitive::new(
            feature.id(),
            FeatureCategory::Water,
            RenderLayer::Water,
            Shape::Polyline(line),
        );
        primitive.stroke = Some(Stroke {
            color: self.palette.water_line,
            width: width_px,
        });
        // Lines above water areas
        out.push(Placed {
            key: f64::MAX,
            primitive,
        });
    }

    /// Flat filled ring; larger areas paint first
    fn area(
        &self,
        feature: &GeoFeature,
        frame: &Frame,
        layer: RenderLayer,
        fill: Color,
        out: &mut Vec<Placed>,
    ) {
        let ring = self.project(feature, frame);
        let bounds = Bounds::from_points(&ring);
        if !frame.culling.aabb_visible(&bounds) {
            return;
        }
        let mut primitive =
            RenderPrimitive::new(feature.id(), feature.category(), layer, Shape::Polygon(ring));
        primitive.fill = Some(fill);
        primitive.label = feature.name().map(str::to_string);
        out.push(Placed {
            key: -bounds.area(),
            primitive,
        });
    }

    fn tree(&self, feature: &GeoFeature, frame: &Frame, out: &mut Vec<Placed>) {
        let Some(position) = feature.points().first().map(|p| frame.viewport.project(p)) else {
            return;
        };
        if !frame.culling.point_visible(&position) {
            return;
        }
        let height_m = match feature.height_m() {
            h if h > 0.0 => h,
            _ => DEFAULT_TREE_HEIGHT_M,
        };
        let radius = frame
            .viewport
            .meters_to_pixels(height_m * TREE_CROWN_RATIO)
            .clamp(1.5, 12.0);
        let lift = self.lift_px(height_m, frame);
        let crown = Point::new(position.x, position.y - lift);

        let mut primitive = RenderPrimitive::new(
            feature.id(),
            FeatureCategory::Tree,
            RenderLayer::Trees,
            Shape::Marker {
                position: crown,
                radius,
            },
        );
        primitive.fill = Some(self.palette.tree);
        if lift > 0.0 {
            primitive.height_px = lift;
            primitive.shadow_offset =
                Some(shadow_offset(lift, &self.sun, self.config.shadow_length));
        }
        out.push(Placed {
            key: position.y,
            primitive,
        });
    }

    /// Most important first; a point is dropped when a more important one
    /// already sits within the minimum spacing
    fn pois(&self, mut pois: Vec<&GeoFeature>, frame: &Frame, out: &mut Vec<Placed>) {
        pois.sort_by(|a, b| {
            b.importance()
                .total_cmp(&a.importance())
                .then_with(|| a.id().cmp(b.id()))
        });
        let mut declutter = Declutter::new(self.config.poi_min_spacing_px);
        for feature in pois {
            let FeatureKind::Poi { poi_type, name } = feature.kind() else {
                continue;
            };
            let Some(position) = feature.points().first().map(|p| frame.viewport.project(p)) else {
                continue;
            };
            if !frame.culling.point_visible(&position) || !declutter.try_place(feature.id(), position) {
                continue;
            }
            let mut primitive = RenderPrimitive::new(
                feature.id(),
                FeatureCategory::Poi,
                RenderLayer::Pois,
                Shape::Marker {
                    position,
                    radius: POI_RADIUS_PX,
                },
            );
            primitive.fill = Some(self.palette.poi_color(poi_type));
            primitive.stroke = Some(Stroke {
                color: Color::WHITE,
                width: 1.0,
            });
            primitive.label = name.clone();
            out.push(Placed {
                key: position.y,
                primitive,
            });
        }
        log::trace!("placed {} points of interest at {}", declutter.placed(), frame.bucket);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}
