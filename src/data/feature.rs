//! Typed geographic features.
//!
//! A [`GeoFeature`] couples validated geometry with a per-category
//! [`FeatureKind`] carrying the attributes the renderer cares about. Tags
//! that are not modelled stay available in [`GeoFeature::tags`].

use crate::core::constants::{METERS_PER_LAYER, METERS_PER_LEVEL};
use crate::core::geo::{BoundingBox, LatLng};
use crate::geometry::{self, is_closed};
use crate::prelude::HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Free-form OSM tag map
pub type Tags = HashMap<String, String>;

/// Independently refreshed groups of features; one layer session each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Buildings,
    Roads,
    Water,
    /// Parks, vegetation and trees
    Parks,
    Pois,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Buildings,
        LayerKind::Roads,
        LayerKind::Water,
        LayerKind::Parks,
        LayerKind::Pois,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Buildings => "buildings",
            LayerKind::Roads => "roads",
            LayerKind::Water => "water",
            LayerKind::Parks => "parks",
            LayerKind::Pois => "pois",
        }
    }

    /// Whether features of `category` belong to this layer
    pub fn accepts(&self, category: FeatureCategory) -> bool {
        category.layer() == *self
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buildings" | "building" => Ok(LayerKind::Buildings),
            "roads" | "road" => Ok(LayerKind::Roads),
            "water" => Ok(LayerKind::Water),
            "parks" | "park" => Ok(LayerKind::Parks),
            "pois" | "poi" => Ok(LayerKind::Pois),
            other => Err(format!("unknown layer '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Building,
    Road,
    Water,
    Park,
    Poi,
    Tree,
}

impl FeatureCategory {
    pub fn layer(&self) -> LayerKind {
        match self {
            FeatureCategory::Building => LayerKind::Buildings,
            FeatureCategory::Road => LayerKind::Roads,
            FeatureCategory::Water => LayerKind::Water,
            FeatureCategory::Park | FeatureCategory::Tree => LayerKind::Parks,
            FeatureCategory::Poi => LayerKind::Pois,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterType {
    Area,
    Way,
    Coastline,
}

/// Shape a feature's point sequence must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Ring,
    Polyline,
    Point,
}

/// Per-category attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum FeatureKind {
    Building {
        building_type: String,
        height_m: f64,
        min_height_m: f64,
        levels: Option<u32>,
    },
    Road {
        highway: String,
        width_m: f64,
        layer: i32,
        lanes: Option<u32>,
        bridge: bool,
        tunnel: bool,
    },
    Water {
        water_type: WaterType,
        width_m: Option<f64>,
    },
    Park {
        park_type: String,
    },
    Tree {
        height_m: Option<f64>,
    },
    Poi {
        poi_type: String,
        name: Option<String>,
    },
}

impl FeatureKind {
    pub fn category(&self) -> FeatureCategory {
        match self {
            FeatureKind::Building { .. } => FeatureCategory::Building,
            FeatureKind::Road { .. } => FeatureCategory::Road,
            FeatureKind::Water { .. } => FeatureCategory::Water,
            FeatureKind::Park { .. } => FeatureCategory::Park,
            FeatureKind::Tree { .. } => FeatureCategory::Tree,
            FeatureKind::Poi { .. } => FeatureCategory::Poi,
        }
    }

    pub fn geometry(&self) -> GeometryKind {
        match self {
            FeatureKind::Building { .. } | FeatureKind::Park { .. } => GeometryKind::Ring,
            FeatureKind::Water {
                water_type: WaterType::Area,
                ..
            } => GeometryKind::Ring,
            FeatureKind::Road { .. } | FeatureKind::Water { .. } => GeometryKind::Polyline,
            FeatureKind::Tree { .. } | FeatureKind::Poi { .. } => GeometryKind::Point,
        }
    }

    /// Interprets an element's tags. `is_node` and `closed` describe the
    /// element's geometry; returns `None` for elements the pipeline ignores.
    pub fn classify(tags: &Tags, is_node: bool, closed: bool) -> Option<FeatureKind> {
        let tag = |key: &str| tags.get(key).map(String::as_str);

        if is_node {
            if tag("natural") == Some("tree") {
                return Some(FeatureKind::Tree {
                    height_m: tag("height").and_then(parse_length),
                });
            }
            return POI_KEYS.iter().find_map(|key| {
                tag(key).map(|value| FeatureKind::Poi {
                    poi_type: value.to_string(),
                    name: tag("name").map(str::to_string),
                })
            });
        }

        if let Some(building) = tag("building").filter(|b| *b != "no") {
            return closed.then(|| building_from_tags(building, tags));
        }

        if let Some(highway) = tag("highway") {
            if tag("area") == Some("yes") {
                return None;
            }
            return Some(road_from_tags(highway, tags));
        }

        if tag("natural") == Some("coastline") {
            return Some(FeatureKind::Water {
                water_type: WaterType::Coastline,
                width_m: None,
            });
        }
        if let Some(waterway) = tag("waterway") {
            if closed && tag("waterway") == Some("riverbank") {
                return Some(FeatureKind::Water {
                    water_type: WaterType::Area,
                    width_m: None,
                });
            }
            return Some(FeatureKind::Water {
                water_type: WaterType::Way,
                width_m: tag("width")
                    .and_then(parse_length)
                    .or_else(|| default_waterway_width(waterway)),
            });
        }
        let is_water_area = tag("natural") == Some("water")
            || tag("water").is_some()
            || matches!(tag("landuse"), Some("reservoir" | "basin"));
        if is_water_area {
            return closed.then_some(FeatureKind::Water {
                water_type: WaterType::Area,
                width_m: None,
            });
        }

        let park_type = tag("leisure")
            .filter(|v| PARK_LEISURE.contains(v))
            .or_else(|| tag("landuse").filter(|v| PARK_LANDUSE.contains(v)))
            .or_else(|| tag("natural").filter(|v| PARK_NATURAL.contains(v)));
        if let Some(park_type) = park_type {
            return closed.then(|| FeatureKind::Park {
                park_type: park_type.to_string(),
            });
        }

        None
    }
}

const POI_KEYS: [&str; 5] = ["amenity", "shop", "tourism", "historic", "leisure"];
const PARK_LEISURE: [&str; 6] = [
    "park",
    "garden",
    "pitch",
    "playground",
    "nature_reserve",
    "common",
];
const PARK_LANDUSE: [&str; 7] = [
    "forest",
    "grass",
    "meadow",
    "park",
    "recreation_ground",
    "village_green",
    "cemetery",
];
const PARK_NATURAL: [&str; 4] = ["wood", "scrub", "grassland", "heath"];

/// Geometry invariant violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("feature {id}: needs at least {required} points, found {found}")]
    TooFewPoints {
        id: String,
        required: usize,
        found: usize,
    },
    #[error("feature {id}: point features carry exactly one coordinate, found {found}")]
    NotAPoint { id: String, found: usize },
    #[error("feature {id}: invalid coordinate")]
    InvalidCoordinate { id: String },
}

/// An immutable, validated feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    id: String,
    kind: FeatureKind,
    points: Vec<LatLng>,
    importance: f64,
    tags: Tags,
}

impl GeoFeature {
    /// Validates the geometry against the kind's shape. Open rings are closed.
    pub fn new(
        id: impl Into<String>,
        kind: FeatureKind,
        points: Vec<LatLng>,
        tags: Tags,
    ) -> Result<Self, FeatureError> {
        let id = id.into();
        let points = validate_points(&id, kind.geometry(), points)?;
        Ok(Self {
            id,
            kind,
            points,
            importance: 0.0,
            tags,
        })
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = if importance.is_finite() { importance } else { 0.0 };
        self
    }

    /// Same feature with replacement geometry, re-validated
    pub fn with_points(&self, points: Vec<LatLng>) -> Result<Self, FeatureError> {
        let points = validate_points(&self.id, self.kind.geometry(), points)?;
        Ok(Self {
            points,
            ..self.clone()
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn importance(&self) -> f64 {
        self.importance
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn category(&self) -> FeatureCategory {
        self.kind.category()
    }

    pub fn is_ring(&self) -> bool {
        self.kind.geometry() == GeometryKind::Ring
    }

    /// Height above ground in metres (0 when the kind has none)
    pub fn height_m(&self) -> f64 {
        match &self.kind {
            FeatureKind::Building { height_m, .. } => *height_m,
            FeatureKind::Tree { height_m } => height_m.unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn min_height_m(&self) -> f64 {
        match &self.kind {
            FeatureKind::Building { min_height_m, .. } => *min_height_m,
            _ => 0.0,
        }
    }

    pub fn width_m(&self) -> Option<f64> {
        match &self.kind {
            FeatureKind::Road { width_m, .. } => Some(*width_m),
            FeatureKind::Water { width_m, .. } => *width_m,
            _ => None,
        }
    }

    /// Elevation of raised roads (bridges, overpasses)
    pub fn elevation_m(&self) -> f64 {
        match &self.kind {
            FeatureKind::Road {
                layer,
                bridge,
                tunnel,
                ..
            } => {
                if *tunnel {
                    0.0
                } else if *layer > 0 {
                    *layer as f64 * METERS_PER_LAYER
                } else if *bridge {
                    METERS_PER_LAYER
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Poi {
                name: Some(name), ..
            } => Some(name.as_str()),
            _ => self.tag("name"),
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }

    pub fn centroid(&self) -> Option<LatLng> {
        geometry::centroid(&self.points)
    }

    /// Ground area of ring features in square metres
    pub fn area_m2(&self) -> f64 {
        if self.is_ring() {
            geometry::ring_area_m2(&self.points)
        } else {
            0.0
        }
    }
}

fn validate_points(
    id: &str,
    geometry: GeometryKind,
    mut points: Vec<LatLng>,
) -> Result<Vec<LatLng>, FeatureError> {
    if points.iter().any(|p| !p.is_valid()) {
        return Err(FeatureError::InvalidCoordinate { id: id.to_string() });
    }
    match geometry {
        GeometryKind::Point => {
            if points.len() != 1 {
                return Err(FeatureError::NotAPoint {
                    id: id.to_string(),
                    found: points.len(),
                });
            }
        }
        GeometryKind::Polyline => {
            if points.len() < 2 {
                return Err(FeatureError::TooFewPoints {
                    id: id.to_string(),
                    required: 2,
                    found: points.len(),
                });
            }
        }
        GeometryKind::Ring => {
            if !is_closed(&points) {
                if let Some(first) = points.first().copied() {
                    points.push(first);
                }
            }
            // Closing point plus at least three distinct vertices
            if points.len() < 4 {
                return Err(FeatureError::TooFewPoints {
                    id: id.to_string(),
                    required: 3,
                    found: points.len().saturating_sub(1),
                });
            }
        }
    }
    Ok(points)
}

static LENGTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(\d+(?:[.,]\d+)?)\s*(m|metres?|meters?|ft|feet|')?\s*(?:(\d+(?:\.\d+)?)\s*(?:"|in)?)?\s*$"#)
        .expect("valid length regex")
});

const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_INCH: f64 = 0.0254;

/// Parses OSM length values: `12`, `12 m`, `12.5m`, `40'`, `40 ft`, `10'6"`
pub fn parse_length(value: &str) -> Option<f64> {
    let captures = LENGTH_PATTERN.captures(value)?;
    let number: f64 = captures.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let unit = captures.get(2).map(|m| m.as_str());
    let feet = matches!(unit, Some("ft" | "feet" | "'"));
    let inches = captures
        .get(3)
        .map(|m| m.as_str().parse::<f64>())
        .transpose()
        .ok()?;
    match (feet, inches) {
        (true, inches) => Some(number * METERS_PER_FOOT + inches.unwrap_or(0.0) * METERS_PER_INCH),
        (false, None) => Some(number),
        (false, Some(_)) => None,
    }
}

fn parse_count(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| {
        let v = v.trim();
        v.parse::<u32>()
            .ok()
            .or_else(|| v.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f.round() as u32))
    })
}

fn building_from_tags(building: &str, tags: &Tags) -> FeatureKind {
    let tag = |key: &str| tags.get(key).map(String::as_str);
    let levels = parse_count(tag("building:levels"));
    let roof_levels = parse_count(tag("roof:levels")).unwrap_or(0);
    let height_m = tag("height")
        .and_then(parse_length)
        .or_else(|| levels.map(|l| (l + roof_levels) as f64 * METERS_PER_LEVEL))
        .unwrap_or_else(|| default_building_height(building));
    let min_height_m = tag("min_height")
        .and_then(parse_length)
        .or_else(|| parse_count(tag("building:min_level")).map(|l| l as f64 * METERS_PER_LEVEL))
        .unwrap_or(0.0)
        .min(height_m);
    FeatureKind::Building {
        building_type: building.to_string(),
        height_m,
        min_height_m,
        levels,
    }
}

fn road_from_tags(highway: &str, tags: &Tags) -> FeatureKind {
    let tag = |key: &str| tags.get(key).map(String::as_str);
    let lanes = parse_count(tag("lanes"));
    let width_m = tag("width")
        .and_then(parse_length)
        .or_else(|| lanes.map(|l| l as f64 * 3.5))
        .unwrap_or_else(|| default_road_width(highway));
    let layer = tag("layer")
        .and_then(|l| l.trim().parse::<i32>().ok())
        .unwrap_or(0);
    let truthy = |key: &str| matches!(tag(key), Some(v) if v != "no");
    FeatureKind::Road {
        highway: highway.to_string(),
        width_m,
        layer,
        lanes,
        bridge: truthy("bridge"),
        tunnel: truthy("tunnel"),
    }
}

/// Typical height when neither `height` nor `building:levels` is tagged
pub fn default_building_height(building_type: &str) -> f64 {
    match building_type {
        "garage" | "garages" | "shed" | "hut" | "roof" | "carport" | "kiosk" => 3.0,
        "house" | "detached" | "semidetached_house" | "bungalow" | "farm" => 6.5,
        "terrace" | "retail" | "supermarket" => 8.0,
        "industrial" | "warehouse" => 10.0,
        "school" | "university" => 12.0,
        "apartments" | "residential" | "dormitory" => 15.0,
        "commercial" | "office" | "hospital" | "hotel" => 20.0,
        "church" | "cathedral" | "mosque" | "temple" | "stadium" => 25.0,
        _ => 3.0 * METERS_PER_LEVEL,
    }
}

/// Typical carriageway width per highway class
pub fn default_road_width(highway: &str) -> f64 {
    match highway {
        "motorway" | "motorway_link" => 14.0,
        "trunk" | "trunk_link" => 12.0,
        "primary" | "primary_link" => 10.0,
        "secondary" | "secondary_link" => 8.0,
        "tertiary" | "tertiary_link" => 7.0,
        "residential" => 6.0,
        "unclassified" | "living_street" => 5.0,
        "service" | "pedestrian" => 4.0,
        "footway" | "cycleway" | "steps" => 2.0,
        "path" | "track" | "bridleway" => 1.5,
        _ => 5.0,
    }
}

fn default_waterway_width(waterway: &str) -> Option<f64> {
    match waterway {
        "river" => Some(20.0),
        "canal" => Some(10.0),
        "stream" => Some(3.0),
        "drain" | "ditch" => Some(1.5),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ring() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 0.001),
            LatLng::new(0.001, 0.001),
            LatLng::new(0.001, 0.0),
        ]
    }

    #[test]
    fn test_parse_length_units() {
        assert_eq!(parse_length("12"), Some(12.0));
        assert_eq!(parse_length("12 m"), Some(12.0));
        assert_eq!(parse_length("12,5m"), Some(12.5));
        assert!((parse_length("40'").unwrap() - 12.192).abs() < 1e-9);
        assert!((parse_length("40 ft").unwrap() - 12.192).abs() < 1e-9);
        assert!((parse_length("10'6\"").unwrap() - 3.2004).abs() < 1e-9);
        assert_eq!(parse_length("tall"), None);
        assert_eq!(parse_length("12 5"), None);
    }

    #[test]
    fn test_building_height_sources() {
        let explicit = FeatureKind::classify(&tags(&[("building", "yes"), ("height", "30")]), false, true);
        assert!(matches!(explicit, Some(FeatureKind::Building { height_m, .. }) if height_m == 30.0));

        let levels = FeatureKind::classify(
            &tags(&[("building", "apartments"), ("building:levels", "5")]),
            false,
            true,
        );
        assert!(matches!(levels, Some(FeatureKind::Building { height_m, levels: Some(5), .. })
            if (height_m - 16.0).abs() < 1e-9));

        let fallback = FeatureKind::classify(&tags(&[("building", "house")]), false, true);
        assert!(matches!(fallback, Some(FeatureKind::Building { height_m, .. }) if height_m == 6.5));

        // Buildings need a closed footprint
        assert_eq!(FeatureKind::classify(&tags(&[("building", "yes")]), false, false), None);
        assert_eq!(FeatureKind::classify(&tags(&[("building", "no")]), false, true), None);
    }

    #[test]
    fn test_classify_other_categories() {
        let road = FeatureKind::classify(
            &tags(&[("highway", "primary"), ("bridge", "yes"), ("layer", "1")]),
            false,
            false,
        )
        .unwrap();
        assert_eq!(road.category(), FeatureCategory::Road);
        assert!(matches!(road, FeatureKind::Road { width_m, bridge: true, layer: 1, .. } if width_m == 10.0));

        let lake = FeatureKind::classify(&tags(&[("natural", "water")]), false, true).unwrap();
        assert_eq!(lake.geometry(), GeometryKind::Ring);
        let river = FeatureKind::classify(&tags(&[("waterway", "river")]), false, false).unwrap();
        assert_eq!(river.geometry(), GeometryKind::Polyline);
        let coast = FeatureKind::classify(&tags(&[("natural", "coastline")]), false, false).unwrap();
        assert!(matches!(coast, FeatureKind::Water { water_type: WaterType::Coastline, .. }));

        let park = FeatureKind::classify(&tags(&[("landuse", "forest")]), false, true).unwrap();
        assert_eq!(park.category().layer(), LayerKind::Parks);

        let tree = FeatureKind::classify(&tags(&[("natural", "tree")]), true, false).unwrap();
        assert_eq!(tree.category(), FeatureCategory::Tree);
        assert_eq!(tree.category().layer(), LayerKind::Parks);

        let cafe = FeatureKind::classify(&tags(&[("amenity", "cafe"), ("name", "Mokka")]), true, false).unwrap();
        assert!(matches!(cafe, FeatureKind::Poi { ref poi_type, name: Some(ref n) } if poi_type == "cafe" && n == "Mokka"));

        assert_eq!(FeatureKind::classify(&tags(&[("barrier", "fence")]), false, false), None);
    }

    #[test]
    fn test_ring_is_closed_on_construction() {
        let kind = FeatureKind::Park {
            park_type: "park".into(),
        };
        let feature = GeoFeature::new("way/1", kind.clone(), ring(), Tags::default()).unwrap();
        assert_eq!(feature.points().len(), 5);
        assert!(is_closed(feature.points()));
        assert!(feature.area_m2() > 10_000.0);

        let too_small = GeoFeature::new("way/2", kind, ring()[..2].to_vec(), Tags::default());
        assert!(matches!(too_small, Err(FeatureError::TooFewPoints { .. })));
    }

    #[test]
    fn test_polyline_and_point_invariants() {
        let road = FeatureKind::Road {
            highway: "residential".into(),
            width_m: 6.0,
            layer: 0,
            lanes: None,
            bridge: false,
            tunnel: false,
        };
        assert!(GeoFeature::new("way/3", road.clone(), ring()[..1].to_vec(), Tags::default()).is_err());
        let line = GeoFeature::new("way/3", road, ring()[..2].to_vec(), Tags::default()).unwrap();
        assert!(!line.is_ring());
        assert_eq!(line.width_m(), Some(6.0));

        let poi = FeatureKind::Poi {
            poi_type: "cafe".into(),
            name: None,
        };
        assert!(matches!(
            GeoFeature::new("node/4", poi.clone(), ring(), Tags::default()),
            Err(FeatureError::NotAPoint { found: 4, .. })
        ));
        let bad = vec![LatLng::new(f64::NAN, 0.0)];
        assert!(matches!(
            GeoFeature::new("node/5", poi, bad, Tags::default()),
            Err(FeatureError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_elevation_of_bridges() {
        let kind = FeatureKind::classify(&tags(&[("highway", "secondary"), ("layer", "2")]), false, false).unwrap();
        let feature = GeoFeature::new("way/6", kind, ring()[..2].to_vec(), Tags::default()).unwrap();
        assert_eq!(feature.elevation_m(), 10.0);
    }

    #[test]
    fn test_layer_kind_parsing() {
        assert_eq!("Roads".parse::<LayerKind>(), Ok(LayerKind::Roads));
        assert_eq!("poi".parse::<LayerKind>(), Ok(LayerKind::Pois));
        assert!("rivers".parse::<LayerKind>().is_err());
        assert_eq!(LayerKind::Water.to_string(), "water");
    }
}
