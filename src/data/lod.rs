//! Level-of-detail post-filter applied to freshly parsed features.

use crate::core::{config::LodConfig, zoom::ZoomBucket};
use crate::data::feature::{FeatureCategory, FeatureKind, GeoFeature, LayerKind, WaterType};
use crate::geometry::simplify::simplify_latlng;

/// Relative rank of a highway class, higher is more important
pub fn highway_rank(highway: &str) -> u8 {
    match highway.trim_end_matches("_link") {
        "motorway" => 10,
        "trunk" => 9,
        "primary" => 8,
        "secondary" => 7,
        "tertiary" => 6,
        "residential" => 4,
        "unclassified" | "living_street" => 3,
        "service" | "pedestrian" => 2,
        _ => 1,
    }
}

fn poi_weight(poi_type: &str) -> f64 {
    match poi_type {
        "attraction" | "museum" | "hospital" | "university" | "townhall" | "stadium"
        | "theatre" | "castle" | "monument" | "zoo" | "theme_park" => 3.0,
        "place_of_worship" | "library" | "school" | "cinema" | "gallery" | "hotel"
        | "viewpoint" => 2.0,
        _ => 1.0,
    }
}

/// Importance score used to rank features before truncation
pub fn importance(feature: &GeoFeature, lod: &LodConfig) -> f64 {
    match feature.kind() {
        FeatureKind::Building {
            building_type,
            height_m,
            ..
        } => {
            let type_weight = if lod.is_important_building(building_type) {
                3.0
            } else {
                1.0
            };
            type_weight * (1.0 + feature.area_m2() / 100.0).ln() + height_m / 10.0
        }
        FeatureKind::Road { highway, .. } => highway_rank(highway) as f64,
        FeatureKind::Water {
            water_type: WaterType::Area,
            ..
        }
        | FeatureKind::Park { .. } => (1.0 + feature.area_m2()).ln(),
        FeatureKind::Water {
            water_type: WaterType::Coastline,
            ..
        } => 20.0,
        FeatureKind::Water { width_m, .. } => 1.0 + width_m.unwrap_or(1.0).ln_1p(),
        FeatureKind::Poi { poi_type, name } => {
            poi_weight(poi_type) + if name.is_some() { 1.0 } else { 0.0 }
        }
        FeatureKind::Tree { .. } => 0.5,
    }
}

/// Filters, simplifies, ranks and truncates one layer's features for `bucket`
pub fn apply_lod(
    kind: LayerKind,
    features: Vec<GeoFeature>,
    bucket: ZoomBucket,
    lod: &LodConfig,
) -> Vec<GeoFeature> {
    let parsed = features.len();
    let min_area = bucket.pick(&lod.min_building_area_m2);
    let tolerance = bucket.pick(&lod.simplify_tolerance_deg);

    let mut kept: Vec<GeoFeature> = features
        .into_iter()
        .filter(|feature| keep_at_bucket(feature, bucket, min_area, lod))
        .map(|feature| simplify_feature(feature, tolerance))
        .map(|feature| {
            let score = importance(&feature, lod);
            feature.with_importance(score)
        })
        .collect();

    kept.sort_by(|a, b| {
        b.importance()
            .total_cmp(&a.importance())
            .then_with(|| a.id().cmp(b.id()))
    });
    kept.truncate(lod.max_features(kind, bucket));

    log::debug!(
        "{kind} at {bucket}: kept {} of {parsed} features",
        kept.len()
    );
    kept
}

fn keep_at_bucket(feature: &GeoFeature, bucket: ZoomBucket, min_area: f64, lod: &LodConfig) -> bool {
    match feature.kind() {
        FeatureKind::Building { building_type, .. } => {
            let important = lod.is_important_building(building_type);
            if bucket.level() <= 2 && !important {
                return false;
            }
            important || feature.area_m2() >= min_area
        }
        _ if feature.category() == FeatureCategory::Tree => {
            bucket.level() >= lod.trees_from_bucket
        }
        _ => true,
    }
}

fn simplify_feature(feature: GeoFeature, tolerance: f64) -> GeoFeature {
    if tolerance <= 0.0 || feature.points().len() < 5 {
        return feature;
    }
    let simplified = simplify_latlng(feature.points(), tolerance);
    if simplified.len() == feature.points().len() {
        return feature;
    }
    // A ring that collapsed below a triangle keeps its original outline
    feature.with_points(simplified).unwrap_or(feature)
}
