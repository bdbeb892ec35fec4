//! Overpass QL templates per layer and zoom bucket.

use crate::core::{config::LodConfig, geo::BoundingBox, zoom::ZoomBucket};
use crate::data::feature::LayerKind;

const POI_AMENITIES: &str = "restaurant|cafe|bar|pub|fast_food|bank|pharmacy|hospital|school|university|library|theatre|cinema|place_of_worship|townhall|post_office|fuel|parking";
const POI_TOURISM: &str = "attraction|museum|gallery|hotel|viewpoint|artwork|zoo|theme_park";
const POI_LEISURE: &str = "stadium|sports_centre|swimming_pool|marina";

/// Builds the query for `kind` inside `bbox`.
///
/// Returns `None` when nothing of that layer is requested at `bucket`
/// (points of interest below their minimum bucket).
pub fn build_query(
    kind: LayerKind,
    bbox: &BoundingBox,
    bucket: ZoomBucket,
    lod: &LodConfig,
    timeout_secs: u32,
) -> Option<String> {
    let b = bbox.to_query_filter();
    let clauses: Vec<String> = match kind {
        LayerKind::Buildings => building_clauses(&b, bucket, lod),
        LayerKind::Roads => vec![format!(
            r#"way["highway"~"^({})$"]({b});"#,
            lod.highway_types(bucket)
        )],
        LayerKind::Water => {
            let waterways = if bucket.level() <= 1 {
                r#"way["waterway"~"^(river|canal)$"]"#
            } else {
                r#"way["waterway"]"#
            };
            vec![
                format!(r#"way["natural"="water"]({b});"#),
                format!(r#"relation["natural"="water"]({b});"#),
                format!("{waterways}({b});"),
                format!(r#"way["natural"="coastline"]({b});"#),
            ]
        }
        LayerKind::Parks => {
            let mut clauses = vec![
                format!(r#"way["leisure"="park"]({b});"#),
                format!(r#"way["landuse"~"^(forest|grass|meadow)$"]({b});"#),
            ];
            if bucket.level() >= 3 {
                clauses.push(format!(
                    r#"way["leisure"~"^(garden|playground|nature_reserve|pitch)$"]({b});"#
                ));
                clauses.push(format!(r#"way["natural"~"^(wood|scrub|grassland)$"]({b});"#));
                clauses.push(format!(r#"relation["leisure"="park"]({b});"#));
            }
            if bucket.level() >= lod.trees_from_bucket {
                clauses.push(format!(r#"node["natural"="tree"]({b});"#));
            }
            clauses
        }
        LayerKind::Pois => {
            if bucket.level() < lod.pois_from_bucket {
                return None;
            }
            vec![
                format!(r#"node["amenity"~"^({POI_AMENITIES})$"]({b});"#),
                format!(r#"node["tourism"~"^({POI_TOURISM})$"]({b});"#),
                format!(r#"node["historic"]({b});"#),
                format!(r#"node["leisure"~"^({POI_LEISURE})$"]({b});"#),
                format!(r#"node["shop"]["name"]({b});"#),
            ]
        }
    };

    Some(format!(
        "[out:json][timeout:{timeout_secs}];({});out geom;",
        clauses.join("")
    ))
}

fn building_clauses(bbox: &str, bucket: ZoomBucket, lod: &LodConfig) -> Vec<String> {
    if bucket.level() <= 2 {
        let types = lod.important_building_types.join("|");
        vec![format!(r#"way["building"~"^({types})$"]({bbox});"#)]
    } else {
        vec![
            format!(r#"way["building"]({bbox});"#),
            format!(r#"relation["building"]["type"="multipolygon"]({bbox});"#),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox::new(52.5, 13.4, 52.51, 13.41).unwrap()
    }

    #[test]
    fn test_query_envelope() {
        let lod = LodConfig::default();
        let query = build_query(LayerKind::Roads, &bbox(), ZoomBucket::new(3), &lod, 25).unwrap();
        assert!(query.starts_with("[out:json][timeout:25];("));
        assert!(query.ends_with(");out geom;"));
        assert!(query.contains("(52.500000,13.400000,52.510000,13.410000)"));
    }

    #[test]
    fn test_buildings_restricted_at_low_detail() {
        let lod = LodConfig::default();
        let low = build_query(LayerKind::Buildings, &bbox(), ZoomBucket::new(1), &lod, 25).unwrap();
        assert!(low.contains(r#"way["building"~"^(commercial|office"#));
        let high = build_query(LayerKind::Buildings, &bbox(), ZoomBucket::new(4), &lod, 25).unwrap();
        assert!(high.contains(r#"way["building"]("#));
    }

    #[test]
    fn test_road_types_grow_with_bucket() {
        let lod = LodConfig::default();
        let low = build_query(LayerKind::Roads, &bbox(), ZoomBucket::new(1), &lod, 25).unwrap();
        let high = build_query(LayerKind::Roads, &bbox(), ZoomBucket::new(5), &lod, 25).unwrap();
        assert!(!low.contains("residential"));
        assert!(high.contains("residential"));
        assert!(high.contains("footway"));
    }

    #[test]
    fn test_trees_and_pois_gated_by_bucket() {
        let lod = LodConfig::default();
        let parks_low = build_query(LayerKind::Parks, &bbox(), ZoomBucket::new(3), &lod, 25).unwrap();
        let parks_high = build_query(LayerKind::Parks, &bbox(), ZoomBucket::new(4), &lod, 25).unwrap();
        assert!(!parks_low.contains(r#""natural"="tree""#));
        assert!(parks_high.contains(r#"node["natural"="tree"]"#));

        assert!(build_query(LayerKind::Pois, &bbox(), ZoomBucket::new(2), &lod, 25).is_none());
        let pois = build_query(LayerKind::Pois, &bbox(), ZoomBucket::new(3), &lod, 25).unwrap();
        assert!(pois.contains(r#"node["amenity"~"#));
    }

    #[test]
    fn test_water_clauses() {
        let lod = LodConfig::default();
        let water = build_query(LayerKind::Water, &bbox(), ZoomBucket::new(2), &lod, 25).unwrap();
        assert!(water.contains(r#"way["natural"="water"]"#));
        assert!(water.contains(r#"relation["natural"="water"]"#));
        assert!(water.contains(r#"way["waterway"]("#));
        assert!(water.contains(r#"way["natural"="coastline"]"#));
    }
}
