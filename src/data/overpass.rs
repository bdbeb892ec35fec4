//! Overpass JSON response model and conversion into [`GeoFeature`]s.
//!
//! Ways arrive either with inline `geometry` (`out geom`) or with a `nodes`
//! id list that has to be joined against node elements of the same
//! response. Multipolygon relations contribute one feature per outer way.

use crate::core::geo::LatLng;
use crate::data::feature::{FeatureKind, GeoFeature, LayerKind, Tags};
use crate::fetch::error::FetchError;
use crate::fetch::throttle::is_rate_limit_signal;
use crate::geometry::is_closed;
use crate::prelude::HashMap;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeometryPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<GeometryPoint> for LatLng {
    fn from(point: GeometryPoint) -> Self {
        LatLng::new(point.lat, point.lon)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationMember {
    #[serde(rename = "type")]
    pub member_type: ElementType,
    #[serde(rename = "ref")]
    pub reference: i64,
    #[serde(default)]
    pub role: String,
    /// Missing nodes show up as `null`
    #[serde(default)]
    pub geometry: Vec<Option<GeometryPoint>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub id: i64,
    #[serde(default)]
    pub tags: Tags,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub geometry: Vec<Option<GeometryPoint>>,
    #[serde(default)]
    pub members: Vec<RelationMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    /// Set by the server when the query failed or was cut short
    pub remark: Option<String>,
}

/// Parses a response body into the features of `layer`.
///
/// `endpoint` is only used to label errors. A rate-limit remark becomes
/// [`FetchError::RateLimited`]; any other runtime error remark becomes
/// [`FetchError::UpstreamError`].
pub fn parse_response(
    body: &str,
    layer: LayerKind,
    endpoint: &str,
) -> Result<Vec<GeoFeature>, FetchError> {
    let response: OverpassResponse = serde_json::from_str(body)?;

    if let Some(remark) = response.remark.as_deref() {
        if is_rate_limit_signal(None, remark) {
            return Err(FetchError::RateLimited {
                endpoint: endpoint.to_string(),
            });
        }
        if remark.contains("runtime error") {
            return Err(FetchError::UpstreamError {
                endpoint: endpoint.to_string(),
                status: 200,
                message: remark.to_string(),
            });
        }
        log::debug!("overpass remark: {remark}");
    }

    Ok(convert_elements(&response.elements, layer))
}

/// Converts elements to features, keeping only those that belong to `layer`
pub fn convert_elements(elements: &[OverpassElement], layer: LayerKind) -> Vec<GeoFeature> {
    let node_index: HashMap<i64, LatLng> = elements
        .iter()
        .filter(|e| e.element_type == ElementType::Node)
        .filter_map(|e| Some((e.id, LatLng::new(e.lat?, e.lon?))))
        .collect();

    let mut features = Vec::new();
    let mut dropped = 0usize;
    for element in elements {
        match element.element_type {
            ElementType::Node => {
                let (Some(lat), Some(lon)) = (element.lat, element.lon) else {
                    continue;
                };
                let Some(kind) = FeatureKind::classify(&element.tags, true, false) else {
                    continue;
                };
                push_feature(
                    &mut features,
                    &mut dropped,
                    layer,
                    format!("node/{}", element.id),
                    kind,
                    vec![LatLng::new(lat, lon)],
                    &element.tags,
                );
            }
            ElementType::Way => {
                let points = way_points(element, &node_index);
                let Some(kind) = FeatureKind::classify(&element.tags, false, is_closed(&points))
                else {
                    continue;
                };
                push_feature(
                    &mut features,
                    &mut dropped,
                    layer,
                    format!("way/{}", element.id),
                    kind,
                    points,
                    &element.tags,
                );
            }
            ElementType::Relation => {
                for (index, member) in element.members.iter().enumerate() {
                    let outer = member.role == "outer" || member.role.is_empty();
                    if member.member_type != ElementType::Way || !outer {
                        continue;
                    }
                    let points: Vec<LatLng> =
                        member.geometry.iter().flatten().copied().map(LatLng::from).collect();
                    let Some(kind) =
                        FeatureKind::classify(&element.tags, false, is_closed(&points))
                    else {
                        continue;
                    };
                    push_feature(
                        &mut features,
                        &mut dropped,
                        layer,
                        format!("relation/{}/{}", element.id, index),
                        kind,
                        points,
                        &element.tags,
                    );
                }
            }
            ElementType::Other => {}
        }
    }

    if dropped > 0 {
        log::debug!("dropped {dropped} {layer} elements with invalid geometry");
    }
    features
}

fn way_points(element: &OverpassElement, node_index: &HashMap<i64, LatLng>) -> Vec<LatLng> {
    if !element.geometry.is_empty() {
        return element
            .geometry
            .iter()
            .flatten()
            .copied()
            .map(LatLng::from)
            .collect();
    }
    // Missing nodes are skipped; validation drops ways left too short
    element
        .nodes
        .iter()
        .filter_map(|id| node_index.get(id).copied())
        .collect()
}

fn push_feature(
    features: &mut Vec<GeoFeature>,
    dropped: &mut usize,
    layer: LayerKind,
    id: String,
    kind: FeatureKind,
    points: Vec<LatLng>,
    tags: &Tags,
) {
    if !layer.accepts(kind.category()) {
        return;
    }
    match GeoFeature::new(id, kind, points, tags.clone()) {
        Ok(feature) => features.push(feature),
        Err(err) => {
            log::trace!("{err}");
            *dropped += 1;
        }
    }
}
