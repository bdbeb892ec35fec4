//! Feature model, Overpass query building and response parsing.

pub mod feature;
pub mod lod;
pub mod overpass;
pub mod query;

pub use feature::{FeatureCategory, FeatureKind, GeoFeature, LayerKind, Tags};
pub use lod::apply_lod;
pub use overpass::parse_response;
pub use query::build_query;
