//! # cityscape
//!
//! Geodata pipeline for stylized 2.5D city maps.
//!
//! Viewport changes flow through per-layer sessions into a throttled,
//! cached fetch coordinator that talks to Overpass-style endpoints. The
//! resulting typed features are projected, simplified, extruded and lit
//! into ordered render primitives for an external drawing surface.

pub mod core;
pub mod data;
pub mod fetch;
pub mod geometry;
pub mod layers;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod spatial;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::Bounds,
    config::{PipelineConfig, PipelineProfile},
    geo::{BoundingBox, LatLng, Point},
    viewport::Viewport,
    zoom::ZoomBucket,
};

pub use data::feature::{FeatureCategory, FeatureKind, GeoFeature, LayerKind};

pub use fetch::{
    coordinator::{FeatureSource, FetchCoordinator, FetchOutcome},
    error::FetchError,
    transport::{GeoDataTransport, HttpTransport},
};

pub use layers::{manager::LayerManager, session::LayerSession};

pub use rendering::{
    palette::Theme,
    primitive::RenderPrimitive,
    projector::Renderer,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::error::FetchError),
}

/// Error type alias for convenience
pub type Error = MapError;
