//! Prelude module for common cityscape types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use cityscape::prelude::*;`

pub use crate::core::{
    bounds::Bounds,
    config::{PipelineConfig, PipelineProfile},
    geo::{BoundingBox, LatLng, Point},
    viewport::Viewport,
    zoom::ZoomBucket,
};

pub use crate::data::feature::{FeatureCategory, FeatureKind, GeoFeature, LayerKind, Tags};

pub use crate::fetch::{
    cache::FeatureList,
    coordinator::{FeatureSource, FetchCoordinator, FetchOutcome},
    error::FetchError,
    transport::{GeoDataTransport, HttpTransport, TransportResponse},
};

pub use crate::layers::{
    manager::{LayerManager, LayerUpdate},
    session::{LayerSession, SessionPhase},
};

pub use crate::rendering::{
    color::Color,
    palette::{Palette, Theme},
    primitive::{RenderPrimitive, Shape},
    projector::Renderer,
};

pub use crate::runtime::{spawn, TaskHandle};

pub use crate::traits::{CacheStats, Cacheable, ViewportAware};

pub use crate::{Error as MapError, Result};

pub use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;

pub use tokio::time::Instant;
