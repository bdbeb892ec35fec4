//! Configuration system for the geodata pipeline
//!
//! This module provides a hierarchical configuration that lets callers tune
//! every stage (network throttling, endpoint rotation, caching, level of
//! detail, viewport sessions and rendering) through presets or custom values.
//! All static lookup tables are carried here as plain values and injected into
//! the components that need them.

use crate::core::{constants, zoom::ZoomBucket};
use crate::data::feature::LayerKind;
use crate::prelude::Duration;
use crate::rendering::palette::Theme;
use crate::MapError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineProfile {
    Balanced,
    /// Fewer, slower requests; friendlier to shared public endpoints
    Conservative,
    /// More features and a larger cache for fast connections
    Detailed,
    Custom(PipelineConfig),
}

impl PipelineProfile {
    pub fn resolve(&self) -> PipelineConfig {
        match self {
            Self::Balanced => PipelineConfig::default(),
            Self::Conservative => {
                let mut config = PipelineConfig::default();
                config.throttle.min_interval_ms = 2_500;
                config.throttle.initial_backoff_ms = 5_000;
                config.throttle.max_backoff_ms = 120_000;
                config.cache.max_entries = 100;
                config.session.debounce_ms = 900;
                config.lod.scale_limits(0.5);
                config
            }
            Self::Detailed => {
                let mut config = PipelineConfig::default();
                config.throttle.min_interval_ms = 600;
                config.cache.max_entries = 400;
                config.session.debounce_ms = 300;
                config.lod.scale_limits(1.5);
                config
            }
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for PipelineProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Top-level configuration for every pipeline stage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub transport: TransportConfig,
    pub endpoints: EndpointConfig,
    pub throttle: ThrottleConfig,
    pub cache: CacheConfig,
    pub lod: LodConfig,
    pub session: SessionConfig,
    pub render: RenderConfig,
}

impl PipelineConfig {
    /// Parses a (possibly partial) JSON configuration; missing fields keep defaults
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Rejects configurations the pipeline cannot operate with
    pub fn validate(&self) -> Result<(), MapError> {
        if self.endpoints.urls.is_empty() {
            return Err(MapError::Config("at least one endpoint URL is required".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(MapError::Config("cache.max_entries must be positive".into()));
        }
        if !(self.cache.prune_fraction > 0.0 && self.cache.prune_fraction <= 1.0) {
            return Err(MapError::Config(format!(
                "cache.prune_fraction must be in (0, 1], got {}",
                self.cache.prune_fraction
            )));
        }
        if self.throttle.initial_backoff_ms > self.throttle.max_backoff_ms {
            return Err(MapError::Config(
                "throttle.initial_backoff_ms exceeds throttle.max_backoff_ms".into(),
            ));
        }
        if self.throttle.max_consecutive_errors == 0 {
            return Err(MapError::Config(
                "throttle.max_consecutive_errors must be positive".into(),
            ));
        }
        let areas = &self.lod.max_query_area_deg2;
        if areas.iter().any(|area| !(area.is_finite() && *area > 0.0)) {
            return Err(MapError::Config("lod.max_query_area_deg2 must be positive".into()));
        }
        if areas.windows(2).any(|pair| pair[1] > pair[0]) {
            return Err(MapError::Config(
                "lod.max_query_area_deg2 must not grow with the zoom bucket".into(),
            ));
        }
        if self.lod.highway_types.len() != ZoomBucket::COUNT {
            return Err(MapError::Config(format!(
                "lod.highway_types needs {} entries",
                ZoomBucket::COUNT
            )));
        }
        Ok(())
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub request_timeout_secs: u64,
    pub query_timeout_secs: u32,
    pub user_agent: String,
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: constants::REQUEST_TIMEOUT_SECS,
            query_timeout_secs: constants::QUERY_TIMEOUT_SECS,
            user_agent: constants::USER_AGENT.to_string(),
        }
    }
}

/// Equivalent upstream endpoints and their health policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub urls: Vec<String>,
    /// Errors after which an endpoint is disabled
    pub error_threshold: u32,
    /// How long a disabled endpoint sits out
    pub cooldown_secs: u64,
}

impl EndpointConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            urls: constants::DEFAULT_ENDPOINTS
                .iter()
                .map(|url| url.to_string())
                .collect(),
            error_threshold: 3,
            cooldown_secs: 300,
        }
    }
}

/// Request pacing, backoff and rate-limit handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub min_interval_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Consecutive failures that trigger endpoint rotation
    pub max_consecutive_errors: u32,
    pub rate_limit_cooldown_secs: u64,
    /// Consecutive successes needed before backoff relaxes one step
    pub successes_before_relax: u32,
    /// Consecutive failures that disable fetching entirely for a while
    pub disable_after_errors: u32,
    pub disabled_timeout_secs: u64,
}

impl ThrottleConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn disabled_timeout(&self) -> Duration {
        Duration::from_secs(self.disabled_timeout_secs)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1_200,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 90_000,
            max_consecutive_errors: 3,
            rate_limit_cooldown_secs: 120,
            successes_before_relax: 3,
            disable_after_errors: 10,
            disabled_timeout_secs: 300,
        }
    }
}

/// Feature cache sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    /// Share of entries (oldest first) removed by one prune cycle
    pub prune_fraction: f64,
    /// Entries older than this are stale; 0 disables expiry
    pub entry_ttl_secs: u64,
    pub key_precision: usize,
}

impl CacheConfig {
    pub fn entry_ttl(&self) -> Option<Duration> {
        if self.entry_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.entry_ttl_secs))
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 200,
            prune_fraction: 0.25,
            entry_ttl_secs: 900,
            key_precision: constants::CACHE_KEY_PRECISION,
        }
    }
}

/// Per-zoom-bucket level-of-detail tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub max_query_area_deg2: [f64; 5],
    pub max_buildings: [usize; 5],
    pub max_roads: [usize; 5],
    pub max_water: [usize; 5],
    pub max_parks: [usize; 5],
    pub max_pois: [usize; 5],
    pub simplify_tolerance_deg: [f64; 5],
    pub min_building_area_m2: [f64; 5],
    /// Building types still fetched at buckets 1 and 2
    pub important_building_types: Vec<String>,
    /// Highway regex alternation per bucket
    pub highway_types: Vec<String>,
    /// Smallest bucket at which trees are requested
    pub trees_from_bucket: u8,
    /// Smallest bucket at which points of interest are requested
    pub pois_from_bucket: u8,
}

impl LodConfig {
    /// Maximum number of features of a layer kept at the given bucket
    pub fn max_features(&self, kind: LayerKind, bucket: ZoomBucket) -> usize {
        let table = match kind {
            LayerKind::Buildings => &self.max_buildings,
            LayerKind::Roads => &self.max_roads,
            LayerKind::Water => &self.max_water,
            LayerKind::Parks => &self.max_parks,
            LayerKind::Pois => &self.max_pois,
        };
        bucket.pick(table)
    }

    pub fn max_query_area(&self, bucket: ZoomBucket) -> f64 {
        bucket.pick(&self.max_query_area_deg2)
    }

    pub fn highway_types(&self, bucket: ZoomBucket) -> &str {
        self.highway_types
            .get(bucket.index())
            .or_else(|| self.highway_types.last())
            .map(String::as_str)
            .unwrap_or("primary")
    }

    pub fn is_important_building(&self, building_type: &str) -> bool {
        self.important_building_types
            .iter()
            .any(|kind| kind == building_type)
    }

    /// Scales every feature limit, used by the presets
    pub fn scale_limits(&mut self, factor: f64) {
        for table in [
            &mut self.max_buildings,
            &mut self.max_roads,
            &mut self.max_water,
            &mut self.max_parks,
            &mut self.max_pois,
        ] {
            for limit in table.iter_mut() {
                *limit = (*limit as f64 * factor).round() as usize;
            }
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            max_query_area_deg2: constants::MAX_QUERY_AREA_DEG2,
            max_buildings: constants::MAX_BUILDINGS,
            max_roads: constants::MAX_ROADS,
            max_water: constants::MAX_WATER,
            max_parks: constants::MAX_PARKS,
            max_pois: constants::MAX_POIS,
            simplify_tolerance_deg: constants::SIMPLIFY_TOLERANCE_DEG,
            min_building_area_m2: constants::MIN_BUILDING_AREA_M2,
            important_building_types: constants::IMPORTANT_BUILDING_TYPES
                .iter()
                .map(|kind| kind.to_string())
                .collect(),
            highway_types: constants::HIGHWAY_TYPES
                .iter()
                .map(|types| types.to_string())
                .collect(),
            trees_from_bucket: 4,
            pois_from_bucket: 3,
        }
    }
}

/// Viewport-driven refresh policy for layer sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub debounce_ms: u64,
    /// Centre movement, as a fraction of the viewport size, still considered "similar"
    pub similarity_threshold: f64,
    /// Zoom change still considered "similar"
    pub zoom_delta_threshold: f64,
    pub layers: Vec<LayerKind>,
    /// Undrained layer updates kept before the oldest is dropped
    pub update_queue_capacity: usize,
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            similarity_threshold: 0.3,
            zoom_delta_threshold: 0.5,
            layers: LayerKind::ALL.to_vec(),
            update_queue_capacity: 64,
        }
    }
}

/// Projection, extrusion and styling knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub theme: Theme,
    /// Extrusion is skipped at or below this tilt
    pub tilt_threshold: f64,
    pub height_scale: f64,
    pub max_height_px: f64,
    /// Shadow length as a fraction of the extrusion height
    pub shadow_length: f64,
    /// Maximum brighten/darken applied by wall lighting
    pub light_strength: f64,
    /// Direction light travels, in screen space (x right, y down)
    pub sun_direction: [f64; 2],
    /// Extra pixel-space RDP tolerance per bucket
    pub screen_simplify_px: [f64; 5],
    pub poi_min_spacing_px: f64,
    pub cull_margin_px: f64,
    pub trees_from_bucket: u8,
    pub pois_from_bucket: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: Theme::Day,
            tilt_threshold: 0.05,
            height_scale: 1.0,
            max_height_px: 400.0,
            shadow_length: 0.6,
            light_strength: 0.25,
            sun_direction: [0.6, 0.8],
            screen_simplify_px: [1.5, 1.0, 0.0, 0.0, 0.0],
            poi_min_spacing_px: 24.0,
            cull_margin_px: 64.0,
            trees_from_bucket: 4,
            pois_from_bucket: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_presets() {
        let balanced = PipelineProfile::Balanced.resolve();
        let conservative = PipelineProfile::Conservative.resolve();
        let detailed = PipelineProfile::Detailed.resolve();

        assert_eq!(balanced, PipelineConfig::default());
        assert!(conservative.throttle.min_interval_ms > balanced.throttle.min_interval_ms);
        assert!(conservative.lod.max_buildings[4] < balanced.lod.max_buildings[4]);
        assert!(detailed.cache.max_entries > balanced.cache.max_entries);
        assert!(detailed.lod.max_roads[0] > balanced.lod.max_roads[0]);

        for config in [balanced, conservative, detailed] {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "throttle": { "min_interval_ms": 50 }, "cache": { "max_entries": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.throttle.min_interval(), Duration::from_millis(50));
        assert_eq!(config.throttle.max_backoff(), Duration::from_secs(90));
        assert_eq!(config.cache.max_entries, 7);
        assert_eq!(config.endpoints.urls.len(), constants::DEFAULT_ENDPOINTS.len());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.endpoints.urls.clear();
        assert!(matches!(config.validate(), Err(MapError::Config(_))));

        let mut config = PipelineConfig::default();
        config.cache.prune_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.lod.max_query_area_deg2 = [0.01, 0.02, 0.01, 0.005, 0.001];
        assert!(config.validate().is_err());

        assert!(matches!(
            PipelineConfig::from_json_str("{ not json"),
            Err(MapError::Serialization(_))
        ));
        assert!(matches!(
            PipelineConfig::from_file("/nonexistent/cityscape.json"),
            Err(MapError::Io(_))
        ));
    }

    #[test]
    fn test_lod_lookups() {
        let lod = LodConfig::default();
        assert_eq!(lod.max_features(LayerKind::Buildings, ZoomBucket::new(5)), 2500);
        assert_eq!(lod.max_features(LayerKind::Pois, ZoomBucket::new(1)), 0);
        assert!(lod.max_query_area(ZoomBucket::new(5)) < 0.01);
        assert!(lod.highway_types(ZoomBucket::new(1)).contains("primary"));
        assert!(!lod.highway_types(ZoomBucket::new(1)).contains("residential"));
        assert!(lod.is_important_building("hospital"));
        assert!(!lod.is_important_building("house"));
    }
}
