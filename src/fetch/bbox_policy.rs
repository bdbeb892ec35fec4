//! Query-region planning.
//!
//! The upstream service rejects requests whose bounding box is too large, and
//! the allowed size shrinks as more detail is requested. This module clips a
//! requested viewport to the per-bucket cap and derives the cache key under
//! which the result is stored.

use crate::core::{
    config::{CacheConfig, LodConfig},
    geo::BoundingBox,
    zoom::ZoomBucket,
};
use crate::data::feature::LayerKind;
use crate::fetch::error::FetchError;

/// Keeps clipped boxes strictly below the cap despite float rounding
const SHRINK_MARGIN: f64 = 1.0 - 1e-9;

/// A region ready to be queried together with its cache key
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub bbox: BoundingBox,
    pub key: String,
    pub bucket: ZoomBucket,
    pub clipped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxPolicy {
    max_area_deg2: [f64; ZoomBucket::COUNT],
    key_precision: usize,
}

impl BoundingBoxPolicy {
    pub fn new(max_area_deg2: [f64; ZoomBucket::COUNT], key_precision: usize) -> Self {
        Self {
            max_area_deg2,
            key_precision,
        }
    }

    pub fn from_config(lod: &LodConfig, cache: &CacheConfig) -> Self {
        Self::new(lod.max_query_area_deg2, cache.key_precision)
    }

    /// Largest area (square degrees) a single query may cover at `bucket`
    pub fn max_area_for(&self, bucket: ZoomBucket) -> f64 {
        bucket.pick(&self.max_area_deg2)
    }

    /// Returns `requested` unchanged when it fits the bucket's cap, otherwise
    /// a box of the same aspect ratio and centre scaled down to the cap
    pub fn safe_query_box(
        &self,
        requested: &BoundingBox,
        bucket: ZoomBucket,
    ) -> Result<BoundingBox, FetchError> {
        // Fields are public, so re-check the ordering invariant
        let requested = BoundingBox::new(
            requested.south,
            requested.west,
            requested.north,
            requested.east,
        )?;

        let max_area = self.max_area_for(bucket);
        let area = requested.area_deg2();
        if area <= max_area {
            return Ok(requested);
        }

        let scale = (max_area / area).sqrt() * SHRINK_MARGIN;
        BoundingBox::from_center_size(
            requested.center(),
            requested.width_deg() * scale,
            requested.height_deg() * scale,
        )
    }

    /// Cache key: layer, quantized bounds and bucket
    pub fn cache_key(&self, kind: LayerKind, bbox: &BoundingBox, bucket: ZoomBucket) -> String {
        format!(
            "{}:{}:{}",
            kind.as_str(),
            bbox.quantized_key(self.key_precision),
            bucket
        )
    }

    /// Clips the request and derives its key in one step
    pub fn plan(
        &self,
        kind: LayerKind,
        requested: &BoundingBox,
        bucket: ZoomBucket,
    ) -> Result<QueryPlan, FetchError> {
        let bbox = self.safe_query_box(requested, bucket)?;
        let clipped = bbox != *requested;
        if clipped {
            log::debug!(
                "clipped {} query from {:.5} to {:.5} deg² at {}",
                kind.as_str(),
                requested.area_deg2(),
                bbox.area_deg2(),
                bucket
            );
        }
        Ok(QueryPlan {
            key: self.cache_key(kind, &bbox, bucket),
            bbox,
            bucket,
            clipped,
        })
    }
}

impl Default for BoundingBoxPolicy {
    fn default() -> Self {
        Self::from_config(&LodConfig::default(), &CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_viewport_is_clipped_around_center() {
        let policy = BoundingBoxPolicy::default();
        let requested = BoundingBox::new(52.45, 13.35, 52.55, 13.45).unwrap();
        let bucket = ZoomBucket::new(5);

        let safe = policy.safe_query_box(&requested, bucket).unwrap();
        assert!(safe.area_deg2() <= policy.max_area_for(bucket));
        assert!((safe.area_deg2() - 0.0025).abs() < 1e-6);
        let (c0, c1) = (requested.center(), safe.center());
        assert!((c0.lat - c1.lat).abs() < 1e-12);
        assert!((c0.lng - c1.lng).abs() < 1e-12);
        // Square in, square out
        assert!((safe.width_deg() - safe.height_deg()).abs() < 1e-9);
    }

    #[test]
    fn test_small_viewport_is_unchanged() {
        let policy = BoundingBoxPolicy::default();
        let requested = BoundingBox::new(52.50, 13.40, 52.51, 13.41).unwrap();
        let plan = policy
            .plan(LayerKind::Buildings, &requested, ZoomBucket::new(3))
            .unwrap();
        assert_eq!(plan.bbox, requested);
        assert!(!plan.clipped);
    }

    #[test]
    fn test_cap_holds_for_every_bucket_and_shape() {
        let policy = BoundingBoxPolicy::default();
        for level in 1..=5 {
            let bucket = ZoomBucket::new(level);
            for (w, h) in [(1.0, 1.0), (0.5, 0.01), (0.01, 0.9), (0.3, 0.2)] {
                let requested = BoundingBox::new(10.0, 20.0, 10.0 + h, 20.0 + w).unwrap();
                let safe = policy.safe_query_box(&requested, bucket).unwrap();
                assert!(safe.area_deg2() <= policy.max_area_for(bucket));
                assert!(requested.contains(&safe.center()));
            }
        }
    }

    #[test]
    fn test_inverted_bounds_fail_closed() {
        let policy = BoundingBoxPolicy::default();
        let inverted = BoundingBox {
            south: 1.0,
            west: 0.0,
            north: 0.0,
            east: 1.0,
        };
        assert!(matches!(
            policy.safe_query_box(&inverted, ZoomBucket::new(3)),
            Err(FetchError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_cache_key_shape() {
        let policy = BoundingBoxPolicy::default();
        let a = BoundingBox::new(52.50001, 13.40001, 52.51001, 13.41001).unwrap();
        let b = BoundingBox::new(52.49999, 13.39999, 52.50999, 13.40999).unwrap();
        let bucket = ZoomBucket::new(4);
        let key = policy.cache_key(LayerKind::Roads, &a, bucket);
        assert_eq!(key, "roads:52.500,13.400,52.510,13.410:z4");
        assert_eq!(key, policy.cache_key(LayerKind::Roads, &b, bucket));
        assert_ne!(key, policy.cache_key(LayerKind::Water, &a, bucket));
        assert_ne!(key, policy.cache_key(LayerKind::Roads, &a, ZoomBucket::new(5)));
    }
}
