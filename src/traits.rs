//! Shared trait abstractions for common patterns

use crate::{core::viewport::Viewport, Result};

/// Trait for components that react to viewport changes
pub trait ViewportAware {
    fn on_viewport_changed(&mut self, viewport: &Viewport) -> Result<()>;
}

/// Unified geometry operations trait to eliminate duplicate math implementations
pub trait GeometryOps<T> {
    /// Check if bounds contain a point
    fn contains_point(&self, point: &T) -> bool;

    /// Check if this bounds intersects with another
    fn intersects_bounds(&self, other: &Self) -> bool;

    /// Extend bounds to include a point
    fn extend_with_point(&mut self, point: &T);

    /// Get the center point
    fn center(&self) -> T;

    /// Check if bounds are valid
    fn is_valid(&self) -> bool;

    /// Get the area/size
    fn area(&self) -> f64;
}

/// Trait for cacheable operations
pub trait Cacheable {
    type Key: Clone + Eq + std::hash::Hash;
    type Value: Clone;

    /// Get cached value
    fn get_cached(&self, key: &Self::Key) -> Option<Self::Value>;

    /// Cache a value
    fn cache(&mut self, key: Self::Key, value: Self::Value);

    /// Invalidate cache entry
    fn invalidate(&mut self, key: &Self::Key);

    /// Clear entire cache
    fn clear_cache(&mut self);

    /// Get cache statistics
    fn cache_stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed by pruning
    pub evictions: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
