use serde::{Deserialize, Serialize};
use std::fmt;

/// Zoom level thresholds separating the five detail buckets.
const BUCKET_THRESHOLDS: [f64; 4] = [14.0, 15.0, 16.0, 17.0];

/// Discretized zoom range (1 = least detail, 5 = most detail).
///
/// Drives both the query side (area caps, feature limits, which tags are
/// requested) and the render side (simplification, which categories draw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoomBucket(u8);

impl ZoomBucket {
    pub const MIN: ZoomBucket = ZoomBucket(1);
    pub const MAX: ZoomBucket = ZoomBucket(5);
    pub const COUNT: usize = 5;

    /// Creates a bucket, clamping into 1..=5
    pub fn new(level: u8) -> Self {
        Self(level.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Maps a continuous zoom value to its bucket
    pub fn from_zoom(zoom: f64) -> Self {
        if !zoom.is_finite() {
            return Self::MIN;
        }
        let level = BUCKET_THRESHOLDS
            .iter()
            .take_while(|threshold| zoom >= **threshold)
            .count() as u8
            + 1;
        Self::new(level)
    }

    /// Bucket number in 1..=5
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Zero-based index for per-bucket lookup tables
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Picks this bucket's entry from a per-bucket table
    pub fn pick<T: Copy>(&self, table: &[T; ZoomBucket::COUNT]) -> T {
        table[self.index()]
    }
}

impl Default for ZoomBucket {
    fn default() -> Self {
        Self::new(3)
    }
}

impl fmt::Display for ZoomBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_thresholds() {
        assert_eq!(ZoomBucket::from_zoom(10.0).level(), 1);
        assert_eq!(ZoomBucket::from_zoom(13.99).level(), 1);
        assert_eq!(ZoomBucket::from_zoom(14.0).level(), 2);
        assert_eq!(ZoomBucket::from_zoom(15.5).level(), 3);
        assert_eq!(ZoomBucket::from_zoom(16.2).level(), 4);
        assert_eq!(ZoomBucket::from_zoom(17.0).level(), 5);
        assert_eq!(ZoomBucket::from_zoom(21.0).level(), 5);
        assert_eq!(ZoomBucket::from_zoom(f64::NAN).level(), 1);
    }

    #[test]
    fn test_bucket_clamps_and_indexes() {
        assert_eq!(ZoomBucket::new(0).level(), 1);
        assert_eq!(ZoomBucket::new(9).level(), 5);
        assert_eq!(ZoomBucket::new(3).index(), 2);
        assert_eq!(ZoomBucket::new(4).pick(&[10, 20, 30, 40, 50]), 40);
        assert_eq!(ZoomBucket::new(5).to_string(), "z5");
    }
}
