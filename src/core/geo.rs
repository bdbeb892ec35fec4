use crate::fetch::error::FetchError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean earth radius used for distance and metres-per-degree math
pub const EARTH_RADIUS: f64 = 6378137.0;
const MAX_LATITUDE: f64 = 85.0511287798;

/// Metres spanned by one degree of latitude
pub const METERS_PER_DEGREE: f64 = 2.0 * PI * EARTH_RADIUS / 360.0;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Calculates the distance to another LatLng using the Haversine formula
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS * c
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Approximate planar equality, used when checking ring closure
    pub fn approx_eq(&self, other: &LatLng) -> bool {
        (self.lat - other.lat).abs() < 1e-12 && (self.lng - other.lng).abs() < 1e-12
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen (pixel) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn approx_eq(&self, other: &Point) -> bool {
        (self.x - other.x).abs() < 1e-9 && (self.y - other.y).abs() < 1e-9
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// A geographic bounding box in degrees.
///
/// Always satisfies `south <= north` and `west <= east`; the only way to
/// build one from raw numbers is [`BoundingBox::new`], which fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Creates a bounding box, rejecting inverted or non-finite bounds
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, FetchError> {
        let finite = south.is_finite() && west.is_finite() && north.is_finite() && east.is_finite();
        if !finite || south > north || west > east {
            return Err(FetchError::InvalidBounds {
                south,
                west,
                north,
                east,
            });
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Creates a box of the given size (degrees) centred on `center`
    pub fn from_center_size(
        center: LatLng,
        width_deg: f64,
        height_deg: f64,
    ) -> Result<Self, FetchError> {
        let half_w = width_deg.abs() / 2.0;
        let half_h = height_deg.abs() / 2.0;
        Self::new(
            center.lat - half_h,
            center.lng - half_w,
            center.lat + half_h,
            center.lng + half_w,
        )
    }

    /// Smallest box containing every point, `None` for an empty slice
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for point in &points[1..] {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn south_west(&self) -> LatLng {
        LatLng::new(self.south, self.west)
    }

    pub fn north_east(&self) -> LatLng {
        LatLng::new(self.north, self.east)
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// East-west extent in degrees
    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    /// North-south extent in degrees
    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// Area in square degrees
    pub fn area_deg2(&self) -> f64 {
        self.width_deg() * self.height_deg()
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }

    /// Checks if the bounds intersect with another bounds
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.north < self.south
            || other.south > self.north
            || other.east < self.west
            || other.west > self.east)
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &LatLng) {
        self.south = self.south.min(point.lat);
        self.west = self.west.min(point.lng);
        self.north = self.north.max(point.lat);
        self.east = self.east.max(point.lng);
    }

    /// Copy grown to cover `point`
    pub fn expand_to_include(&self, point: &LatLng) -> BoundingBox {
        let mut expanded = *self;
        expanded.extend(point);
        expanded
    }

    /// Returns the union of this bounds with another bounds
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    /// Rounds each bound to `precision` decimal places, producing a stable
    /// string so near-identical boxes collapse to the same key
    pub fn quantized_key(&self, precision: usize) -> String {
        format!(
            "{:.p$},{:.p$},{:.p$},{:.p$}",
            quantize(self.south, precision),
            quantize(self.west, precision),
            quantize(self.north, precision),
            quantize(self.east, precision),
            p = precision
        )
    }

    /// Overpass bbox filter order: south,west,north,east
    pub fn to_query_filter(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.south, self.west, self.north, self.east
        )
    }
}

fn quantize(value: f64, precision: usize) -> f64 {
    let factor = 10_f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // Avoid "-0.000" and "0.000" producing different keys
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(40.7128, -74.0060);
        assert_eq!(coord.lat, 40.7128);
        assert_eq!(coord.lng, -74.0060);
        assert!(coord.is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_lat_lng_distance() {
        let nyc = LatLng::new(40.7128, -74.0060);
        let la = LatLng::new(34.0522, -118.2437);
        let distance = nyc.distance_to(&la);

        // Distance should be approximately 3944 km
        assert!((distance - 3944000.0).abs() < 10000.0);
    }

    #[test]
    fn test_bounding_box_rejects_inverted_bounds() {
        assert!(matches!(
            BoundingBox::new(41.0, -74.0, 40.0, -73.0),
            Err(FetchError::InvalidBounds { .. })
        ));
        assert!(BoundingBox::new(40.0, -73.0, 41.0, -74.0).is_err());
        assert!(BoundingBox::new(f64::NAN, -74.0, 41.0, -73.0).is_err());
        assert!(BoundingBox::new(40.0, -74.0, 40.0, -74.0).is_ok());
    }

    #[test]
    fn test_bounds_contains_and_center() {
        let bounds = BoundingBox::new(40.0, -75.0, 41.0, -73.0).unwrap();
        assert!(bounds.contains(&LatLng::new(40.5, -74.0)));
        assert!(!bounds.contains(&LatLng::new(42.0, -74.0)));
        assert_eq!(bounds.center(), LatLng::new(40.5, -74.0));
        assert!((bounds.area_deg2() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantized_key_collapses_nearby_boxes() {
        let a = BoundingBox::new(52.51001, 13.38002, 52.52004, 13.39001).unwrap();
        let b = BoundingBox::new(52.50996, 13.37998, 52.51996, 13.38996).unwrap();
        assert_eq!(a.quantized_key(3), b.quantized_key(3));
        assert_eq!(a.quantized_key(3), "52.510,13.380,52.520,13.390");

        let c = BoundingBox::new(-0.0001, -0.0001, 0.0001, 0.0001).unwrap();
        assert_eq!(c.quantized_key(3), "0.000,0.000,0.000,0.000");
    }

    #[test]
    fn test_from_points_and_union() {
        let points = [
            LatLng::new(1.0, 2.0),
            LatLng::new(-1.0, 5.0),
            LatLng::new(0.5, -3.0),
        ];
        let bounds = BoundingBox::from_points(&points).unwrap();
        assert_eq!(bounds.south, -1.0);
        assert_eq!(bounds.north, 1.0);
        assert_eq!(bounds.west, -3.0);
        assert_eq!(bounds.east, 5.0);
        assert!(BoundingBox::from_points(&[]).is_none());

        let other = BoundingBox::new(2.0, 2.0, 3.0, 3.0).unwrap();
        let union = bounds.union(&other);
        assert_eq!(union.north, 3.0);
        assert!(!bounds.intersects(&other));

        let grown = bounds.expand_to_include(&LatLng::new(4.0, 0.0));
        assert_eq!(grown.north, 4.0);
        assert_eq!(bounds.north, 1.0);
    }
}
