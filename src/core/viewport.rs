use crate::core::{
    bounds::Bounds,
    geo::{BoundingBox, LatLng, Point, METERS_PER_DEGREE},
    zoom::ZoomBucket,
};
use crate::fetch::error::FetchError;
use crate::geometry::projection;
use serde::{Deserialize, Serialize};

/// Pixel size of one Web Mercator tile; fixes the zoom → degrees relation.
const TILE_SIZE: f64 = 256.0;

/// Manages the current view of the map: visible extent, zoom, surface size and tilt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The geographic extent that maps onto the drawing surface
    pub bounds: BoundingBox,
    /// The current (continuous) zoom level
    pub zoom: f64,
    /// The size of the drawing surface in pixels
    pub size: Point,
    /// Strength of elevation, extrusion and shadow effects in [0, 1]
    pub tilt: f64,
}

impl Viewport {
    /// Creates a viewport from an explicit extent
    pub fn new(bounds: BoundingBox, zoom: f64, size: Point) -> Self {
        Self {
            bounds,
            zoom,
            size,
            tilt: 0.0,
        }
    }

    /// Creates a viewport centred on `center`, deriving the extent from the
    /// zoom level the way a slippy map does
    pub fn from_center(center: LatLng, zoom: f64, size: Point) -> Result<Self, FetchError> {
        let world_px = TILE_SIZE * 2_f64.powf(zoom);
        let width_deg = 360.0 * size.x / world_px;
        let lat_scale = LatLng::clamp_lat(center.lat).to_radians().cos().max(1e-6);
        let height_deg = 360.0 * size.y / world_px * lat_scale;
        let bounds = BoundingBox::from_center_size(center, width_deg, height_deg)?;
        Ok(Self::new(bounds, zoom, size))
    }

    /// Returns a copy with the given tilt factor
    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.set_tilt(tilt);
        self
    }

    /// Sets the tilt factor, clamping to [0, 1]
    pub fn set_tilt(&mut self, tilt: f64) {
        self.tilt = if tilt.is_finite() {
            tilt.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Moves the view so it is centred on `center`, keeping its extent
    pub fn set_center(&mut self, center: LatLng) -> Result<(), FetchError> {
        self.bounds = BoundingBox::from_center_size(
            center,
            self.bounds.width_deg(),
            self.bounds.height_deg(),
        )?;
        Ok(())
    }

    pub fn center(&self) -> LatLng {
        self.bounds.center()
    }

    /// Zoom bucket for the current zoom level
    pub fn zoom_bucket(&self) -> ZoomBucket {
        ZoomBucket::from_zoom(self.zoom)
    }

    /// Converts a geographical coordinate to screen pixel coordinates
    pub fn project(&self, lat_lng: &LatLng) -> Point {
        projection::project(lat_lng, &self.bounds, self.size)
    }

    /// Ground metres covered by one vertical screen pixel
    pub fn meters_per_pixel(&self) -> f64 {
        if self.size.y <= 0.0 {
            return 0.0;
        }
        self.bounds.height_deg() * METERS_PER_DEGREE / self.size.y
    }

    /// Converts a ground distance to screen pixels
    pub fn meters_to_pixels(&self, meters: f64) -> f64 {
        let mpp = self.meters_per_pixel();
        if mpp <= 0.0 {
            0.0
        } else {
            meters / mpp
        }
    }

    /// Screen rectangle of the drawing surface
    pub fn surface(&self) -> Bounds {
        Bounds::surface(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_center_is_centred() {
        let center = LatLng::new(52.52, 13.405);
        let viewport = Viewport::from_center(center, 16.0, Point::new(800.0, 600.0)).unwrap();
        let c = viewport.center();
        assert!((c.lat - center.lat).abs() < 1e-9);
        assert!((c.lng - center.lng).abs() < 1e-9);
        assert_eq!(viewport.zoom_bucket().level(), 4);

        let projected = viewport.project(&center);
        assert!((projected.x - 400.0).abs() < 1e-6);
        assert!((projected.y - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_higher_zoom_shrinks_extent() {
        let center = LatLng::new(40.0, -74.0);
        let size = Point::new(512.0, 512.0);
        let wide = Viewport::from_center(center, 14.0, size).unwrap();
        let narrow = Viewport::from_center(center, 15.0, size).unwrap();
        assert!((wide.bounds.width_deg() / narrow.bounds.width_deg() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_tilt_is_clamped() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let viewport = Viewport::new(bounds, 15.0, Point::new(100.0, 100.0)).with_tilt(3.0);
        assert_eq!(viewport.tilt, 1.0);
        let viewport = viewport.with_tilt(f64::NAN);
        assert_eq!(viewport.tilt, 0.0);
    }

    #[test]
    fn test_meters_to_pixels() {
        let bounds = BoundingBox::new(0.0, 0.0, 0.01, 0.01).unwrap();
        let viewport = Viewport::new(bounds, 16.0, Point::new(1000.0, 1000.0));
        // 0.01 degrees of latitude is roughly 1113 m over 1000 px
        assert!((viewport.meters_per_pixel() - 1.113).abs() < 0.01);
        assert!((viewport.meters_to_pixels(11.13) - 10.0).abs() < 0.1);
    }
}
