//! Geodetic helpers and local map geometry
//!
//! Geography-backed maps are square boxes centred on a named coordinate;
//! simulation itself runs in a local metric frame (x east, y north, z up)
//! whose origin is the box centre.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Latitude/longitude bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeoBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBox {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// East-west and north-south extent in meters (spherical Earth)
    pub fn extent_m(&self) -> (f64, f64) {
        let (lat, _) = self.center();
        let m_per_deg = EARTH_RADIUS_KM * 1000.0 * PI / 180.0;
        let width = (self.max_lon - self.min_lon).abs() * m_per_deg * lat.to_radians().cos();
        let height = (self.max_lat - self.min_lat).abs() * m_per_deg;
        (width, height)
    }

    pub fn is_valid(&self) -> bool {
        self.min_lat.is_finite()
            && self.max_lat.is_finite()
            && self.min_lon.is_finite()
            && self.max_lon.is_finite()
            && self.min_lat < self.max_lat
            && self.min_lon < self.max_lon
    }
}

/// Approximate square bounding box of side `size_km` centred at a point.
///
/// Longitude accuracy degrades at high latitude. When the parallel radius
/// drops below 0.1 km (the poles) the 1° parallel is used instead.
pub fn bounding_box(lat_deg: f64, lon_deg: f64, size_km: f64) -> GeoBox {
    let half = size_km / 2.0;
    let delta_lat = (half / EARTH_RADIUS_KM).to_degrees();

    let parallel_radius_km = EARTH_RADIUS_KM * lat_deg.to_radians().cos();
    let delta_lon = if parallel_radius_km < 0.1 {
        (half / (EARTH_RADIUS_KM * 1.0_f64.to_radians().cos())).to_degrees()
    } else {
        (half / parallel_radius_km).to_degrees()
    };

    GeoBox {
        min_lat: lat_deg - delta_lat,
        min_lon: lon_deg - delta_lon,
        max_lat: lat_deg + delta_lat,
        max_lon: lon_deg + delta_lon,
    }
}

/// Rectangular map boundaries `[x_min, x_max, y_min, y_max]` in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl MapBounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    /// Bounds of a box with the given extent centred on the origin
    pub fn centered(width_m: f64, height_m: f64) -> Self {
        Self::new(-width_m / 2.0, width_m / 2.0, -height_m / 2.0, height_m / 2.0)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn is_valid(&self) -> bool {
        [self.x_min, self.x_max, self.y_min, self.y_max]
            .iter()
            .all(|v| v.is_finite())
            && self.x_min < self.x_max
            && self.y_min < self.y_max
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// Clamp a horizontal position into the bounds
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.clamp(self.x_min, self.x_max), y.clamp(self.y_min, self.y_max))
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x_min, self.x_max, self.y_min, self.y_max]
    }
}

/// Horizontal (x/y) distance between two points
pub fn horizontal_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Wrap an angle in degrees to `[-180, 180]`
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && angle > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Free-space path loss in dB
pub fn fspl_db(distance_m: f64, frequency_hz: f64) -> f64 {
    if distance_m <= 0.0 || frequency_hz <= 0.0 {
        return 0.0;
    }
    20.0 * (4.0 * PI * distance_m * frequency_hz / SPEED_OF_LIGHT).log10()
}
