//! Environment configuration
//!
//! Parsed from the `Environment` section. Every field has a default, so a
//! section holding only the entity counts is a valid configuration.

use super::entity::EntityKind;
use super::mobility::MobilityKind;
use super::terrain::Terrain;
use super::weather::WeatherConfig;
use rfscene_core::config::{validate_span, ConfigError, ConfigResult, CountRange};
use rfscene_core::coordinates::MapBounds;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default statistical map boundary `[x_min, x_max, y_min, y_max]`
pub const DEFAULT_BOUNDARIES: [f64; 4] = [-1000.0, 1000.0, -1000.0, 1000.0];

/// Map selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MapConfig {
    /// `[x_min, x_max, y_min, y_max]` in meters
    pub boundaries: Option<[f64; 4]>,
    /// Probability of choosing a geography-backed map
    pub geographic_ratio: f64,
    /// Root of the OSM catalog (`{OsmDirectory}/{Category}/*.osm`)
    pub osm_directory: PathBuf,
    /// Side of the square box around a named location, in km
    pub box_size_km: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            boundaries: None,
            geographic_ratio: 0.0,
            osm_directory: PathBuf::from("appdata/map/osm"),
            box_size_km: 2.0,
        }
    }
}

impl MapConfig {
    pub fn bounds(&self) -> Option<MapBounds> {
        self.boundaries.map(|[x0, x1, y0, y1]| MapBounds::new(x0, x1, y0, y1))
    }
}

/// Obstacle population parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObstacleConfig {
    pub count: CountRange,
    /// Radius range in meters
    pub radius: [f64; 2],
    /// Height range in meters
    pub height: [f64; 2],
    /// Speed range in m/s (dynamic obstacles only)
    pub speed: [f64; 2],
}

impl ObstacleConfig {
    fn static_default() -> Self {
        Self {
            count: CountRange::new(0, 5),
            radius: [5.0, 50.0],
            height: [5.0, 60.0],
            speed: [0.0, 0.0],
        }
    }

    fn dynamic_default() -> Self {
        Self {
            count: CountRange::new(0, 3),
            radius: [2.0, 10.0],
            height: [2.0, 5.0],
            speed: [0.5, 5.0],
        }
    }

    fn validate(&self, name: &str) -> ConfigResult<()> {
        self.count.validate(&format!("{}.Count", name))?;
        validate_span(&format!("{}.Radius", name), self.radius)?;
        validate_span(&format!("{}.Height", name), self.height)?;
        validate_span(&format!("{}.Speed", name), self.speed)?;
        if self.radius[0] < 0.0 || self.speed[0] < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "{}: radius and speed must be non-negative",
                name
            )));
        }
        Ok(())
    }
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self::static_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObstaclesConfig {
    #[serde(rename = "Static")]
    pub static_obstacles: ObstacleConfig,
    #[serde(rename = "Dynamic")]
    pub dynamic_obstacles: ObstacleConfig,
}

impl Default for ObstaclesConfig {
    fn default() -> Self {
        Self {
            static_obstacles: ObstacleConfig::static_default(),
            dynamic_obstacles: ObstacleConfig::dynamic_default(),
        }
    }
}

/// Population parameters of one entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PopulationConfig {
    pub count: CountRange,
    /// Per-component speed bound in m/s; falls back to the kind default
    pub max_speed: Option<f64>,
    /// Mobility models to draw from; falls back to the kind default
    pub mobility: Option<Vec<MobilityKind>>,
    /// Initial altitude range in meters
    pub altitude: [f64; 2],
    pub num_antennas: CountRange,
    /// Transmit power range (transmitters)
    pub power_dbm: [f64; 2],
    /// Antenna gain range (transmitters)
    pub antenna_gain_dbi: [f64; 2],
    /// Noise figure range (receivers)
    pub noise_figure_db: [f64; 2],
    /// Sensitivity range (receivers)
    pub sensitivity_dbm: [f64; 2],
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            count: CountRange::new(1, 1),
            max_speed: None,
            mobility: None,
            altitude: [10.0, 100.0],
            num_antennas: CountRange::new(1, 1),
            power_dbm: [10.0, 30.0],
            antenna_gain_dbi: [0.0, 6.0],
            noise_figure_db: [3.0, 8.0],
            sensitivity_dbm: [-110.0, -90.0],
        }
    }
}

impl PopulationConfig {
    pub fn max_speed_for(&self, kind: EntityKind) -> f64 {
        self.max_speed.unwrap_or_else(|| kind.default_max_speed())
    }

    pub fn mobility_for(&self, kind: EntityKind) -> Vec<MobilityKind> {
        match self.mobility {
            Some(ref kinds) if !kinds.is_empty() => kinds.clone(),
            _ => kind.default_mobility().to_vec(),
        }
    }

    fn validate(&self, name: &str) -> ConfigResult<()> {
        self.count.validate(&format!("{}.Count", name))?;
        self.num_antennas.validate(&format!("{}.NumAntennas", name))?;
        if self.num_antennas.min == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{}.NumAntennas.Min must be at least 1",
                name
            )));
        }
        if let Some(speed) = self.max_speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{}.MaxSpeed must be non-negative, got {}",
                    name, speed
                )));
            }
        }
        validate_span(&format!("{}.Altitude", name), self.altitude)?;
        validate_span(&format!("{}.PowerDbm", name), self.power_dbm)?;
        validate_span(&format!("{}.AntennaGainDbi", name), self.antenna_gain_dbi)?;
        validate_span(&format!("{}.NoiseFigureDb", name), self.noise_figure_db)?;
        validate_span(&format!("{}.SensitivityDbm", name), self.sensitivity_dbm)?;
        Ok(())
    }
}

/// Mobility model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MobilityConfig {
    /// Standard deviation of the random-walk heading change per frame, degrees
    pub turn_sigma_deg: f64,
    /// Distance at which a waypoint counts as reached, meters
    pub arrival_radius: f64,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            turn_sigma_deg: 15.0,
            arrival_radius: 5.0,
        }
    }
}

/// Typed `Environment` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvironmentConfig {
    /// Seconds of simulated time per frame
    pub time_resolution: f64,
    pub map: MapConfig,
    pub terrain: Terrain,
    pub weather: WeatherConfig,
    pub obstacles: ObstaclesConfig,
    pub transmitters: PopulationConfig,
    pub receivers: PopulationConfig,
    pub mobility: MobilityConfig,
    /// Frames of simulator state kept for continuity
    pub history_capacity: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            time_resolution: 1.0,
            map: MapConfig::default(),
            terrain: Terrain::default(),
            weather: WeatherConfig::default(),
            obstacles: ObstaclesConfig::default(),
            transmitters: PopulationConfig {
                count: CountRange::new(1, 3),
                ..Default::default()
            },
            receivers: PopulationConfig::default(),
            mobility: MobilityConfig::default(),
            history_capacity: 10,
        }
    }
}

impl EnvironmentConfig {
    pub fn from_value(value: serde_json::Value) -> ConfigResult<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::ParseError(format!("Environment: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn population(&self, kind: EntityKind) -> &PopulationConfig {
        match kind {
            EntityKind::Transmitter => &self.transmitters,
            EntityKind::Receiver => &self.receivers,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.time_resolution.is_finite() || self.time_resolution <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "Environment.TimeResolution must be > 0, got {}",
                self.time_resolution
            )));
        }
        if !(0.0..=1.0).contains(&self.map.geographic_ratio) {
            return Err(ConfigError::ValidationError(format!(
                "Environment.Map.GeographicRatio must be within [0, 1], got {}",
                self.map.geographic_ratio
            )));
        }
        if self.map.box_size_km <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Environment.Map.BoxSizeKm must be > 0".to_string(),
            ));
        }
        if let Some(bounds) = self.map.bounds() {
            if !bounds.is_valid() {
                return Err(ConfigError::ValidationError(format!(
                    "Environment.Map.Boundaries {:?} is not a valid rectangle",
                    bounds.as_array()
                )));
            }
        }
        if self.history_capacity < 2 {
            return Err(ConfigError::ValidationError(
                "Environment.HistoryCapacity must hold at least 2 frames".to_string(),
            ));
        }
        self.terrain.validate()?;
        self.weather.validate()?;
        self.obstacles.static_obstacles.validate("Environment.Obstacles.Static")?;
        self.obstacles.dynamic_obstacles.validate("Environment.Obstacles.Dynamic")?;
        self.transmitters.validate("Environment.Transmitters")?;
        self.receivers.validate("Environment.Receivers")?;
        if self.mobility.turn_sigma_deg < 0.0 || self.mobility.arrival_radius < 0.0 {
            return Err(ConfigError::ValidationError(
                "Environment.Mobility parameters must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
