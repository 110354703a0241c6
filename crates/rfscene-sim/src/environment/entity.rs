//! Simulated transmitters and receivers

use super::mobility::{MobilityKind, MobilityModel};
use rfscene_core::types::{EntityId, FrameId, SiteConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Transmitter,
    Receiver,
}

impl EntityKind {
    /// Speed bound in m/s when the population does not set one
    pub fn default_max_speed(&self) -> f64 {
        match self {
            EntityKind::Transmitter => 10.0,
            EntityKind::Receiver => 2.0,
        }
    }

    pub fn default_mobility(&self) -> &'static [MobilityKind] {
        match self {
            EntityKind::Transmitter => &[
                MobilityKind::RandomWalk,
                MobilityKind::Waypoint,
                MobilityKind::Stationary,
            ],
            EntityKind::Receiver => &[MobilityKind::Stationary],
        }
    }
}

/// Type-specific entity properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EntityProperties {
    #[serde(rename_all = "PascalCase")]
    Transmitter {
        power_dbm: f64,
        num_antennas: usize,
        antenna_gain_dbi: f64,
    },
    #[serde(rename_all = "PascalCase")]
    Receiver {
        noise_figure_db: f64,
        num_antennas: usize,
        sensitivity_dbm: f64,
    },
}

impl EntityProperties {
    pub fn num_antennas(&self) -> usize {
        match self {
            EntityProperties::Transmitter { num_antennas, .. }
            | EntityProperties::Receiver { num_antennas, .. } => *num_antennas,
        }
    }
}

/// Kinematic state of an entity at one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntitySnapshot {
    #[serde(rename = "FrameID")]
    pub frame_id: FrameId,
    pub time: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub orientation: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entity {
    #[serde(rename = "ID")]
    pub id: EntityId,
    pub kind: EntityKind,
    /// `[x, y, z]` in meters
    pub position: [f64; 3],
    /// `[vx, vy, vz]` in m/s
    pub velocity: [f64; 3],
    /// `[azimuth, elevation]` in degrees
    pub orientation: [f64; 2],
    /// `[azimuth rate, elevation rate]` in deg/s
    pub angular_velocity: [f64; 2],
    pub mobility: MobilityModel,
    pub properties: EntityProperties,
    #[serde(skip)]
    pub state_history: Vec<EntitySnapshot>,
    pub creation_time: f64,
    pub last_update_time: f64,
}

impl Entity {
    pub fn is_transmitter(&self) -> bool {
        self.kind == EntityKind::Transmitter
    }

    pub fn is_receiver(&self) -> bool {
        self.kind == EntityKind::Receiver
    }

    pub fn speed(&self) -> f64 {
        self.velocity.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Append the current kinematic state to the history
    pub fn record(&mut self, frame_id: FrameId, time: f64) {
        self.last_update_time = time;
        self.state_history.push(EntitySnapshot {
            frame_id,
            time,
            position: self.position,
            velocity: self.velocity,
            orientation: self.orientation,
        });
    }

    /// Antenna and geometry configuration of this entity
    pub fn site(&self) -> SiteConfig {
        SiteConfig::new(
            self.position,
            self.orientation,
            self.velocity,
            self.properties.num_antennas(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfscene_core::types::ArrayType;

    fn transmitter() -> Entity {
        Entity {
            id: 3,
            kind: EntityKind::Transmitter,
            position: [1.0, 2.0, 30.0],
            velocity: [3.0, 4.0, 0.0],
            orientation: [10.0, 0.0],
            angular_velocity: [0.0, 0.0],
            mobility: MobilityModel::Stationary,
            properties: EntityProperties::Transmitter {
                power_dbm: 20.0,
                num_antennas: 4,
                antenna_gain_dbi: 2.0,
            },
            state_history: Vec::new(),
            creation_time: 0.0,
            last_update_time: 0.0,
        }
    }

    #[test]
    fn test_site_from_entity() {
        let e = transmitter();
        let site = e.site();
        assert_eq!(site.num_antennas, 4);
        assert_eq!(site.array_type, ArrayType::Ura);
        assert_eq!(site.position, [1.0, 2.0, 30.0]);
        assert_eq!(e.speed(), 5.0);
    }

    #[test]
    fn test_record_appends_snapshot() {
        let mut e = transmitter();
        e.record(1, 0.0);
        e.position[0] += 3.0;
        e.record(2, 1.0);
        assert_eq!(e.state_history.len(), 2);
        assert_eq!(e.state_history[1].position[0], 4.0);
        assert_eq!(e.last_update_time, 1.0);
    }
}
