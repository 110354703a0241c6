//! Entity simulator
//!
//! ```text
//!  Uninitialized ──configure──► MapInitialized ──advance──► Running
//!        ▲                                                   │  ▲
//!        └──────────────────────── reset ────────────────────┘  └─ advance
//! ```
//!
//! Frame `n` continues from the [`FrameState`] stored for frame `n - 1`.
//! When that state is missing (frame 1, or a gap in the frame sequence) the
//! population and the dynamic environment are created from scratch.

use super::config::{EnvironmentConfig, MobilityConfig, PopulationConfig};
use super::entity::{Entity, EntityKind, EntityProperties};
use super::history::FrameHistory;
use super::map::{select_map_mode, MapMode};
use super::mobility::{MobilityKind, MobilityModel};
use super::obstacles::{spawn_dynamic, spawn_static, DynamicObstacle, StaticObstacle};
use super::terrain::Terrain;
use super::weather::Weather;
use rand::rngs::StdRng;
use rand::Rng;
use rfscene_core::config::sample_span;
use rfscene_core::coordinates::{wrap_degrees, MapBounds};
use rfscene_core::error::{ScenarioError, ScenarioResult};
use rfscene_core::types::{EntityId, FrameId};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Minimum height above ground (and above z = 0) in meters
pub const MIN_CLEARANCE_M: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    Uninitialized,
    MapInitialized,
    Running,
}

/// Environment as seen by one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentSnapshot {
    pub map: MapMode,
    pub weather: Weather,
    pub static_obstacles: Vec<StaticObstacle>,
    pub dynamic_obstacles: Vec<DynamicObstacle>,
    #[serde(rename = "FrameID")]
    pub frame_id: FrameId,
    pub time: f64,
}

/// Everything needed to continue the simulation at the next frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub entities: Vec<Entity>,
    pub environment: EnvironmentSnapshot,
    pub time_resolution: f64,
    pub timestamp: f64,
}

pub struct EntitySimulator {
    state: SimulatorState,
    config: EnvironmentConfig,
    rng: StdRng,
    injected_map: Option<MapMode>,
    map: Option<MapMode>,
    static_obstacles: Vec<StaticObstacle>,
    history: FrameHistory<FrameState>,
}

impl EntitySimulator {
    pub fn new(rng: StdRng) -> Self {
        let config = EnvironmentConfig::default();
        let history = FrameHistory::new(config.history_capacity);
        Self {
            state: SimulatorState::Uninitialized,
            config,
            rng,
            injected_map: None,
            map: None,
            static_obstacles: Vec::new(),
            history,
        }
    }

    /// Use `mode` instead of drawing one at the next `configure`
    pub fn inject_map_selection(&mut self, mode: MapMode) {
        self.injected_map = Some(mode);
    }

    /// Validate the configuration, commit the map and build the static
    /// environment.
    pub fn configure(&mut self, config: EnvironmentConfig) -> ScenarioResult<()> {
        config.validate()?;

        let map = match self.injected_map.take() {
            Some(mode) => mode,
            None => select_map_mode(&config.map, &mut self.rng),
        };
        let bounds = *map.bounds();
        self.static_obstacles =
            spawn_static(&config.obstacles.static_obstacles, &bounds, &mut self.rng);
        self.history = FrameHistory::new(config.history_capacity);

        debug!(
            map = map.name(),
            bounds = ?bounds.as_array(),
            static_obstacles = self.static_obstacles.len(),
            "environment configured"
        );

        self.map = Some(map);
        self.config = config;
        self.state = SimulatorState::MapInitialized;
        Ok(())
    }

    /// Advance the simulation to `frame_id`.
    pub fn advance(&mut self, frame_id: FrameId) -> ScenarioResult<(Vec<Entity>, EnvironmentSnapshot)> {
        if self.state == SimulatorState::Uninitialized {
            return Err(ScenarioError::Configuration(
                "entity simulator advanced before it was configured".to_string(),
            ));
        }
        let map = self.map.clone().ok_or_else(|| {
            ScenarioError::Configuration("entity simulator has no committed map".to_string())
        })?;
        let bounds = *map.bounds();
        let dt = self.config.time_resolution;
        let time = frame_id.saturating_sub(1) as f64 * dt;

        let previous = self.history.previous(frame_id).cloned();
        let (entities, weather, dynamic_obstacles) = match previous {
            Some(prev) if frame_id > 1 => {
                let mut entities = prev.entities;
                for entity in entities.iter_mut() {
                    update_entity(
                        entity,
                        dt,
                        &bounds,
                        &self.config.terrain,
                        &self.static_obstacles,
                        &mut self.rng,
                    );
                    entity.record(frame_id, time);
                }

                let mut movers = prev.environment.dynamic_obstacles;
                for obstacle in movers.iter_mut() {
                    obstacle.advance(dt, &bounds);
                }

                let mut weather = prev.environment.weather;
                self.config.weather.evolve(&mut weather, &mut self.rng);
                (entities, weather, movers)
            }
            _ => {
                if frame_id > 1 {
                    warn!(
                        frame_id,
                        error_kind = "TransientStateError",
                        "no state stored for the previous frame, reinitializing entities"
                    );
                }
                let entities = create_population(&self.config, &bounds, frame_id, time, &mut self.rng);
                let movers = spawn_dynamic(&self.config.obstacles.dynamic_obstacles, &bounds, &mut self.rng);
                (entities, self.config.weather.initial_state(), movers)
            }
        };

        let environment = EnvironmentSnapshot {
            map,
            weather,
            static_obstacles: self.static_obstacles.clone(),
            dynamic_obstacles,
            frame_id,
            time,
        };

        trace!(frame_id, entities = entities.len(), time, "frame advanced");

        self.history.insert(
            frame_id,
            FrameState {
                entities: entities.clone(),
                environment: environment.clone(),
                time_resolution: dt,
                timestamp: time,
            },
        );
        self.state = SimulatorState::Running;
        Ok((entities, environment))
    }

    /// State stored for `frame_id - 1`
    pub fn previous_state(&self, frame_id: FrameId) -> Option<&FrameState> {
        self.history.previous(frame_id)
    }

    /// Map mode committed for the current scenario
    pub fn map_selection(&self) -> Option<&MapMode> {
        self.map.as_ref()
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn terrain(&self) -> &Terrain {
        &self.config.terrain
    }

    /// Drop entities, history and environment at the end of a scenario
    pub fn reset(&mut self) {
        self.history.clear();
        self.static_obstacles.clear();
        self.map = None;
        self.injected_map = None;
        self.state = SimulatorState::Uninitialized;
    }
}

fn create_population<R: Rng + ?Sized>(
    config: &EnvironmentConfig,
    bounds: &MapBounds,
    frame_id: FrameId,
    time: f64,
    rng: &mut R,
) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut next_id: EntityId = 1;
    for kind in [EntityKind::Transmitter, EntityKind::Receiver] {
        let population = config.population(kind);
        let count = population.count.sample(rng);
        for _ in 0..count {
            let mut entity = spawn_entity(
                next_id,
                kind,
                population,
                &config.mobility,
                bounds,
                time,
                rng,
            );
            apply_boundaries(&mut entity.position, bounds, &config.terrain);
            entity.record(frame_id, time);
            entities.push(entity);
            next_id += 1;
        }
        debug!(kind = ?kind, count, "created entities");
    }
    entities
}

fn spawn_entity<R: Rng + ?Sized>(
    id: EntityId,
    kind: EntityKind,
    population: &PopulationConfig,
    mobility: &MobilityConfig,
    bounds: &MapBounds,
    time: f64,
    rng: &mut R,
) -> Entity {
    let position = [
        rng.gen_range(bounds.x_min..=bounds.x_max),
        rng.gen_range(bounds.y_min..=bounds.y_max),
        sample_span(population.altitude, rng),
    ];

    let kinds = population.mobility_for(kind);
    let mobility_kind = kinds[rng.gen_range(0..kinds.len())];

    let max_speed = population.max_speed_for(kind);
    let mut velocity = [0.0; 3];
    for component in velocity.iter_mut() {
        *component = sample_span([-max_speed, max_speed], rng);
    }

    let orientation = [rng.gen_range(-180.0..=180.0), rng.gen_range(-30.0..=30.0)];
    let angular_velocity = [rng.gen_range(-10.0..=10.0), rng.gen_range(-1.0..=1.0)];

    let mobility = match mobility_kind {
        MobilityKind::Stationary => MobilityModel::Stationary,
        MobilityKind::RandomWalk => MobilityModel::RandomWalk {
            turn_sigma_deg: mobility.turn_sigma_deg,
        },
        MobilityKind::Waypoint => {
            let horizontal = (velocity[0] * velocity[0] + velocity[1] * velocity[1]).sqrt();
            MobilityModel::Waypoint {
                target: None,
                speed: if horizontal > 0.0 { horizontal } else { max_speed },
                arrival_radius: mobility.arrival_radius,
            }
        }
    };

    let num_antennas = population.num_antennas.sample(rng);
    let properties = match kind {
        EntityKind::Transmitter => EntityProperties::Transmitter {
            power_dbm: sample_span(population.power_dbm, rng),
            num_antennas,
            antenna_gain_dbi: sample_span(population.antenna_gain_dbi, rng),
        },
        EntityKind::Receiver => EntityProperties::Receiver {
            noise_figure_db: sample_span(population.noise_figure_db, rng),
            num_antennas,
            sensitivity_dbm: sample_span(population.sensitivity_dbm, rng),
        },
    };

    Entity {
        id,
        kind,
        position,
        velocity,
        orientation,
        angular_velocity,
        mobility,
        properties,
        state_history: Vec::new(),
        creation_time: time,
        last_update_time: time,
    }
}

/// One frame of motion for a single entity
fn update_entity<R: Rng + ?Sized>(
    entity: &mut Entity,
    dt: f64,
    bounds: &MapBounds,
    terrain: &Terrain,
    obstacles: &[StaticObstacle],
    rng: &mut R,
) {
    let mut position = entity.position;
    for axis in 0..3 {
        position[axis] += entity.velocity[axis] * dt;
    }
    let mut velocity = entity.velocity;
    if let Some((p, v)) = entity.mobility.update(position, velocity, dt, bounds, rng) {
        position = p;
        velocity = v;
    }

    entity.orientation[0] = wrap_degrees(entity.orientation[0] + entity.angular_velocity[0] * dt);
    entity.orientation[1] = (entity.orientation[1] + entity.angular_velocity[1] * dt).clamp(-90.0, 90.0);

    apply_boundaries(&mut position, bounds, terrain);
    resolve_collisions(&position, &mut velocity, obstacles);

    entity.position = position;
    entity.velocity = velocity;
}

/// Keep x/y inside the map and z clear of the ground
pub fn apply_boundaries(position: &mut [f64; 3], bounds: &MapBounds, terrain: &Terrain) {
    let (x, y) = bounds.clamp(position[0], position[1]);
    position[0] = x;
    position[1] = y;
    let ground = terrain.height_at(x, y);
    position[2] = position[2].max(MIN_CLEARANCE_M).max(ground + MIN_CLEARANCE_M);
}

/// Bounce off any static obstacle whose footprint contains the position.
///
/// Returns `true` on collision.
pub fn resolve_collisions(position: &[f64; 3], velocity: &mut [f64; 3], obstacles: &[StaticObstacle]) -> bool {
    if obstacles.iter().any(|o| o.collides(position)) {
        for v in velocity.iter_mut() {
            *v *= -0.5;
        }
        true
    } else {
        false
    }
}
