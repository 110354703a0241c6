//! Physical environment simulation
//!
//! Models the entities of a scenario and the world they move in: map area,
//! terrain, weather and obstacles. State carries from one frame to the next
//! through a bounded [`FrameHistory`].

pub mod config;
pub mod entity;
pub mod history;
pub mod map;
pub mod mobility;
pub mod obstacles;
pub mod osm;
pub mod simulator;
pub mod terrain;
pub mod weather;

pub use config::EnvironmentConfig;
pub use entity::{Entity, EntityKind, EntityProperties, EntitySnapshot};
pub use history::FrameHistory;
pub use map::{select_map_mode, MapMode};
pub use mobility::{MobilityKind, MobilityModel};
pub use osm::{OsmCatalog, OsmResource};
pub use simulator::{EntitySimulator, EnvironmentSnapshot, FrameState, SimulatorState};
pub use terrain::Terrain;
pub use weather::{Weather, WeatherConfig};
