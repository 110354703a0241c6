//! Scenario instantiation
//!
//! Turns the physical state of a frame into transmitter and receiver
//! bundles. The entity simulator and the behavior model are built lazily on
//! the first frame of a scenario from the merged configuration tiers.

use super::behavior::{BehaviorConfig, BehaviorModel, Layout};
use crate::environment::{select_map_mode, EntitySimulator, EnvironmentConfig, FrameHistory, MapMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rfscene_core::config::{sections, GeneratorConfig};
use rfscene_core::error::{ScenarioError, ScenarioResult};
use rfscene_core::stages::TransmitterPlan;
use rfscene_core::types::{FrameId, RxInfo};
use serde_json::{json, Value};
use tracing::{debug, error, info};

/// Frames of composite state kept per scenario
pub const INSTANTIATION_HISTORY: usize = 10;

/// Transmitters, receivers and layout of one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instantiation {
    pub transmitters: Vec<TransmitterPlan>,
    pub receivers: Vec<RxInfo>,
    pub layout: Layout,
}

impl Instantiation {
    /// Empty result carrying the failure in its layout
    pub fn failed(frame_id: FrameId, reason: impl Into<String>) -> Self {
        Self {
            transmitters: Vec::new(),
            receivers: Vec::new(),
            layout: Layout {
                frame_id,
                error: Some(reason.into()),
                ..Default::default()
            },
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.layout.error.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.transmitters.is_empty() && self.receivers.is_empty()
    }
}

pub struct ScenarioInstantiator {
    config: GeneratorConfig,
    behavior: Box<dyn BehaviorModel>,
    rng: StdRng,
    simulator: Option<EntitySimulator>,
    behavior_config: Option<BehaviorConfig>,
    map_selection: Option<MapMode>,
    history: FrameHistory<Instantiation>,
    scenario_id: Option<u64>,
}

impl ScenarioInstantiator {
    pub fn new(config: GeneratorConfig, behavior: Box<dyn BehaviorModel>, rng: StdRng) -> Self {
        Self {
            config,
            behavior,
            rng,
            simulator: None,
            behavior_config: None,
            map_selection: None,
            history: FrameHistory::new(INSTANTIATION_HISTORY),
            scenario_id: None,
        }
    }

    /// Replace the configuration; components are rebuilt on the next frame.
    pub fn configure(&mut self, config: GeneratorConfig) {
        self.config = config;
        self.simulator = None;
        self.behavior_config = None;
    }

    /// Drop all per-scenario state and begin scenario `scenario_id`.
    pub fn start_scenario(&mut self, scenario_id: u64) {
        self.scenario_id = Some(scenario_id);
        self.simulator = None;
        self.behavior_config = None;
        self.map_selection = None;
        self.history.clear();
    }

    pub fn scenario_id(&self) -> Option<u64> {
        self.scenario_id
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Map mode committed for the current scenario
    pub fn map_selection(&self) -> Option<&MapMode> {
        self.map_selection.as_ref()
    }

    /// Composite state recorded for `frame_id`
    pub fn recorded(&self, frame_id: FrameId) -> Option<&Instantiation> {
        self.history.get(frame_id)
    }

    /// Instantiate `frame_id`. Failures come back as an empty result whose
    /// layout carries the error text.
    pub fn instantiate(&mut self, frame_id: FrameId) -> Instantiation {
        match self.try_instantiate(frame_id) {
            Ok(instantiation) => {
                self.history.insert(frame_id, instantiation.clone());
                instantiation
            }
            Err(e) => {
                error!(
                    frame_id,
                    scenario_id = ?self.scenario_id,
                    error_kind = e.kind(),
                    error = %e,
                    "scenario instantiation failed"
                );
                Instantiation::failed(frame_id, e.to_string())
            }
        }
    }

    fn try_instantiate(&mut self, frame_id: FrameId) -> ScenarioResult<Instantiation> {
        if self.simulator.is_none() || self.behavior_config.is_none() {
            self.initialize()?;
        }

        let (Some(simulator), Some(behavior_config)) =
            (self.simulator.as_mut(), self.behavior_config.as_ref())
        else {
            return Err(ScenarioError::Configuration(
                "scenario components are not initialized".to_string(),
            ));
        };

        let (entities, environment) = simulator.advance(frame_id)?;
        let output = self.behavior.advance(frame_id, &entities, behavior_config)?;

        let mut layout = output.layout;
        layout.frame_id = frame_id;
        layout.environment = Some(environment);

        debug!(
            frame_id,
            entities = entities.len(),
            transmitters = output.transmitters.len(),
            receivers = output.receivers.len(),
            "frame instantiated"
        );

        Ok(Instantiation {
            transmitters: output.transmitters,
            receivers: output.receivers,
            layout,
        })
    }

    fn initialize(&mut self) -> ScenarioResult<()> {
        let environment = EnvironmentConfig::from_value(section_or_empty(
            &self.config,
            sections::ENVIRONMENT,
        ))?;
        let behavior_config =
            BehaviorConfig::from_value(section_or_empty(&self.config, sections::BEHAVIOR))?;

        let map = match self.map_selection {
            Some(ref mode) => mode.clone(),
            None => {
                let mode = select_map_mode(&environment.map, &mut self.rng);
                self.map_selection = Some(mode.clone());
                mode
            }
        };

        let mut simulator = EntitySimulator::new(StdRng::seed_from_u64(self.rng.gen()));
        simulator.inject_map_selection(map.clone());
        simulator.configure(environment)?;
        self.behavior.configure(&behavior_config)?;

        info!(
            scenario_id = ?self.scenario_id,
            map = map.name(),
            "scenario components initialized"
        );

        self.simulator = Some(simulator);
        self.behavior_config = Some(behavior_config);
        Ok(())
    }
}

fn section_or_empty(config: &GeneratorConfig, name: &str) -> Value {
    config.section_value(name).unwrap_or_else(|| json!({}))
}
