//! # rfscene-sim
//!
//! Scenario generation on top of `rfscene-core`:
//!
//! - [`environment`]: entities, maps, mobility and weather advanced frame
//!   by frame
//! - [`scenario`]: behavior models and the scenario instantiator that turns
//!   entities into transmitter and receiver plans
//! - [`frame`]: the frame orchestrator driving the signal pipeline
//! - [`reference`]: self-contained pipeline stages
//! - [`runner`]: worker partitioning and annotation output
//!
//! ## Example
//!
//! ```rust,no_run
//! use rand::{rngs::StdRng, SeedableRng};
//! use rfscene_core::GeneratorConfig;
//! use rfscene_sim::frame::FrameOrchestrator;
//!
//! let config = GeneratorConfig::load_named("scenarios").unwrap();
//! let mut rng = StdRng::seed_from_u64(config.seed);
//! let mut orchestrator = FrameOrchestrator::with_reference_stages(config, &mut rng).unwrap();
//! let scenario = orchestrator.generate_scenario(0).unwrap();
//! println!("{} frames", scenario.frames.len());
//! ```

pub mod environment;
pub mod frame;
pub mod reference;
pub mod runner;
pub mod scenario;

pub use frame::{FrameOrchestrator, FrameOutput, ScenarioOutput, Stages};
pub use runner::{run, RunSummary};
pub use scenario::{BehaviorModel, RandomBehavior, ScenarioInstantiator};
