//! Scenario instantiation and communication behavior

pub mod behavior;
pub mod instantiator;

pub use behavior::{BehaviorConfig, BehaviorModel, BehaviorOutput, Layout, RandomBehavior};
pub use instantiator::{Instantiation, ScenarioInstantiator, INSTANTIATION_HISTORY};
