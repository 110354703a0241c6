//! Frame generation pipeline

pub mod orchestrator;
pub mod outcome;

pub use orchestrator::{FrameOrchestrator, FrameOutput, ScenarioOutput, Stages};
pub use outcome::{SegmentOutcome, TransmitterOutcome};
