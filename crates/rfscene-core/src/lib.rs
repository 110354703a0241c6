//! # rfscene core
//!
//! Data model, configuration and spectrum tiling shared by the synthetic RF
//! scenario generator.
//!
//! ## Overview
//!
//! A scenario is a sequence of frames. Each frame places several mobile
//! transmitters and receivers in a simulated environment, assigns every
//! transmitter one or more signal segments, and packs those segments into a
//! shared time-frequency plane before the signal stages run:
//!
//! ```text
//! entities ─► behavior ─► SpectrumTiler ─► message ─► modulate ─► impair ─► channel ─► receive
//! ```
//!
//! This crate holds the pieces that do not depend on the simulator:
//!
//! - **types**: segments, sites, transmitter/receiver bundles, IQ samples
//! - **config**: layered YAML/JSON configuration with tier merging
//! - **tiling**: the time-frequency spectrum tiler
//! - **stages**: collaborator traits of the signal pipeline and the frame annotation
//! - **error**: the scenario error taxonomy
//! - **observe**: `tracing` subscriber setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use rfscene_core::{ModulatorType, SegmentDescriptor, SpectrumTiler};
//! use rand::SeedableRng;
//!
//! let tiler = SpectrumTiler::default();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let segments = vec![
//!     vec![SegmentDescriptor::symmetric(ModulatorType::Qpsk, 1000.0, 8000.0, 0.01)],
//!     vec![SegmentDescriptor::symmetric(ModulatorType::Gmsk, 2000.0, 16000.0, 0.02)],
//! ];
//! let tiling = tiler.tile(&segments, &mut rng).unwrap();
//! println!("occupied band: {:?}", tiling.occupied_band);
//! ```

pub mod config;
pub mod coordinates;
pub mod error;
pub mod observe;
pub mod stages;
pub mod tiling;
pub mod types;

pub use config::{ConfigError, ConfigResult, CountRange, GeneratorConfig};
pub use error::{ScenarioError, ScenarioResult};
pub use observe::{init_logging, LogConfig, LogFormat, LogLevel};
pub use stages::{
    ChannelPropagator, FrameAnnotation, FrameData, FrameStatus, MessageSource, Modulate,
    ModulationRequest, ReceiveProcessor, ReceiverSignal, SegmentPlan, StageError, StageResult,
    TransmitImpairment, Transmission, TransmitterPlan,
};
pub use tiling::{SpectrumTiler, Tiling, TilingConfig, TilingError, TransmitterPlacement};
pub use types::{
    ArrayType, EntityId, FrameId, IQSample, Message, ModulationFamily, ModulatorType,
    PlacedSegment, RxInfo, SegmentDescriptor, SignalSegment, SiteConfig, TxInfo,
};
