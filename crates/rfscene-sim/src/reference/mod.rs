//! Reference pipeline stages
//!
//! Self-contained implementations of every stage trait, enough to generate
//! complete frames without external signal tooling.

pub mod channel;
pub mod impairments;
pub mod message;
pub mod modulator;
pub mod receiver;

pub use channel::{ChannelConfig, FreeSpaceChannel};
pub use impairments::{HardwareImpairments, ImpairmentConfig};
pub use message::RandomMessageSource;
pub use modulator::BasebandModulator;
pub use receiver::{EnergyReceiver, ReceiverConfig};
