//! Core types shared by the scenario pipeline
//!
//! Signal segments travel through the pipeline in three shapes:
//!
//! ```text
//! SegmentDescriptor ──tile──► PlacedSegment ──modulate──► SignalSegment
//!  (bandwidth only)          (carrier + start time)       (IQ streams)
//! ```
//!
//! Field names of the serialized forms are part of the annotation format
//! consumed by downstream dataset tooling, so they use the PascalCase keys
//! (`BandWidth`, `CarrierFrequency`, ...) rather than Rust field names.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single I/Q sample point
pub type IQSample = Complex64;

/// Identifier of a simulated entity (transmitter or receiver)
pub type EntityId = u32;

/// Frame identifier, 1-based within a scenario
pub type FrameId = u64;

/// Broad modulation family, used to pick frequency granularities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModulationFamily {
    /// Linear single-carrier keying (ASK, PSK, QAM, APSK, FSK)
    SingleCarrier,
    /// Constant-envelope continuous-phase schemes (MSK, GMSK, GFSK, CPFSK)
    ContinuousPhase,
    /// Multicarrier schemes (OFDM)
    Multicarrier,
}

/// Modulation schemes known to the scenario generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModulatorType {
    #[serde(rename = "OOK")]
    Ook,
    #[serde(rename = "4ASK")]
    Ask4,
    #[serde(rename = "BPSK")]
    Bpsk,
    #[serde(rename = "QPSK")]
    Qpsk,
    #[serde(rename = "8PSK")]
    Psk8,
    #[serde(rename = "16QAM")]
    Qam16,
    #[serde(rename = "64QAM")]
    Qam64,
    #[serde(rename = "16APSK")]
    Apsk16,
    #[serde(rename = "2FSK")]
    Fsk2,
    #[serde(rename = "4FSK")]
    Fsk4,
    #[serde(rename = "MSK")]
    Msk,
    #[serde(rename = "GMSK")]
    Gmsk,
    #[serde(rename = "GFSK")]
    Gfsk,
    #[serde(rename = "CPFSK")]
    Cpfsk,
    #[serde(rename = "OFDM")]
    Ofdm,
}

impl ModulatorType {
    /// All supported modulators, in a stable order
    pub const ALL: [ModulatorType; 15] = [
        ModulatorType::Ook,
        ModulatorType::Ask4,
        ModulatorType::Bpsk,
        ModulatorType::Qpsk,
        ModulatorType::Psk8,
        ModulatorType::Qam16,
        ModulatorType::Qam64,
        ModulatorType::Apsk16,
        ModulatorType::Fsk2,
        ModulatorType::Fsk4,
        ModulatorType::Msk,
        ModulatorType::Gmsk,
        ModulatorType::Gfsk,
        ModulatorType::Cpfsk,
        ModulatorType::Ofdm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModulatorType::Ook => "OOK",
            ModulatorType::Ask4 => "4ASK",
            ModulatorType::Bpsk => "BPSK",
            ModulatorType::Qpsk => "QPSK",
            ModulatorType::Psk8 => "8PSK",
            ModulatorType::Qam16 => "16QAM",
            ModulatorType::Qam64 => "64QAM",
            ModulatorType::Apsk16 => "16APSK",
            ModulatorType::Fsk2 => "2FSK",
            ModulatorType::Fsk4 => "4FSK",
            ModulatorType::Msk => "MSK",
            ModulatorType::Gmsk => "GMSK",
            ModulatorType::Gfsk => "GFSK",
            ModulatorType::Cpfsk => "CPFSK",
            ModulatorType::Ofdm => "OFDM",
        }
    }

    pub fn family(&self) -> ModulationFamily {
        match self {
            ModulatorType::Ofdm => ModulationFamily::Multicarrier,
            ModulatorType::Msk
            | ModulatorType::Gmsk
            | ModulatorType::Gfsk
            | ModulatorType::Cpfsk => ModulationFamily::ContinuousPhase,
            _ => ModulationFamily::SingleCarrier,
        }
    }

    /// Bits carried by one symbol
    pub fn bits_per_symbol(&self) -> usize {
        match self {
            ModulatorType::Ook
            | ModulatorType::Bpsk
            | ModulatorType::Fsk2
            | ModulatorType::Msk
            | ModulatorType::Gmsk
            | ModulatorType::Gfsk
            | ModulatorType::Cpfsk => 1,
            ModulatorType::Ask4 | ModulatorType::Qpsk | ModulatorType::Fsk4 | ModulatorType::Ofdm => 2,
            ModulatorType::Psk8 => 3,
            ModulatorType::Qam16 | ModulatorType::Apsk16 => 4,
            ModulatorType::Qam64 => 6,
        }
    }

    /// Frequency granularity in Hz used when placing this modulation in the
    /// shared spectrum: kHz steps for multicarrier and continuous-phase
    /// schemes, 100 Hz steps otherwise.
    pub fn tiling_granularity_hz(&self) -> f64 {
        match self.family() {
            ModulationFamily::Multicarrier | ModulationFamily::ContinuousPhase => 1_000.0,
            ModulationFamily::SingleCarrier => 100.0,
        }
    }

    /// Approximate two-sided occupied bandwidth in Hz for a symbol rate
    pub fn occupied_bandwidth(&self, symbol_rate: f64) -> f64 {
        let factor = match self {
            // Rectangular keying with 0.35 roll-off equivalent
            ModulatorType::Ook
            | ModulatorType::Ask4
            | ModulatorType::Bpsk
            | ModulatorType::Qpsk
            | ModulatorType::Psk8
            | ModulatorType::Qam16
            | ModulatorType::Qam64
            | ModulatorType::Apsk16 => 1.35,
            // Carson: 2 * deviation + Rs, deviation = Rs / 2 per tone step
            ModulatorType::Fsk2 => 2.0,
            ModulatorType::Fsk4 => 4.0,
            ModulatorType::Msk | ModulatorType::Cpfsk => 1.5,
            ModulatorType::Gmsk | ModulatorType::Gfsk => 1.2,
            ModulatorType::Ofdm => 1.1,
        };
        factor * symbol_rate
    }
}

impl fmt::Display for ModulatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModulatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModulatorType::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown modulator type '{}'", s))
    }
}

/// Bandwidth descriptor of one signal segment, before placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// Baseband band edges `[lower, upper]` in Hz, relative to the carrier
    #[serde(rename = "BandWidth")]
    pub bandwidth: [f64; 2],
    #[serde(rename = "ModulatorType")]
    pub modulator: ModulatorType,
    #[serde(rename = "SampleRate")]
    pub sample_rate: f64,
    /// Segment duration in seconds
    #[serde(rename = "TimeDuration")]
    pub duration: f64,
}

impl SegmentDescriptor {
    /// Symmetric descriptor of `bandwidth_hz` around the carrier
    pub fn symmetric(modulator: ModulatorType, bandwidth_hz: f64, sample_rate: f64, duration: f64) -> Self {
        Self {
            bandwidth: [-bandwidth_hz / 2.0, bandwidth_hz / 2.0],
            modulator,
            sample_rate,
            duration,
        }
    }

    pub fn lower(&self) -> f64 {
        self.bandwidth[0]
    }

    pub fn upper(&self) -> f64 {
        self.bandwidth[1]
    }

    pub fn width(&self) -> f64 {
        self.bandwidth[1] - self.bandwidth[0]
    }
}

/// A segment after time-frequency tiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedSegment {
    #[serde(flatten)]
    pub descriptor: SegmentDescriptor,
    /// Start time within the frame, seconds
    #[serde(rename = "StartTime")]
    pub start_time: f64,
    #[serde(rename = "CarrierFrequency")]
    pub carrier_frequency: f64,
    /// Declared bandwidth of the owning transmitter
    #[serde(rename = "EnvelopeBandWidth")]
    pub envelope_bandwidth: f64,
    /// Common sample rate of the owning transmitter
    #[serde(rename = "EnvelopeSampleRate")]
    pub envelope_sample_rate: f64,
}

impl PlacedSegment {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.descriptor.duration
    }
}

/// Antenna array geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayType {
    Isotropic,
    #[serde(rename = "ULA")]
    Ula,
    #[serde(rename = "URA")]
    Ura,
}

impl ArrayType {
    /// Array type implied by an antenna count: one element is isotropic,
    /// an even count above two forms a rectangular array, anything else a
    /// linear array.
    pub fn for_antennas(num_antennas: usize) -> Self {
        if num_antennas <= 1 {
            ArrayType::Isotropic
        } else if num_antennas > 2 && num_antennas % 2 == 0 {
            ArrayType::Ura
        } else {
            ArrayType::Ula
        }
    }

    /// Element layout `(rows, columns)` for the given antenna count
    pub fn layout(&self, num_antennas: usize) -> (usize, usize) {
        match self {
            ArrayType::Isotropic => (1, 1),
            ArrayType::Ula => (1, num_antennas.max(1)),
            ArrayType::Ura => (2, (num_antennas / 2).max(1)),
        }
    }
}

/// Antenna and geometry configuration of a transmitter or receiver site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteConfig {
    /// Position `[x, y, z]` in meters
    pub position: [f64; 3],
    /// `[azimuth, elevation]` in degrees
    pub orientation: [f64; 2],
    pub velocity: [f64; 3],
    pub num_antennas: usize,
    pub array_type: ArrayType,
    /// Element spacing in wavelengths
    pub element_spacing: f64,
}

impl SiteConfig {
    pub fn new(position: [f64; 3], orientation: [f64; 2], velocity: [f64; 3], num_antennas: usize) -> Self {
        let num_antennas = num_antennas.max(1);
        Self {
            position,
            orientation,
            velocity,
            num_antennas,
            array_type: ArrayType::for_antennas(num_antennas),
            element_spacing: 0.5,
        }
    }

    /// Update the antenna count, recomputing the array type
    pub fn set_num_antennas(&mut self, num_antennas: usize) {
        self.num_antennas = num_antennas.max(1);
        self.array_type = ArrayType::for_antennas(self.num_antennas);
    }

    pub fn distance_to(&self, other: &SiteConfig) -> f64 {
        let dx = self.position[0] - other.position[0];
        let dy = self.position[1] - other.position[1];
        let dz = self.position[2] - other.position[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Per-transmitter configuration bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxInfo {
    #[serde(rename = "ID")]
    pub id: EntityId,
    pub site: SiteConfig,
    pub carrier_frequency: f64,
    /// Declared bandwidth in Hz
    #[serde(rename = "BandWidth")]
    pub bandwidth: f64,
    pub sample_rate: f64,
    pub num_transmit_antennas: usize,
    /// Transmit power in dBm
    pub power_dbm: f64,
}

impl TxInfo {
    /// Revise the antenna count after modulation; returns `true` when the
    /// site configuration changed.
    pub fn revise_antennas(&mut self, num_antennas: usize) -> bool {
        let num_antennas = num_antennas.max(1);
        if num_antennas == self.num_transmit_antennas {
            return false;
        }
        self.num_transmit_antennas = num_antennas;
        self.site.set_num_antennas(num_antennas);
        true
    }
}

/// Per-receiver configuration bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RxInfo {
    #[serde(rename = "ID")]
    pub id: EntityId,
    pub site: SiteConfig,
    /// Receiver tuning frequency in Hz
    pub center_frequency: f64,
    #[serde(rename = "BandWidth")]
    pub bandwidth: f64,
    pub sample_rate: f64,
    pub num_receive_antennas: usize,
    pub noise_figure_db: f64,
}

/// Message payload handed to the modulation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// One bit per byte (0 or 1)
    pub data: Vec<u8>,
    pub type_id: u32,
    pub segment_index: usize,
    /// Payload length in bits
    pub length: usize,
    pub symbol_rate: f64,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A modulated signal segment, one IQ stream per transmit antenna
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSegment {
    pub streams: Vec<Vec<IQSample>>,
    pub bandwidth: [f64; 2],
    pub modulator: ModulatorType,
    pub sample_rate: f64,
    pub symbol_rate: f64,
    pub num_antennas: usize,
    pub start_time: f64,
    pub carrier_frequency: f64,
}

impl SignalSegment {
    /// Samples per antenna stream
    pub fn len(&self) -> usize {
        self.streams.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.len() as f64 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Mean power per sample across all antenna streams
    pub fn mean_power(&self) -> f64 {
        let total: usize = self.streams.iter().map(Vec::len).sum();
        if total == 0 {
            return 0.0;
        }
        let energy: f64 = self.streams.iter().flatten().map(|s| s.norm_sqr()).sum();
        energy / total as f64
    }
}
