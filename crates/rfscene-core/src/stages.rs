//! Signal-processing stages of the frame pipeline
//!
//! The frame orchestrator drives five collaborators in order:
//!
//! ```text
//! MessageSource ─► Modulate ─► TransmitImpairment ─► ChannelPropagator ─► ReceiveProcessor
//!   (bits)         (IQ)         (impaired IQ)         (per-receiver IQ)     (data + annotation)
//! ```
//!
//! Collaborators own whatever random state they need; a seeded generator is
//! handed to them at construction so a fixed seed reproduces a frame.

use crate::tiling::TransmitterPlacement;
use crate::types::{
    ArrayType, EntityId, FrameId, IQSample, Message, ModulatorType, PlacedSegment, RxInfo,
    SignalSegment, TxInfo,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type for stage operations
pub type StageResult<T> = Result<T, StageError>;

/// Errors raised by a pipeline stage
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("message generator returned no data")]
    EmptyMessage,

    #[error("unsupported modulation: {0}")]
    Unsupported(String),

    #[error("{stage} failed: {reason}")]
    Failed { stage: &'static str, reason: String },
}

/// Message parameters of one segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MessageConfig {
    #[serde(rename = "TypeID")]
    pub type_id: u32,
    /// Length in symbols
    pub length: Option<usize>,
    /// Symbol rate in symbols/s
    pub symbol_rate: Option<f64>,
}

/// Modulation parameters of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModulationConfig {
    pub modulator_type: Option<ModulatorType>,
    pub samples_per_symbol: usize,
    pub num_transmit_antennas: usize,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            modulator_type: None,
            samples_per_symbol: 8,
            num_transmit_antennas: 1,
        }
    }
}

/// Everything the pipeline needs to produce one segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SegmentPlan {
    pub message: MessageConfig,
    pub modulation: ModulationConfig,
    pub placement: Option<PlacedSegment>,
}

/// A segment plan whose required fields are all present
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSegment<'a> {
    pub type_id: u32,
    pub length: usize,
    pub symbol_rate: f64,
    pub modulator: ModulatorType,
    pub samples_per_symbol: usize,
    pub num_antennas: usize,
    pub placement: &'a PlacedSegment,
}

impl SegmentPlan {
    /// Check the required fields, naming the first one missing.
    pub fn validate(&self) -> Result<ValidatedSegment<'_>, String> {
        let length = match self.message.length {
            Some(0) | None => return Err("Message.Length is missing".to_string()),
            Some(n) => n,
        };
        let symbol_rate = match self.message.symbol_rate {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => return Err("Message.SymbolRate is missing or not positive".to_string()),
        };
        let modulator = self
            .modulation
            .modulator_type
            .ok_or_else(|| "Modulation.ModulatorType is missing".to_string())?;
        let placement = self
            .placement
            .as_ref()
            .ok_or_else(|| "segment has no time-frequency placement".to_string())?;
        if self.modulation.samples_per_symbol == 0 {
            return Err("Modulation.SamplesPerSymbol must be > 0".to_string());
        }
        Ok(ValidatedSegment {
            type_id: self.message.type_id,
            length,
            symbol_rate,
            modulator,
            samples_per_symbol: self.modulation.samples_per_symbol,
            num_antennas: self.modulation.num_transmit_antennas.max(1),
            placement,
        })
    }
}

/// Transmitter configuration produced by a behavior model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransmitterPlan {
    pub info: TxInfo,
    pub segments: Vec<SegmentPlan>,
    pub placement: Option<TransmitterPlacement>,
}

/// Request handed to the modulation stage
#[derive(Debug, Clone)]
pub struct ModulationRequest<'a> {
    pub frame_id: FrameId,
    pub tx_id: EntityId,
    pub segment_index: usize,
    pub modulator: ModulatorType,
    pub samples_per_symbol: usize,
    pub num_antennas: usize,
    pub placement: &'a PlacedSegment,
}

/// Generates message payloads of `length` bits
pub trait MessageSource: Send {
    fn generate(
        &mut self,
        frame_id: FrameId,
        type_id: u32,
        segment_index: usize,
        length: usize,
        symbol_rate: f64,
    ) -> StageResult<Message>;
}

/// Maps a message onto baseband IQ
pub trait Modulate: Send {
    fn modulate(&mut self, message: &Message, request: &ModulationRequest<'_>) -> StageResult<SignalSegment>;
}

/// Transmit-side RF front-end effects
pub trait TransmitImpairment: Send {
    fn apply(
        &mut self,
        segment: &SignalSegment,
        frame_id: FrameId,
        tx: &TxInfo,
        segment_index: usize,
    ) -> StageResult<SignalSegment>;
}

/// Produced segments of one transmitter, in segment order
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    pub tx_id: EntityId,
    /// `(segment_index, segment)` for every non-empty segment
    pub segments: Vec<(usize, SignalSegment)>,
}

/// What one receiver saw of one transmitted segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceivedComponent {
    #[serde(rename = "TxID")]
    pub tx_id: EntityId,
    pub segment_index: usize,
    pub modulator: ModulatorType,
    pub carrier_frequency: f64,
    #[serde(rename = "BandWidth")]
    pub bandwidth: [f64; 2],
    pub symbol_rate: f64,
    pub start_time: f64,
    pub duration: f64,
    pub distance_m: f64,
    pub path_loss_db: f64,
    pub received_power_dbm: f64,
}

/// Composite signal at one receiver
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverSignal {
    pub rx_id: EntityId,
    pub sample_rate: f64,
    pub center_frequency: f64,
    /// One stream per receive antenna
    pub streams: Vec<Vec<IQSample>>,
    /// Noise power per sample (linear, W)
    pub noise_power: f64,
    pub components: Vec<ReceivedComponent>,
}

/// Propagates transmissions to every receiver
pub trait ChannelPropagator: Send {
    fn propagate(
        &mut self,
        transmissions: &[Transmission],
        frame_id: FrameId,
        tx_infos: &[TxInfo],
        rx_infos: &[RxInfo],
    ) -> StageResult<Vec<ReceiverSignal>>;
}

/// Final per-frame products
pub trait ReceiveProcessor: Send {
    fn process(
        &mut self,
        frame_id: FrameId,
        signals: Vec<ReceiverSignal>,
        rx_infos: &[RxInfo],
    ) -> StageResult<(FrameData, FrameAnnotation)>;
}

/// Captured IQ of one receiver
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverCapture {
    pub rx_id: EntityId,
    pub sample_rate: f64,
    pub center_frequency: f64,
    pub streams: Vec<Vec<IQSample>>,
}

/// Signal data of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameData {
    pub frame_id: FrameId,
    pub receivers: Vec<ReceiverCapture>,
}

impl FrameData {
    pub fn empty(frame_id: FrameId) -> Self {
        Self { frame_id, receivers: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.iter().all(|r| r.streams.iter().all(Vec::is_empty))
    }
}

/// Outcome of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameStatus {
    Ok,
    FrameGenerationFailed {
        #[serde(rename = "Reason")]
        reason: String,
    },
}

impl FrameStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, FrameStatus::Ok)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegmentAnnotation {
    pub segment_index: usize,
    #[serde(rename = "ModulatorType")]
    pub modulator: ModulatorType,
    pub start_time: f64,
    #[serde(rename = "TimeDuration")]
    pub duration: f64,
    pub carrier_frequency: f64,
    #[serde(rename = "BandWidth")]
    pub bandwidth: [f64; 2],
    pub symbol_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxAnnotation {
    #[serde(rename = "ID")]
    pub id: EntityId,
    pub carrier_frequency: f64,
    #[serde(rename = "BandWidth")]
    pub bandwidth: f64,
    pub sample_rate: f64,
    pub num_transmit_antennas: usize,
    pub array_type: ArrayType,
    pub position: [f64; 3],
    pub segments: Vec<SegmentAnnotation>,
}

impl TxAnnotation {
    pub fn from_info(info: &TxInfo) -> Self {
        Self {
            id: info.id,
            carrier_frequency: info.carrier_frequency,
            bandwidth: info.bandwidth,
            sample_rate: info.sample_rate,
            num_transmit_antennas: info.num_transmit_antennas,
            array_type: info.site.array_type,
            position: info.site.position,
            segments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkAnnotation {
    #[serde(rename = "TxID")]
    pub tx_id: EntityId,
    pub segment_index: usize,
    pub distance_m: f64,
    pub path_loss_db: f64,
    #[serde(rename = "SNR")]
    pub snr_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RxAnnotation {
    #[serde(rename = "ID")]
    pub id: EntityId,
    pub center_frequency: f64,
    pub sample_rate: f64,
    pub num_receive_antennas: usize,
    pub position: [f64; 3],
    pub noise_power_dbm: f64,
    pub links: Vec<LinkAnnotation>,
}

/// A segment that produced no signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmptySegment {
    #[serde(rename = "TxID")]
    pub tx_id: EntityId,
    pub segment_index: usize,
    pub reason: String,
}

/// Structured metadata of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FrameAnnotation {
    #[serde(rename = "ScenarioID")]
    pub scenario_id: Option<u64>,
    #[serde(rename = "FrameID")]
    pub frame_id: FrameId,
    /// Frame id unique across the scenarios of one worker
    #[serde(rename = "GlobalFrameID")]
    pub global_frame_id: Option<u64>,
    pub status: FrameStatus,
    pub generated_at: DateTime<Utc>,
    pub transmitters: Vec<TxAnnotation>,
    pub receivers: Vec<RxAnnotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub empty_segments: Vec<EmptySegment>,
    /// Environment snapshot of the frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<serde_json::Value>,
}

impl FrameAnnotation {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            scenario_id: None,
            frame_id,
            global_frame_id: None,
            status: FrameStatus::Ok,
            generated_at: Utc::now(),
            transmitters: Vec::new(),
            receivers: Vec::new(),
            empty_segments: Vec::new(),
            environment: None,
        }
    }

    /// Annotation of a frame whose generation failed
    pub fn failed(frame_id: FrameId, reason: impl Into<String>) -> Self {
        Self {
            status: FrameStatus::FrameGenerationFailed { reason: reason.into() },
            ..Self::new(frame_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentDescriptor;

    fn placement() -> PlacedSegment {
        PlacedSegment {
            descriptor: SegmentDescriptor::symmetric(ModulatorType::Bpsk, 1000.0, 8000.0, 0.01),
            start_time: 0.001,
            carrier_frequency: 2000.0,
            envelope_bandwidth: 1000.0,
            envelope_sample_rate: 8000.0,
        }
    }

    fn complete_plan() -> SegmentPlan {
        SegmentPlan {
            message: MessageConfig {
                type_id: 1,
                length: Some(16),
                symbol_rate: Some(1000.0),
            },
            modulation: ModulationConfig {
                modulator_type: Some(ModulatorType::Bpsk),
                ..Default::default()
            },
            placement: Some(placement()),
        }
    }

    #[test]
    fn test_validate_complete_plan() {
        let plan = complete_plan();
        let v = plan.validate().unwrap();
        assert_eq!(v.length, 16);
        assert_eq!(v.modulator, ModulatorType::Bpsk);
        assert_eq!(v.samples_per_symbol, 8);
        assert_eq!(v.num_antennas, 1);
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut plan = complete_plan();
        plan.message.length = None;
        assert!(plan.validate().unwrap_err().contains("Message.Length"));

        let mut plan = complete_plan();
        plan.message.symbol_rate = Some(-1.0);
        assert!(plan.validate().unwrap_err().contains("SymbolRate"));

        let mut plan = complete_plan();
        plan.modulation.modulator_type = None;
        assert!(plan.validate().unwrap_err().contains("ModulatorType"));

        let mut plan = complete_plan();
        plan.placement = None;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_segment_plan_from_yaml() {
        let yaml = "Message:\n  TypeID: 3\n  SymbolRate: 500.0\nModulation:\n  ModulatorType: QPSK\n";
        let plan: SegmentPlan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.message.type_id, 3);
        assert_eq!(plan.message.length, None);
        assert_eq!(plan.modulation.modulator_type, Some(ModulatorType::Qpsk));
    }

    #[test]
    fn test_failed_annotation_serializes_reason() {
        let ann = FrameAnnotation::failed(4, "channel exploded");
        assert!(!ann.status.is_ok());
        let json = serde_json::to_value(&ann).unwrap();
        assert_eq!(json["FrameID"], 4);
        assert_eq!(json["Status"]["FrameGenerationFailed"]["Reason"], "channel exploded");
        assert!(json.get("EmptySegments").is_none());
    }

    #[test]
    fn test_empty_frame_data() {
        let data = FrameData::empty(7);
        assert!(data.is_empty());
        assert_eq!(data.frame_id, 7);
    }
}
