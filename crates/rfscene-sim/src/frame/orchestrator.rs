//! Frame orchestration
//!
//! ```text
//! instantiate ─► per segment: validate ─► message ─► modulate ─► impair
//!                                                                   │
//!        annotation ◄── receive ◄── channel ◄── antenna revision ◄──┘
//! ```
//!
//! Failures are contained at the narrowest scope: a bad segment becomes an
//! empty outcome, a bad frame becomes a `FrameGenerationFailed` annotation.
//! Configuration and instantiation errors end the scenario.

use super::outcome::{segment_annotation, SegmentOutcome, TransmitterOutcome};
use crate::scenario::{Instantiation, RandomBehavior, ScenarioInstantiator};
use crate::reference::{
    BasebandModulator, ChannelConfig, EnergyReceiver, FreeSpaceChannel, HardwareImpairments,
    ImpairmentConfig, RandomMessageSource, ReceiverConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rfscene_core::config::{sections, GeneratorConfig};
use rfscene_core::error::{ScenarioError, ScenarioResult};
use rfscene_core::stages::{
    ChannelPropagator, FrameAnnotation, FrameData, FrameStatus, MessageSource, Modulate,
    ModulationRequest, ReceiveProcessor, SegmentPlan, TransmitImpairment, TxAnnotation,
};
use rfscene_core::types::{EntityId, FrameId, TxInfo};
use tracing::{debug, error, info, warn};

/// Signal-path collaborators of the orchestrator
pub struct Stages {
    pub message_source: Box<dyn MessageSource>,
    pub modulator: Box<dyn Modulate>,
    pub impairments: Box<dyn TransmitImpairment>,
    pub channel: Box<dyn ChannelPropagator>,
    pub receiver: Box<dyn ReceiveProcessor>,
}

impl Stages {
    /// Reference stages configured from the merged `Impairments`, `Channel`
    /// and `Receiver` sections, each with its own seeded generator.
    pub fn reference(config: &GeneratorConfig, rng: &mut StdRng) -> ScenarioResult<Self> {
        let impairments: ImpairmentConfig = config.section(sections::IMPAIRMENTS)?;
        let channel: ChannelConfig = config.section(sections::CHANNEL)?;
        let receiver: ReceiverConfig = config.section(sections::RECEIVER)?;

        Ok(Self {
            message_source: Box::new(RandomMessageSource::new(StdRng::seed_from_u64(rng.gen()))),
            modulator: Box::new(BasebandModulator::new()),
            impairments: Box::new(HardwareImpairments::new(
                impairments,
                StdRng::seed_from_u64(rng.gen()),
            )?),
            channel: Box::new(FreeSpaceChannel::new(channel, StdRng::seed_from_u64(rng.gen()))?),
            receiver: Box::new(EnergyReceiver::new(receiver)?),
        })
    }
}

/// IQ data and annotation of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub data: FrameData,
    pub annotation: FrameAnnotation,
}

impl FrameOutput {
    pub fn is_ok(&self) -> bool {
        self.annotation.status.is_ok()
    }

    pub fn global_frame_id(&self) -> Option<u64> {
        self.annotation.global_frame_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutput {
    pub scenario_id: u64,
    pub frames: Vec<FrameOutput>,
}

pub struct FrameOrchestrator {
    config: GeneratorConfig,
    instantiator: ScenarioInstantiator,
    stages: Stages,
    scenario_id: Option<u64>,
    next_global_frame_id: u64,
}

impl FrameOrchestrator {
    pub fn new(config: GeneratorConfig, instantiator: ScenarioInstantiator, stages: Stages) -> Self {
        Self {
            config,
            instantiator,
            stages,
            scenario_id: None,
            next_global_frame_id: 1,
        }
    }

    /// Orchestrator wired with the random behavior and the reference
    /// stages, all seeded from `rng`.
    pub fn with_reference_stages(config: GeneratorConfig, rng: &mut StdRng) -> ScenarioResult<Self> {
        let stages = Stages::reference(&config, rng)?;
        let behavior = RandomBehavior::new(StdRng::seed_from_u64(rng.gen()));
        let instantiator = ScenarioInstantiator::new(
            config.clone(),
            Box::new(behavior),
            StdRng::seed_from_u64(rng.gen()),
        );
        Ok(Self::new(config, instantiator, stages))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn instantiator(&self) -> &ScenarioInstantiator {
        &self.instantiator
    }

    /// Begin a new scenario; global frame ids keep increasing across
    /// scenarios.
    pub fn start_scenario(&mut self, scenario_id: u64) {
        self.scenario_id = Some(scenario_id);
        self.instantiator.start_scenario(scenario_id);
    }

    /// Run `NumFramesPerScenario` frames of scenario `scenario_id`.
    pub fn generate_scenario(&mut self, scenario_id: u64) -> ScenarioResult<ScenarioOutput> {
        let mut frames = Vec::new();
        self.generate_scenario_with(scenario_id, |frame| {
            frames.push(frame);
            Ok(())
        })?;
        Ok(ScenarioOutput { scenario_id, frames })
    }

    /// Like [`generate_scenario`](Self::generate_scenario), handing each
    /// frame to `sink` as soon as it is produced.
    pub fn generate_scenario_with<F>(&mut self, scenario_id: u64, mut sink: F) -> ScenarioResult<usize>
    where
        F: FnMut(FrameOutput) -> ScenarioResult<()>,
    {
        self.start_scenario(scenario_id);
        let num_frames = self.config.num_frames_per_scenario.max(1) as FrameId;
        info!(scenario_id, num_frames, "scenario started");

        let mut failed = 0usize;
        for frame_id in 1..=num_frames {
            let frame = self.generate_frame(frame_id)?;
            if !frame.is_ok() {
                failed += 1;
            }
            sink(frame)?;
        }

        info!(scenario_id, num_frames, failed, "scenario finished");
        Ok(num_frames as usize)
    }

    /// Generate one frame of the current scenario.
    ///
    /// Configuration and instantiation errors are returned; any other
    /// failure yields empty frame data and a `FrameGenerationFailed`
    /// annotation.
    pub fn generate_frame(&mut self, frame_id: FrameId) -> ScenarioResult<FrameOutput> {
        self.config.require_sections()?;

        let instantiation = self.instantiator.instantiate(frame_id);
        if let Some(reason) = instantiation.error() {
            return Err(ScenarioError::Instantiation {
                frame_id,
                reason: reason.to_string(),
            });
        }

        let mut output = match self.run_pipeline(frame_id, instantiation) {
            Ok(output) => output,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(
                    frame_id,
                    scenario_id = ?self.scenario_id,
                    error_kind = e.kind(),
                    error = %e,
                    "frame generation failed"
                );
                FrameOutput {
                    data: FrameData::empty(frame_id),
                    annotation: FrameAnnotation::failed(frame_id, e.to_string()),
                }
            }
        };

        output.annotation.scenario_id = self.scenario_id;
        output.annotation.global_frame_id = Some(self.next_global_frame_id);
        self.next_global_frame_id += 1;
        Ok(output)
    }

    fn run_pipeline(&mut self, frame_id: FrameId, instantiation: Instantiation) -> ScenarioResult<FrameOutput> {
        let Instantiation {
            transmitters,
            receivers,
            layout,
        } = instantiation;

        let mut tx_infos: Vec<TxInfo> = Vec::with_capacity(transmitters.len());
        let mut tx_annotations = Vec::with_capacity(transmitters.len());
        let mut transmissions = Vec::new();
        let mut empty_segments = Vec::new();

        for plan in transmitters {
            let mut info = plan.info;
            let outcomes = plan
                .segments
                .iter()
                .enumerate()
                .map(|(i, segment)| self.produce_segment(frame_id, &info, i, segment))
                .collect();
            let mut outcome = TransmitterOutcome {
                tx_id: info.id,
                outcomes,
            };

            if let Some(antennas) = outcome.final_antenna_count() {
                if info.revise_antennas(antennas) {
                    debug!(
                        frame_id,
                        tx_id = info.id,
                        num_antennas = antennas,
                        array_type = ?info.site.array_type,
                        "transmitter antenna count revised"
                    );
                }
            }

            for (segment_index, slot) in outcome.outcomes.iter_mut().enumerate() {
                if let SegmentOutcome::Produced(segment) = slot {
                    match self.stages.impairments.apply(segment, frame_id, &info, segment_index) {
                        Ok(impaired) => *segment = impaired,
                        Err(e) => warn!(
                            frame_id,
                            tx_id = info.id,
                            segment_index,
                            error = %e,
                            "impairments failed, keeping the unimpaired segment"
                        ),
                    }
                }
            }

            let mut annotation = TxAnnotation::from_info(&info);
            let (transmission, empty) = outcome.into_parts();
            annotation.segments = transmission
                .segments
                .iter()
                .map(|(i, s)| segment_annotation(*i, s))
                .collect();
            if !transmission.segments.is_empty() {
                transmissions.push(transmission);
            }
            empty_segments.extend(empty);
            tx_annotations.push(annotation);
            tx_infos.push(info);
        }

        let signals = self
            .stages
            .channel
            .propagate(&transmissions, frame_id, &tx_infos, &receivers)
            .map_err(|e| ScenarioError::FrameGeneration {
                frame_id,
                reason: format!("channel: {}", e),
            })?;
        let (data, mut annotation) = self
            .stages
            .receiver
            .process(frame_id, signals, &receivers)
            .map_err(|e| ScenarioError::FrameGeneration {
                frame_id,
                reason: format!("receiver: {}", e),
            })?;

        annotation.frame_id = frame_id;
        annotation.status = FrameStatus::Ok;
        annotation.transmitters = tx_annotations;
        annotation.empty_segments = empty_segments;
        annotation.environment = layout.environment.map(serde_json::to_value).transpose()?;

        debug!(
            frame_id,
            transmissions = transmissions.len(),
            receivers = data.receivers.len(),
            empty_segments = annotation.empty_segments.len(),
            "frame generated"
        );

        Ok(FrameOutput { data, annotation })
    }

    fn produce_segment(
        &mut self,
        frame_id: FrameId,
        tx: &TxInfo,
        segment_index: usize,
        plan: &SegmentPlan,
    ) -> SegmentOutcome {
        let skip = |reason: String| skipped_segment(frame_id, tx.id, segment_index, reason);

        let segment = match plan.validate() {
            Ok(segment) => segment,
            Err(reason) => return skip(reason),
        };

        let bits = segment.length * segment.modulator.bits_per_symbol();
        let message = match self.stages.message_source.generate(
            frame_id,
            segment.type_id,
            segment_index,
            bits,
            segment.symbol_rate,
        ) {
            Ok(message) if message.is_empty() => return skip("message generator returned no data".to_string()),
            Ok(message) => message,
            Err(e) => return skip(format!("message: {}", e)),
        };

        let request = ModulationRequest {
            frame_id,
            tx_id: tx.id,
            segment_index,
            modulator: segment.modulator,
            samples_per_symbol: segment.samples_per_symbol,
            num_antennas: segment.num_antennas,
            placement: segment.placement,
        };
        match self.stages.modulator.modulate(&message, &request) {
            Ok(signal) if signal.is_empty() => skip("modulator returned no samples".to_string()),
            Ok(signal) => SegmentOutcome::Produced(signal),
            Err(e) => skip(format!("modulation: {}", e)),
        }
    }
}

fn skipped_segment(frame_id: FrameId, tx_id: EntityId, segment_index: usize, reason: String) -> SegmentOutcome {
    let e = ScenarioError::SegmentProcessing {
        frame_id,
        tx_id,
        segment_index,
        reason: reason.clone(),
    };
    warn!(
        frame_id,
        tx_id,
        segment_index,
        error_kind = e.kind(),
        error = %e,
        "segment skipped"
    );
    SegmentOutcome::empty(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfscene_core::stages::{StageError, StageResult};
    use rfscene_core::types::{Message, SignalSegment};

    const CONFIG: &str = r#"
Seed: 11
NumFramesPerScenario: 3
Environment:
  Map:
    Boundaries: [-300, 300, -300, 300]
  Transmitters:
    Count: { Min: 2, Max: 2 }
  Receivers:
    Count: { Min: 1, Max: 1 }
Behavior:
  Modulators: [BPSK, QPSK, GMSK]
  MessageLength: { Min: 16, Max: 32 }
  SymbolRate: [500, 1000]
"#;

    fn orchestrator(yaml: &str, seed: u64) -> FrameOrchestrator {
        let config = GeneratorConfig::parse(yaml).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        FrameOrchestrator::with_reference_stages(config, &mut rng).unwrap()
    }

    #[test]
    fn test_scenario_frames_have_increasing_global_ids() {
        let mut orch = orchestrator(CONFIG, 1);
        let out = orch.generate_scenario(0).unwrap();
        assert_eq!(out.frames.len(), 3);
        let ids: Vec<u64> = out.frames.iter().filter_map(FrameOutput::global_frame_id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let next = orch.generate_scenario(1).unwrap();
        assert!(next.frames[0].global_frame_id().unwrap() > *ids.last().unwrap());
        assert_eq!(next.frames[0].annotation.scenario_id, Some(1));
        assert_eq!(next.frames[0].annotation.frame_id, 1);
    }

    #[test]
    fn test_frame_annotation_describes_frame() {
        let mut orch = orchestrator(CONFIG, 2);
        orch.start_scenario(0);
        let frame = orch.generate_frame(1).unwrap();
        assert!(frame.is_ok(), "{:?}", frame.annotation.status);
        assert_eq!(frame.annotation.transmitters.len(), 2);
        assert_eq!(frame.annotation.receivers.len(), 1);
        assert_eq!(frame.data.receivers.len(), 1);
        assert!(!frame.data.receivers[0].streams[0].is_empty());
        assert!(frame.annotation.environment.is_some());
        for tx in &frame.annotation.transmitters {
            assert!(!tx.segments.is_empty());
        }
        let links = &frame.annotation.receivers[0].links;
        let segments: usize = frame.annotation.transmitters.iter().map(|t| t.segments.len()).sum();
        assert_eq!(links.len(), segments);
    }

    #[test]
    fn test_missing_length_empties_only_that_segment() {
        let yaml = r#"
Environment:
  Transmitters:
    Count: { Min: 1, Max: 1 }
  Receivers:
    Count: { Min: 1, Max: 1 }
Behavior:
  Segments:
    - Message: { TypeID: 0, SymbolRate: 1000 }
      Modulation: { ModulatorType: QPSK, SamplesPerSymbol: 4 }
    - Message: { TypeID: 0, Length: 32, SymbolRate: 1000 }
      Modulation: { ModulatorType: QPSK, SamplesPerSymbol: 4 }
"#;
        let mut orch = orchestrator(yaml, 3);
        orch.start_scenario(0);
        let frame = orch.generate_frame(1).unwrap();
        assert!(frame.is_ok());
        let empty = &frame.annotation.empty_segments;
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].segment_index, 0);
        assert!(empty[0].reason.contains("Message.Length"));
        let tx = &frame.annotation.transmitters[0];
        assert_eq!(tx.segments.len(), 1);
        assert_eq!(tx.segments[0].segment_index, 1);
    }

    #[test]
    fn test_missing_section_is_configuration_error() {
        let yaml = r#"
Environment:
  Transmitters:
    Count: { Min: 1, Max: 1 }
"#;
        let mut orch = orchestrator(yaml, 4);
        orch.start_scenario(0);
        let err = orch.generate_frame(1).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_invalid_environment_aborts_with_instantiation_error() {
        let yaml = r#"
Environment:
  Receivers:
    Count: { Min: 4, Max: 2 }
Behavior: {}
"#;
        let mut orch = orchestrator(yaml, 5);
        let err = orch.generate_scenario(0).unwrap_err();
        assert_eq!(err.kind(), "InstantiationError");
    }

    struct BrokenChannel;

    impl ChannelPropagator for BrokenChannel {
        fn propagate(
            &mut self,
            _transmissions: &[rfscene_core::stages::Transmission],
            _frame_id: FrameId,
            _tx_infos: &[TxInfo],
            _rx_infos: &[rfscene_core::types::RxInfo],
        ) -> StageResult<Vec<rfscene_core::stages::ReceiverSignal>> {
            Err(StageError::Failed {
                stage: "channel",
                reason: "no propagation model".to_string(),
            })
        }
    }

    #[test]
    fn test_stage_failure_becomes_failed_frame() {
        let config = GeneratorConfig::parse(CONFIG).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let mut stages = Stages::reference(&config, &mut rng).unwrap();
        stages.channel = Box::new(BrokenChannel);
        let instantiator = ScenarioInstantiator::new(
            config.clone(),
            Box::new(RandomBehavior::new(StdRng::seed_from_u64(1))),
            StdRng::seed_from_u64(2),
        );
        let mut orch = FrameOrchestrator::new(config, instantiator, stages);

        let out = orch.generate_scenario(0).unwrap();
        assert_eq!(out.frames.len(), 3);
        for frame in &out.frames {
            assert!(frame.data.is_empty());
            match frame.annotation.status {
                FrameStatus::FrameGenerationFailed { ref reason } => {
                    assert!(reason.contains("no propagation model"))
                }
                FrameStatus::Ok => panic!("frame should have failed"),
            }
            assert!(frame.global_frame_id().is_some());
        }
    }

    struct FailingImpairment;

    impl TransmitImpairment for FailingImpairment {
        fn apply(
            &mut self,
            _segment: &SignalSegment,
            _frame_id: FrameId,
            _tx: &TxInfo,
            _segment_index: usize,
        ) -> StageResult<SignalSegment> {
            Err(StageError::Unsupported("impairment".to_string()))
        }
    }

    struct SilentSource;

    impl MessageSource for SilentSource {
        fn generate(
            &mut self,
            _frame_id: FrameId,
            type_id: u32,
            segment_index: usize,
            _length: usize,
            symbol_rate: f64,
        ) -> StageResult<Message> {
            Ok(Message {
                data: Vec::new(),
                type_id,
                segment_index,
                length: 0,
                symbol_rate,
            })
        }
    }

    fn orchestrator_with(configure: impl FnOnce(&mut Stages)) -> FrameOrchestrator {
        let config = GeneratorConfig::parse(CONFIG).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut stages = Stages::reference(&config, &mut rng).unwrap();
        configure(&mut stages);
        let instantiator = ScenarioInstantiator::new(
            config.clone(),
            Box::new(RandomBehavior::new(StdRng::seed_from_u64(1))),
            StdRng::seed_from_u64(2),
        );
        FrameOrchestrator::new(config, instantiator, stages)
    }

    #[test]
    fn test_impairment_failure_keeps_segment() {
        let mut orch = orchestrator_with(|s| s.impairments = Box::new(FailingImpairment));
        orch.start_scenario(0);
        let frame = orch.generate_frame(1).unwrap();
        assert!(frame.is_ok());
        assert!(frame.annotation.empty_segments.is_empty());
        assert!(frame.annotation.transmitters.iter().all(|t| !t.segments.is_empty()));
    }

    #[test]
    fn test_empty_messages_leave_frame_without_segments() {
        let mut orch = orchestrator_with(|s| s.message_source = Box::new(SilentSource));
        orch.start_scenario(0);
        let frame = orch.generate_frame(1).unwrap();
        assert!(frame.is_ok());
        assert!(frame.annotation.transmitters.iter().all(|t| t.segments.is_empty()));
        assert!(!frame.annotation.empty_segments.is_empty());
        assert!(frame.annotation.receivers[0].links.is_empty());
    }
}
