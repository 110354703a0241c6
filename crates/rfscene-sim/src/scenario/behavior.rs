//! Communication behavior
//!
//! A behavior model decides, for every frame, what each transmitter sends:
//! how many segments, which modulation, message length and symbol rate. The
//! reference [`RandomBehavior`] draws those at random and places them in
//! the spectrum with the [`SpectrumTiler`].

use crate::environment::{Entity, EntityProperties, EnvironmentSnapshot};
use rand::rngs::StdRng;
use rand::Rng;
use rfscene_core::config::{sample_span, validate_span, ConfigError, ConfigResult, CountRange};
use rfscene_core::error::ScenarioResult;
use rfscene_core::stages::{MessageConfig, ModulationConfig, SegmentPlan, TransmitterPlan};
use rfscene_core::tiling::{SpectrumTiler, Tiling, TilingConfig};
use rfscene_core::types::{FrameId, ModulatorType, RxInfo, SegmentDescriptor, TxInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Typed `Behavior` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BehaviorConfig {
    /// Modulators to draw from
    pub modulators: Vec<ModulatorType>,
    pub segments_per_transmitter: CountRange,
    /// Message length range in symbols
    pub message_length: CountRange,
    /// Symbol rate range in symbols/s
    pub symbol_rate: [f64; 2],
    pub samples_per_symbol: CountRange,
    /// Fixed segment list used for every transmitter instead of random draws
    pub segments: Option<Vec<SegmentPlan>>,
    pub tiling: TilingConfig,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            modulators: ModulatorType::ALL.to_vec(),
            segments_per_transmitter: CountRange::new(1, 3),
            message_length: CountRange::new(32, 128),
            symbol_rate: [500.0, 2000.0],
            samples_per_symbol: CountRange::new(4, 8),
            segments: None,
            tiling: TilingConfig::default(),
        }
    }
}

impl BehaviorConfig {
    pub fn from_value(value: serde_json::Value) -> ConfigResult<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::ParseError(format!("Behavior: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.modulators.is_empty() {
            return Err(ConfigError::ValidationError(
                "Behavior.Modulators must not be empty".to_string(),
            ));
        }
        self.segments_per_transmitter
            .validate("Behavior.SegmentsPerTransmitter")?;
        if self.segments_per_transmitter.min == 0 {
            return Err(ConfigError::ValidationError(
                "Behavior.SegmentsPerTransmitter.Min must be at least 1".to_string(),
            ));
        }
        self.message_length.validate("Behavior.MessageLength")?;
        self.samples_per_symbol.validate("Behavior.SamplesPerSymbol")?;
        if self.message_length.min == 0 || self.samples_per_symbol.min == 0 {
            return Err(ConfigError::ValidationError(
                "Behavior message length and samples per symbol must be > 0".to_string(),
            ));
        }
        validate_span("Behavior.SymbolRate", self.symbol_rate)?;
        if self.symbol_rate[0] <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Behavior.SymbolRate must be positive".to_string(),
            ));
        }
        if matches!(self.segments, Some(ref s) if s.is_empty()) {
            return Err(ConfigError::ValidationError(
                "Behavior.Segments must list at least one segment".to_string(),
            ));
        }
        self.tiling.validate()
    }
}

/// Per-frame layout produced alongside the transmitter/receiver bundles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Layout {
    #[serde(rename = "FrameID")]
    pub frame_id: FrameId,
    pub tiling: Option<Tiling>,
    pub environment: Option<EnvironmentSnapshot>,
    /// Set when instantiation failed
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorOutput {
    pub transmitters: Vec<TransmitterPlan>,
    pub receivers: Vec<RxInfo>,
    pub layout: Layout,
}

/// Assigns signal behavior to the entities of a frame
pub trait BehaviorModel: Send {
    fn configure(&mut self, config: &BehaviorConfig) -> ScenarioResult<()>;

    fn advance(
        &mut self,
        frame_id: FrameId,
        entities: &[Entity],
        config: &BehaviorConfig,
    ) -> ScenarioResult<BehaviorOutput>;
}

/// Random segment assignment placed with the spectrum tiler
pub struct RandomBehavior {
    tiler: SpectrumTiler,
    rng: StdRng,
}

impl RandomBehavior {
    pub fn new(rng: StdRng) -> Self {
        Self {
            tiler: SpectrumTiler::default(),
            rng,
        }
    }

    fn draw_segments(&mut self, config: &BehaviorConfig, num_antennas: usize) -> Vec<SegmentPlan> {
        if let Some(ref templates) = config.segments {
            return templates.clone();
        }
        let count = config.segments_per_transmitter.sample(&mut self.rng);
        (0..count)
            .map(|_| {
                let modulator = config.modulators[self.rng.gen_range(0..config.modulators.len())];
                // 100 symbols/s steps keep bandwidths on the tiling grid
                let symbol_rate = (sample_span(config.symbol_rate, &mut self.rng) / 100.0).round().max(1.0) * 100.0;
                SegmentPlan {
                    message: MessageConfig {
                        type_id: self.rng.gen_range(0..4),
                        length: Some(config.message_length.sample(&mut self.rng)),
                        symbol_rate: Some(symbol_rate),
                    },
                    modulation: ModulationConfig {
                        modulator_type: Some(modulator),
                        samples_per_symbol: config.samples_per_symbol.sample(&mut self.rng),
                        num_transmit_antennas: num_antennas,
                    },
                    placement: None,
                }
            })
            .collect()
    }
}

/// Bandwidth descriptor of a plan, when its message and modulation are known
fn descriptor(plan: &SegmentPlan) -> Option<SegmentDescriptor> {
    let length = plan.message.length.filter(|&n| n > 0)?;
    let symbol_rate = plan.message.symbol_rate.filter(|&r| r.is_finite() && r > 0.0)?;
    let modulator = plan.modulation.modulator_type?;
    let sps = plan.modulation.samples_per_symbol.max(1);
    Some(SegmentDescriptor::symmetric(
        modulator,
        modulator.occupied_bandwidth(symbol_rate),
        symbol_rate * sps as f64,
        length as f64 / symbol_rate,
    ))
}

impl BehaviorModel for RandomBehavior {
    fn configure(&mut self, config: &BehaviorConfig) -> ScenarioResult<()> {
        config.validate()?;
        self.tiler = SpectrumTiler::new(config.tiling.clone())?;
        Ok(())
    }

    fn advance(
        &mut self,
        frame_id: FrameId,
        entities: &[Entity],
        config: &BehaviorConfig,
    ) -> ScenarioResult<BehaviorOutput> {
        let mut transmitters = Vec::new();
        // (transmitter index, segment indices) of every tiled transmitter
        let mut tiled: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut descriptors = Vec::new();

        for entity in entities.iter().filter(|e| e.is_transmitter()) {
            let site = entity.site();
            let segments = self.draw_segments(config, site.num_antennas);

            let mut indices = Vec::new();
            let mut tx_descriptors = Vec::new();
            for (i, plan) in segments.iter().enumerate() {
                if let Some(d) = descriptor(plan) {
                    indices.push(i);
                    tx_descriptors.push(d);
                }
            }
            if !tx_descriptors.is_empty() {
                tiled.push((transmitters.len(), indices));
                descriptors.push(tx_descriptors);
            }

            let power_dbm = match entity.properties {
                EntityProperties::Transmitter { power_dbm, .. } => power_dbm,
                _ => 0.0,
            };
            transmitters.push(TransmitterPlan {
                info: TxInfo {
                    id: entity.id,
                    num_transmit_antennas: site.num_antennas,
                    site,
                    carrier_frequency: 0.0,
                    bandwidth: 0.0,
                    sample_rate: 0.0,
                    power_dbm,
                },
                segments,
                placement: None,
            });
        }

        let tiling = self.tiler.tile(&descriptors, &mut self.rng)?;

        for ((tx_index, indices), (placed, placement)) in tiled
            .iter()
            .zip(tiling.segments.iter().zip(tiling.transmitters.iter()))
        {
            let plan = &mut transmitters[*tx_index];
            for (segment_index, segment) in indices.iter().zip(placed.iter()) {
                plan.segments[*segment_index].placement = Some(segment.clone());
            }
            plan.info.carrier_frequency = placement.carrier_frequency;
            plan.info.bandwidth = placement.bandwidth;
            plan.info.sample_rate = placement.sample_rate;
            plan.placement = Some(placement.clone());
        }

        let [left, right] = tiling.occupied_band;
        let receivers = entities
            .iter()
            .filter(|e| e.is_receiver())
            .map(|entity| {
                let noise_figure_db = match entity.properties {
                    EntityProperties::Receiver { noise_figure_db, .. } => noise_figure_db,
                    _ => 0.0,
                };
                let site = entity.site();
                RxInfo {
                    id: entity.id,
                    num_receive_antennas: site.num_antennas,
                    site,
                    center_frequency: (left + right) / 2.0,
                    bandwidth: right - left,
                    sample_rate: tiling.master_clock_rate_range[0],
                    noise_figure_db,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            frame_id,
            transmitters = transmitters.len(),
            receivers = receivers.len(),
            occupied_low = left,
            occupied_high = right,
            "behavior assigned"
        );

        Ok(BehaviorOutput {
            transmitters,
            receivers,
            layout: Layout {
                frame_id,
                tiling: Some(tiling),
                environment: None,
                error: None,
            },
        })
    }
}
