//! Transmit hardware impairments
//!
//! Models front-end imperfections of a transmitter: oscillator phase noise,
//! IQ gain/phase imbalance and DC offset. Parameters are drawn per segment
//! from the configured ranges, so every segment of a frame has its own
//! hardware signature.
//!
//! ## Blocks
//!
//! - **PhaseNoiseGenerator**: filtered random phase jitter
//! - **IqImbalance**: gain/phase mismatch between the I and Q paths
//! - **DcOffset**: constant bias on I and Q

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rfscene_core::config::{sample_span, validate_span, ConfigError, ConfigResult};
use rfscene_core::stages::{StageError, StageResult, TransmitImpairment};
use rfscene_core::types::{FrameId, IQSample, SignalSegment, TxInfo};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::trace;

/// Phase noise: a first-order IIR-filtered random walk.
///
/// `alpha` controls spectral shape: 0 = white phase noise, near 1 = 1/f-like.
#[derive(Debug, Clone)]
pub struct PhaseNoiseGenerator {
    /// Linear noise magnitude
    noise_linear: f64,
    alpha: f64,
    iir_state: f64,
}

impl PhaseNoiseGenerator {
    /// `noise_magnitude_db` in dBc (typically -20 to -60)
    pub fn new(noise_magnitude_db: f64, alpha: f64) -> Self {
        Self {
            noise_linear: 10.0_f64.powf(noise_magnitude_db / 20.0),
            alpha: alpha.clamp(0.0, 0.9999),
            iir_state: 0.0,
        }
    }

    /// Phase jitter in radians for the next `len` samples
    pub fn phases<R: Rng + ?Sized>(&mut self, len: usize, rng: &mut R) -> Vec<f64> {
        let white = Normal::new(0.0, 1.0).ok();
        (0..len)
            .map(|_| {
                let w = white.map(|n| n.sample(rng)).unwrap_or(0.0) * self.noise_linear;
                self.iir_state = self.alpha * self.iir_state + (1.0 - self.alpha) * w;
                self.iir_state
            })
            .collect()
    }

    pub fn process<R: Rng + ?Sized>(&mut self, samples: &[IQSample], rng: &mut R) -> Vec<IQSample> {
        let jitter = self.phases(samples.len(), rng);
        rotate(samples, &jitter)
    }

    pub fn reset(&mut self) {
        self.iir_state = 0.0;
    }
}

fn rotate(samples: &[IQSample], phases: &[f64]) -> Vec<IQSample> {
    samples
        .iter()
        .zip(phases)
        .map(|(&s, &p)| s * Complex64::from_polar(1.0, p))
        .collect()
}

/// IQ imbalance: `I' = I`, `Q' = g (Q cos(phi) + I sin(phi))`
#[derive(Debug, Clone)]
pub struct IqImbalance {
    gain: f64,
    phase_rad: f64,
}

impl IqImbalance {
    pub fn new(magnitude_db: f64, phase_deg: f64) -> Self {
        Self {
            gain: 10.0_f64.powf(magnitude_db / 20.0),
            phase_rad: phase_deg * PI / 180.0,
        }
    }

    pub fn process(&self, samples: &[IQSample]) -> Vec<IQSample> {
        let (sin_p, cos_p) = self.phase_rad.sin_cos();
        samples
            .iter()
            .map(|s| Complex64::new(s.re, self.gain * (s.im * cos_p + s.re * sin_p)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct DcOffset {
    pub i_offset: f64,
    pub q_offset: f64,
}

impl DcOffset {
    pub fn new(i_offset: f64, q_offset: f64) -> Self {
        Self { i_offset, q_offset }
    }

    pub fn process(&self, samples: &[IQSample]) -> Vec<IQSample> {
        samples
            .iter()
            .map(|s| Complex64::new(s.re + self.i_offset, s.im + self.q_offset))
            .collect()
    }
}

/// Typed `Impairments` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImpairmentConfig {
    pub enabled: bool,
    /// Phase noise level range in dBc
    pub phase_noise_dbc: [f64; 2],
    pub phase_noise_alpha: f64,
    /// IQ gain mismatch range in dB
    pub iq_gain_db: [f64; 2],
    /// IQ phase error range in degrees
    pub iq_phase_deg: [f64; 2],
    /// DC offset magnitude range, relative to unit signal amplitude
    pub dc_offset: [f64; 2],
}

impl Default for ImpairmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phase_noise_dbc: [-50.0, -30.0],
            phase_noise_alpha: 0.9,
            iq_gain_db: [0.0, 0.5],
            iq_phase_deg: [0.0, 2.0],
            dc_offset: [0.0, 0.01],
        }
    }
}

impl ImpairmentConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        validate_span("Impairments.PhaseNoiseDbc", self.phase_noise_dbc)?;
        validate_span("Impairments.IqGainDb", self.iq_gain_db)?;
        validate_span("Impairments.IqPhaseDeg", self.iq_phase_deg)?;
        validate_span("Impairments.DcOffset", self.dc_offset)?;
        if !(0.0..1.0).contains(&self.phase_noise_alpha) {
            return Err(ConfigError::ValidationError(
                "Impairments.PhaseNoiseAlpha must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-segment hardware impairment chain
pub struct HardwareImpairments {
    config: ImpairmentConfig,
    rng: StdRng,
}

impl HardwareImpairments {
    pub fn new(config: ImpairmentConfig, rng: StdRng) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &ImpairmentConfig {
        &self.config
    }
}

impl TransmitImpairment for HardwareImpairments {
    fn apply(
        &mut self,
        segment: &SignalSegment,
        frame_id: FrameId,
        tx: &TxInfo,
        segment_index: usize,
    ) -> StageResult<SignalSegment> {
        if segment.streams.iter().flatten().any(|s| !s.re.is_finite() || !s.im.is_finite()) {
            return Err(StageError::Failed {
                stage: "impairments",
                reason: "segment contains non-finite samples".to_string(),
            });
        }
        if !self.config.enabled {
            return Ok(segment.clone());
        }

        let pn_dbc = sample_span(self.config.phase_noise_dbc, &mut self.rng);
        let gain_db = sample_span(self.config.iq_gain_db, &mut self.rng);
        let phase_deg = sample_span(self.config.iq_phase_deg, &mut self.rng);
        let dc_mag = sample_span(self.config.dc_offset, &mut self.rng);
        let dc_angle = self.rng.gen_range(0.0..2.0 * PI);

        let iq = IqImbalance::new(gain_db, phase_deg);
        let dc = DcOffset::new(dc_mag * dc_angle.cos(), dc_mag * dc_angle.sin());
        // One oscillator per transmitter: every antenna sees the same jitter
        let jitter = PhaseNoiseGenerator::new(pn_dbc, self.config.phase_noise_alpha)
            .phases(segment.len(), &mut self.rng);
        let streams = segment
            .streams
            .iter()
            .map(|stream| dc.process(&iq.process(&rotate(stream, &jitter))))
            .collect();

        trace!(
            frame_id,
            tx_id = tx.id,
            segment_index,
            phase_noise_dbc = pn_dbc,
            iq_gain_db = gain_db,
            iq_phase_deg = phase_deg,
            "impairments applied"
        );

        Ok(SignalSegment {
            streams,
            ..segment.clone()
        })
    }
}
