//! Time-frequency spectrum tiling
//!
//! Packs the signal segments of several transmitters into one shared
//! time-frequency plane:
//!
//! ```text
//!  freq ▲
//!       │            ┌──────── tx2 ────────┐
//!       │            │ seg0 │ seg1 │       │  ◄ upper edge anchored at
//!       │   ┌── tx1 ─┴──┐───┘      │          base + cumulative delta
//!       │   │seg0│ seg1 │          │
//!  base ┼───┴────┴──────┴──────────┴────────► time
//!           ◄─jitter─►   back to back
//! ```
//!
//! Transmitters are walked in input order. Each one advances a cumulative
//! frequency delta by its own span plus a random guard increment, so with
//! overlap disabled consecutive transmitters never share spectrum. With
//! overlap enabled a transmitter may instead advance by only part of its
//! span and deliberately overlap its predecessor.
//!
//! The numeric policy (100 Hz rounding, 100/1000 Hz granularity, the
//! 1 ms–100 ms start-time grid) is empirical and kept as configurable
//! defaults.

use crate::config::{sample_span, validate_span, ConfigError};
use crate::types::{PlacedSegment, SegmentDescriptor};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Frequency rounding step in Hz
pub const FREQUENCY_STEP_HZ: f64 = 100.0;

/// Tiling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TilingConfig {
    /// Allow controlled spectral overlap between neighbours
    pub is_overlap: bool,
    /// Probability of overlapping a transmitter with its predecessor
    pub overlap_probability: f64,
    /// Fraction of the span that may overlap, `[lo, hi]`
    pub overlap_ratio: [f64; 2],
    /// Base frequency range in Hz, rounded to 100 Hz
    pub base_frequency: [f64; 2],
    /// Candidate start-time window `[first, last]` in seconds
    pub start_time_window: [f64; 2],
    /// Number of candidate start times in the window
    pub start_time_points: usize,
    /// Guard increment in units of the modulation granularity `[min, max]`
    pub guard_steps: [u32; 2],
    /// Relative master-clock margin `[lo, hi]`
    pub clock_margin: [f64; 2],
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            is_overlap: false,
            overlap_probability: 0.3,
            overlap_ratio: [0.1, 0.5],
            base_frequency: [100.0, 3000.0],
            start_time_window: [0.001, 0.1],
            start_time_points: 100,
            guard_steps: [2, 10],
            clock_margin: [0.05, 0.25],
        }
    }
}

impl TilingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.overlap_probability) {
            return Err(ConfigError::ValidationError(format!(
                "Tiling.OverlapProbability must be within [0, 1], got {}",
                self.overlap_probability
            )));
        }
        validate_span("Tiling.OverlapRatio", self.overlap_ratio)?;
        if self.overlap_ratio[0] < 0.0 || self.overlap_ratio[1] > 1.0 {
            return Err(ConfigError::ValidationError(
                "Tiling.OverlapRatio must lie within [0, 1]".to_string(),
            ));
        }
        validate_span("Tiling.BaseFrequency", self.base_frequency)?;
        if self.base_frequency[1] < FREQUENCY_STEP_HZ {
            return Err(ConfigError::ValidationError(
                "Tiling.BaseFrequency must reach at least 100 Hz".to_string(),
            ));
        }
        validate_span("Tiling.StartTimeWindow", self.start_time_window)?;
        if self.start_time_window[0] < 0.0 {
            return Err(ConfigError::ValidationError(
                "Tiling.StartTimeWindow must be non-negative".to_string(),
            ));
        }
        if self.start_time_points == 0 {
            return Err(ConfigError::ValidationError(
                "Tiling.StartTimePoints must be > 0".to_string(),
            ));
        }
        if self.guard_steps[0] == 0 || self.guard_steps[0] > self.guard_steps[1] {
            return Err(ConfigError::ValidationError(
                "Tiling.GuardSteps must satisfy 0 < min <= max".to_string(),
            ));
        }
        validate_span("Tiling.ClockMargin", self.clock_margin)?;
        Ok(())
    }

    /// Candidate segment start times, evenly spaced over the window
    pub fn start_time_grid(&self) -> Vec<f64> {
        let [first, last] = self.start_time_window;
        let n = self.start_time_points;
        if n == 1 {
            return vec![first];
        }
        let step = (last - first) / (n - 1) as f64;
        (0..n).map(|i| first + step * i as f64).collect()
    }
}

/// Errors raised while tiling
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TilingError {
    #[error("transmitter {tx_index} has no signal segments")]
    NoSegments { tx_index: usize },

    #[error("transmitter {tx_index}, segment {segment_index}: {reason}")]
    InvalidDescriptor {
        tx_index: usize,
        segment_index: usize,
        reason: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Placement summary of one transmitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransmitterPlacement {
    pub carrier_frequency: f64,
    /// Declared bandwidth, symmetric around the carrier
    #[serde(rename = "BandWidth")]
    pub bandwidth: f64,
    /// Largest segment sample rate
    pub sample_rate: f64,
    pub start_time: f64,
    /// Total duration of all segments
    pub duration: f64,
    /// `[lowest, highest]` absolute frequency actually occupied
    pub band: [f64; 2],
    /// Whether this transmitter was deliberately overlapped
    pub overlapped: bool,
}

impl TransmitterPlacement {
    /// Declared interval `[fc - BW/2, fc + BW/2]`
    pub fn declared_interval(&self) -> [f64; 2] {
        [
            self.carrier_frequency - self.bandwidth / 2.0,
            self.carrier_frequency + self.bandwidth / 2.0,
        ]
    }
}

/// Output of one tiling pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tiling {
    /// Placed segments, one list per transmitter in input order
    pub segments: Vec<Vec<PlacedSegment>>,
    pub transmitters: Vec<TransmitterPlacement>,
    /// Transmit-side master clock rate range `[low, high]` in Hz
    pub master_clock_rate_range: [f64; 2],
    /// Global occupied band `[left, right]` in Hz
    pub occupied_band: [f64; 2],
    pub base_frequency: f64,
}

/// Round down to a multiple of `step`
fn floor_to(value: f64, step: f64) -> f64 {
    (value / step).floor() * step
}

/// Round up to a multiple of `step`
fn ceil_to(value: f64, step: f64) -> f64 {
    (value / step).ceil() * step
}

/// Places transmitter segments in the shared time-frequency plane
#[derive(Debug, Clone, Default)]
pub struct SpectrumTiler {
    config: TilingConfig,
}

impl SpectrumTiler {
    pub fn new(config: TilingConfig) -> Result<Self, TilingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Tile the per-transmitter segment lists.
    pub fn tile<R: Rng + ?Sized>(
        &self,
        per_transmitter: &[Vec<SegmentDescriptor>],
        rng: &mut R,
    ) -> Result<Tiling, TilingError> {
        for (tx_index, segments) in per_transmitter.iter().enumerate() {
            validate_segments(tx_index, segments)?;
        }

        let base = self.draw_base_frequency(rng);
        let grid = self.config.start_time_grid();

        let mut left = base;
        let mut right = base;
        let mut delta = 0.0;
        // Highest declared edge placed so far, for the non-overlap guarantee
        let mut declared_ceiling = f64::NEG_INFINITY;

        let mut segments_out = Vec::with_capacity(per_transmitter.len());
        let mut transmitters = Vec::with_capacity(per_transmitter.len());

        for (tx_index, segments) in per_transmitter.iter().enumerate() {
            let lower = segments.iter().map(|s| s.lower()).fold(f64::INFINITY, f64::min);
            let upper = segments.iter().map(|s| s.upper()).fold(f64::NEG_INFINITY, f64::max);
            let span = upper - lower;

            let granularity = segments
                .iter()
                .map(|s| s.modulator.tiling_granularity_hz())
                .fold(FREQUENCY_STEP_HZ, f64::max);
            let [min_steps, max_steps] = self.config.guard_steps;
            let increment = granularity * rng.gen_range(min_steps..=max_steps) as f64;
            let mut step = floor_to(span + increment, FREQUENCY_STEP_HZ);

            let mut overlapped = false;
            if self.config.is_overlap
                && tx_index > 0
                && rng.gen_bool(self.config.overlap_probability)
            {
                let ratio = sample_span(self.config.overlap_ratio, rng);
                step = floor_to((1.0 - ratio) * span, FREQUENCY_STEP_HZ);
                overlapped = true;
                debug!(tx_index, ratio, step, "overlapping transmitter with predecessor");
            }

            delta += step;

            let half = lower.abs().max(upper.abs());
            let declared = 2.0 * ceil_to(half / granularity, 1.0) * granularity;

            // Declared bands are wider than the occupied span for one-sided
            // or coarse-granularity segments; keep them apart as well.
            if !self.config.is_overlap && tx_index > 0 {
                let declared_low = base + delta - upper - declared / 2.0;
                let deficit = declared_ceiling - declared_low;
                if deficit > 0.0 {
                    let push = ceil_to(deficit, FREQUENCY_STEP_HZ);
                    trace!(tx_index, push, "widening guard to keep declared bands apart");
                    delta += push;
                }
            }

            let carrier = base + delta - upper;
            let band = [carrier + lower, carrier + upper];
            left = left.min(band[0]);
            right = right.max(band[1]);
            declared_ceiling = declared_ceiling
                .max(carrier + declared / 2.0)
                .max(band[1]);

            let sample_rate = segments.iter().map(|s| s.sample_rate).fold(0.0, f64::max);
            let first_start = grid[rng.gen_range(0..grid.len())];

            let mut start = first_start;
            let mut placed = Vec::with_capacity(segments.len());
            for segment in segments {
                placed.push(PlacedSegment {
                    descriptor: segment.clone(),
                    start_time: start,
                    carrier_frequency: carrier,
                    envelope_bandwidth: declared,
                    envelope_sample_rate: sample_rate,
                });
                start += segment.duration;
            }

            trace!(tx_index, carrier, declared, span, step, "placed transmitter");

            transmitters.push(TransmitterPlacement {
                carrier_frequency: carrier,
                bandwidth: declared,
                sample_rate,
                start_time: first_start,
                duration: start - first_start,
                band,
                overlapped,
            });
            segments_out.push(placed);
        }

        let master_clock_rate_range = self.master_clock_range(&transmitters, right - left, rng);

        debug!(
            transmitters = transmitters.len(),
            left,
            right,
            clock_low = master_clock_rate_range[0],
            clock_high = master_clock_rate_range[1],
            "tiling complete"
        );

        Ok(Tiling {
            segments: segments_out,
            transmitters,
            master_clock_rate_range,
            occupied_band: [left, right],
            base_frequency: base,
        })
    }

    fn draw_base_frequency<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let lo = (self.config.base_frequency[0] / FREQUENCY_STEP_HZ).ceil().max(1.0) as u64;
        let hi = (self.config.base_frequency[1] / FREQUENCY_STEP_HZ).floor() as u64;
        let steps = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
        steps as f64 * FREQUENCY_STEP_HZ
    }

    fn master_clock_range<R: Rng + ?Sized>(
        &self,
        transmitters: &[TransmitterPlacement],
        occupied: f64,
        rng: &mut R,
    ) -> [f64; 2] {
        let nyquist = 2.0 * occupied;
        let fastest = transmitters
            .iter()
            .map(|t| t.sample_rate)
            .filter(|&sr| sr > nyquist)
            .fold(None, |acc: Option<f64>, sr| Some(acc.map_or(sr, |a| a.max(sr))));
        let anchor = fastest.unwrap_or(nyquist);
        let margin = sample_span(self.config.clock_margin, rng);
        [anchor, anchor * (1.0 + margin)]
    }
}

fn validate_segments(tx_index: usize, segments: &[SegmentDescriptor]) -> Result<(), TilingError> {
    if segments.is_empty() {
        return Err(TilingError::NoSegments { tx_index });
    }
    for (segment_index, s) in segments.iter().enumerate() {
        let invalid = |reason: &str| TilingError::InvalidDescriptor {
            tx_index,
            segment_index,
            reason: reason.to_string(),
        };
        if !s.bandwidth.iter().all(|v| v.is_finite()) || s.lower() > s.upper() {
            return Err(invalid("band edges must be finite with lower <= upper"));
        }
        if !s.duration.is_finite() || s.duration < 0.0 {
            return Err(invalid("duration must be finite and non-negative"));
        }
        if !s.sample_rate.is_finite() || s.sample_rate < 0.0 {
            return Err(invalid("sample rate must be finite and non-negative"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModulatorType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn qpsk(bw: f64, duration: f64) -> SegmentDescriptor {
        SegmentDescriptor::symmetric(ModulatorType::Qpsk, bw, 8_000.0, duration)
    }

    fn intervals_disjoint(tiling: &Tiling) -> bool {
        let mut intervals: Vec<[f64; 2]> =
            tiling.transmitters.iter().map(|t| t.declared_interval()).collect();
        intervals.sort_by(|a, b| a[0].total_cmp(&b[0]));
        intervals.windows(2).all(|w| w[0][1] <= w[1][0])
    }

    #[test]
    fn test_two_transmitters_do_not_overlap() {
        let tiler = SpectrumTiler::new(TilingConfig::default()).unwrap();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tiling = tiler
                .tile(&[vec![qpsk(1000.0, 0.01)], vec![qpsk(1000.0, 0.01)]], &mut rng)
                .unwrap();
            let first = &tiling.transmitters[0];
            let second = &tiling.transmitters[1];
            assert_eq!(first.bandwidth, 1000.0);
            assert!(
                second.carrier_frequency - second.bandwidth / 2.0
                    >= first.carrier_frequency + first.bandwidth / 2.0,
                "seed {}: {:?} vs {:?}",
                seed,
                first,
                second
            );
        }
    }

    #[test]
    fn test_mixed_families_keep_declared_bands_apart() {
        let tiler = SpectrumTiler::new(TilingConfig::default()).unwrap();
        let per_tx = vec![
            vec![SegmentDescriptor::symmetric(ModulatorType::Ofdm, 1_300.0, 20_000.0, 0.02)],
            vec![qpsk(250.0, 0.01), qpsk(900.0, 0.01)],
            vec![SegmentDescriptor {
                bandwidth: [0.0, 700.0],
                modulator: ModulatorType::Bpsk,
                sample_rate: 4_000.0,
                duration: 0.005,
            }],
            vec![SegmentDescriptor::symmetric(ModulatorType::Gmsk, 2_100.0, 16_000.0, 0.02)],
        ];
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tiling = tiler.tile(&per_tx, &mut rng).unwrap();
            assert!(tiling.occupied_band[0] <= tiling.occupied_band[1]);
            assert!(intervals_disjoint(&tiling), "seed {}: {:?}", seed, tiling.transmitters);
        }
    }

    #[test]
    fn test_upper_edge_anchoring_and_base_rounding() {
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(11);
        let tiling = tiler.tile(&[vec![qpsk(600.0, 0.01)]], &mut rng).unwrap();
        assert_eq!(tiling.base_frequency % 100.0, 0.0);
        assert!((100.0..=3000.0).contains(&tiling.base_frequency));
        let tx = &tiling.transmitters[0];
        // Upper edge sits at base + cumulative delta, a multiple of 100
        let upper_edge = tx.carrier_frequency + 300.0;
        assert!(((upper_edge - tiling.base_frequency) % 100.0).abs() < 1e-9);
        // Margin from the base
        assert!(tx.band[0] > tiling.base_frequency);
        assert_eq!(tiling.occupied_band, [tiling.base_frequency, tx.band[1]]);
    }

    #[test]
    fn test_segments_back_to_back() {
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(5);
        let tiling = tiler
            .tile(&[vec![qpsk(500.0, 0.01), qpsk(500.0, 0.02), qpsk(500.0, 0.005)]], &mut rng)
            .unwrap();
        let placed = &tiling.segments[0];
        let grid = TilingConfig::default().start_time_grid();
        assert!(grid.iter().any(|g| (g - placed[0].start_time).abs() < 1e-12));
        for w in placed.windows(2) {
            assert!((w[1].start_time - w[0].end_time()).abs() < 1e-12);
            assert_eq!(w[0].carrier_frequency, w[1].carrier_frequency);
        }
        assert!((tiling.transmitters[0].duration - 0.035).abs() < 1e-12);
    }

    #[test]
    fn test_start_time_grid() {
        let grid = TilingConfig::default().start_time_grid();
        assert_eq!(grid.len(), 100);
        assert!((grid[0] - 0.001).abs() < 1e-12);
        assert!((grid[99] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_declared_bandwidth_granularity() {
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(1);
        let tiling = tiler
            .tile(
                &[
                    vec![qpsk(1_050.0, 0.01)],
                    vec![SegmentDescriptor::symmetric(ModulatorType::Ofdm, 1_050.0, 8_000.0, 0.01)],
                ],
                &mut rng,
            )
            .unwrap();
        // half = 525 -> ceil to 600 with 100 Hz steps, 1000 with kHz steps
        assert_eq!(tiling.transmitters[0].bandwidth, 1_200.0);
        assert_eq!(tiling.transmitters[1].bandwidth, 2_000.0);
    }

    #[test]
    fn test_zero_bandwidth_uses_increment_only() {
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(2);
        let tiling = tiler.tile(&[vec![qpsk(0.0, 0.01)]], &mut rng).unwrap();
        let tx = &tiling.transmitters[0];
        assert_eq!(tx.bandwidth, 0.0);
        let step = tx.carrier_frequency - tiling.base_frequency;
        assert!((200.0..=1000.0).contains(&step), "step = {}", step);
    }

    #[test]
    fn test_overlap_shrinks_move_step() {
        let config = TilingConfig {
            is_overlap: true,
            overlap_probability: 1.0,
            overlap_ratio: [0.5, 0.5],
            ..Default::default()
        };
        let tiler = SpectrumTiler::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let tiling = tiler
            .tile(&[vec![qpsk(1000.0, 0.01)], vec![qpsk(1000.0, 0.01)]], &mut rng)
            .unwrap();
        assert!(!tiling.transmitters[0].overlapped);
        assert!(tiling.transmitters[1].overlapped);
        let gap = tiling.transmitters[1].carrier_frequency - tiling.transmitters[0].carrier_frequency;
        assert_eq!(gap, 500.0);
        assert!(tiling.transmitters[1].band[0] < tiling.transmitters[0].band[1]);
    }

    #[test]
    fn test_master_clock_range() {
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(4);

        // Sample rate far above twice the occupied band
        let fast = SegmentDescriptor::symmetric(ModulatorType::Qpsk, 500.0, 1e6, 0.01);
        let tiling = tiler.tile(&[vec![fast]], &mut rng).unwrap();
        assert_eq!(tiling.master_clock_rate_range[0], 1e6);
        assert!(tiling.master_clock_rate_range[1] >= 1.05e6);
        assert!(tiling.master_clock_rate_range[1] <= 1.25e6);

        // Sample rate below Nyquist of the occupied band
        let slow = SegmentDescriptor::symmetric(ModulatorType::Qpsk, 500.0, 10.0, 0.01);
        let tiling = tiler.tile(&[vec![slow]], &mut rng).unwrap();
        let occupied = tiling.occupied_band[1] - tiling.occupied_band[0];
        assert_eq!(tiling.master_clock_rate_range[0], 2.0 * occupied);
    }

    #[test]
    fn test_empty_and_invalid_input() {
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(0);
        let tiling = tiler.tile(&[], &mut rng).unwrap();
        assert_eq!(tiling.occupied_band[0], tiling.occupied_band[1]);
        assert!(tiling.transmitters.is_empty());

        assert_eq!(
            tiler.tile(&[vec![]], &mut rng),
            Err(TilingError::NoSegments { tx_index: 0 })
        );

        let bad = SegmentDescriptor {
            bandwidth: [10.0, -10.0],
            modulator: ModulatorType::Bpsk,
            sample_rate: 1.0,
            duration: 1.0,
        };
        assert!(matches!(
            tiler.tile(&[vec![bad]], &mut rng),
            Err(TilingError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TilingConfig {
            overlap_probability: 1.5,
            ..Default::default()
        };
        assert!(SpectrumTiler::new(config).is_err());
    }
}
