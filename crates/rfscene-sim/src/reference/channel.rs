//! Free-space propagation
//!
//! For every receiver, each transmitted segment is delayed to its start
//! time plus the propagation delay, shifted from its carrier to the
//! receiver's tuning frequency (plus Doppler), scaled by free-space path
//! loss and summed. Receiver noise is added last as AWGN.
//!
//! Carrier frequencies in a frame are offsets within the tiled band; path
//! loss and Doppler are evaluated at `CarrierReferenceHz` plus that offset.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rfscene_core::config::{ConfigError, ConfigResult};
use rfscene_core::coordinates::{fspl_db, SPEED_OF_LIGHT};
use rfscene_core::stages::{
    ChannelPropagator, ReceivedComponent, ReceiverSignal, StageError, StageResult, Transmission,
};
use rfscene_core::types::{ArrayType, FrameId, IQSample, RxInfo, SignalSegment, TxInfo};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{trace, warn};

/// Typed `Channel` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChannelConfig {
    /// RF frequency the frame's band is placed at
    pub carrier_reference_hz: f64,
    /// Thermal noise density in dBW/Hz, before the receiver noise figure
    pub noise_floor_dbw_hz: f64,
    /// Distances are clamped to at least this many meters
    pub min_distance_m: f64,
    pub doppler: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            carrier_reference_hz: 2.4e9,
            noise_floor_dbw_hz: -204.0,
            min_distance_m: 1.0,
            doppler: true,
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.carrier_reference_hz > 0.0) {
            return Err(ConfigError::ValidationError(
                "Channel.CarrierReferenceHz must be positive".to_string(),
            ));
        }
        if !(self.min_distance_m > 0.0) {
            return Err(ConfigError::ValidationError(
                "Channel.MinDistanceM must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Noise power per sample in W for a receiver
    pub fn noise_power_linear(&self, sample_rate: f64, noise_figure_db: f64) -> f64 {
        10.0_f64.powf((self.noise_floor_dbw_hz + noise_figure_db) / 10.0) * sample_rate
    }
}

pub struct FreeSpaceChannel {
    config: ChannelConfig,
    rng: StdRng,
}

impl FreeSpaceChannel {
    pub fn new(config: ChannelConfig, rng: StdRng) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

/// Latest segment end across all transmissions, seconds
fn capture_duration(transmissions: &[Transmission]) -> f64 {
    transmissions
        .iter()
        .flat_map(|t| t.segments.iter())
        .map(|(_, s)| s.start_time + s.duration())
        .fold(0.0, f64::max)
}

/// Rate of change of the distance between two sites, m/s
fn range_rate(tx: &TxInfo, rx: &RxInfo, distance: f64) -> f64 {
    (0..3)
        .map(|i| (tx.site.position[i] - rx.site.position[i]) * (tx.site.velocity[i] - rx.site.velocity[i]))
        .sum::<f64>()
        / distance
}

/// Per-element phase of a plane wave arriving at `azimuth_rad`
fn steering(rx: &RxInfo, azimuth_rad: f64) -> Vec<Complex64> {
    let n = rx.num_receive_antennas.max(1);
    let (rows, cols) = rx.site.array_type.layout(n);
    let spacing = rx.site.element_spacing;
    (0..n)
        .map(|element| match rx.site.array_type {
            ArrayType::Isotropic => Complex64::new(1.0, 0.0),
            _ => {
                let col = (element % cols.max(1)) as f64;
                let row = (element / cols.max(1)).min(rows.saturating_sub(1)) as f64;
                let phase = 2.0 * PI * spacing * (col * azimuth_rad.sin() + row * azimuth_rad.cos());
                Complex64::from_polar(1.0, phase)
            }
        })
        .collect()
}

/// Sum of the transmit antenna streams
fn combine(segment: &SignalSegment) -> Vec<IQSample> {
    let mut out = vec![Complex64::new(0.0, 0.0); segment.len()];
    for stream in &segment.streams {
        for (o, s) in out.iter_mut().zip(stream) {
            *o += s;
        }
    }
    out
}

impl ChannelPropagator for FreeSpaceChannel {
    fn propagate(
        &mut self,
        transmissions: &[Transmission],
        frame_id: FrameId,
        tx_infos: &[TxInfo],
        rx_infos: &[RxInfo],
    ) -> StageResult<Vec<ReceiverSignal>> {
        let duration = capture_duration(transmissions);
        let mut signals = Vec::with_capacity(rx_infos.len());

        for rx in rx_infos {
            if !(rx.sample_rate > 0.0) {
                return Err(StageError::InvalidInput(format!(
                    "receiver {} has sample rate {}",
                    rx.id, rx.sample_rate
                )));
            }
            let fs = rx.sample_rate;
            // Tolerate rounding in start + duration
            let num_samples = (duration * fs - 1e-6).ceil().max(0.0) as usize;
            let num_streams = rx.num_receive_antennas.max(1);
            let mut streams = vec![vec![Complex64::new(0.0, 0.0); num_samples]; num_streams];
            let mut components = Vec::new();

            for transmission in transmissions {
                let Some(tx) = tx_infos.iter().find(|t| t.id == transmission.tx_id) else {
                    warn!(frame_id, tx_id = transmission.tx_id, "transmission without transmitter info");
                    continue;
                };
                let distance = rx.site.distance_to(&tx.site).max(self.config.min_distance_m);
                let delay = distance / SPEED_OF_LIGHT;
                let rr = range_rate(tx, rx, distance);
                let azimuth = (tx.site.position[1] - rx.site.position[1])
                    .atan2(tx.site.position[0] - rx.site.position[0])
                    - rx.site.orientation[0].to_radians();
                let steer = steering(rx, azimuth);

                for (segment_index, segment) in &transmission.segments {
                    let rf_hz = self.config.carrier_reference_hz + segment.carrier_frequency;
                    let path_loss_db = fspl_db(distance, rf_hz);
                    let rx_power_dbm = tx.power_dbm - path_loss_db;
                    // dBm to linear voltage
                    let amplitude = 10.0_f64.powf((rx_power_dbm - 30.0) / 20.0);
                    let doppler_hz = if self.config.doppler {
                        -rr * rf_hz / SPEED_OF_LIGHT
                    } else {
                        0.0
                    };
                    let shift_hz = segment.carrier_frequency - rx.center_frequency + doppler_hz;

                    let source = combine(segment);
                    let arrival = segment.start_time + delay;
                    let first = (arrival * fs).ceil().max(0.0) as usize;
                    for n in first..num_samples {
                        let t = n as f64 / fs;
                        let index = ((t - arrival) * segment.sample_rate).floor();
                        if index < 0.0 {
                            continue;
                        }
                        let Some(&s) = source.get(index as usize) else {
                            break;
                        };
                        let sample = s * amplitude * Complex64::from_polar(1.0, 2.0 * PI * shift_hz * t);
                        for (stream, w) in streams.iter_mut().zip(&steer) {
                            stream[n] += sample * w;
                        }
                    }

                    components.push(ReceivedComponent {
                        tx_id: tx.id,
                        segment_index: *segment_index,
                        modulator: segment.modulator,
                        carrier_frequency: segment.carrier_frequency,
                        bandwidth: segment.bandwidth,
                        symbol_rate: segment.symbol_rate,
                        start_time: segment.start_time,
                        duration: segment.duration(),
                        distance_m: distance,
                        path_loss_db,
                        received_power_dbm: rx_power_dbm + 10.0 * segment.mean_power().max(1e-30).log10(),
                    });
                }
            }

            let noise_power = self.config.noise_power_linear(fs, rx.noise_figure_db);
            // per I/Q component
            if let Ok(normal) = Normal::new(0.0, (noise_power / 2.0).sqrt()) {
                for stream in streams.iter_mut() {
                    for sample in stream.iter_mut() {
                        *sample += Complex64::new(normal.sample(&mut self.rng), normal.sample(&mut self.rng));
                    }
                }
            }

            trace!(
                frame_id,
                rx_id = rx.id,
                samples = num_samples,
                components = components.len(),
                "receiver signal propagated"
            );

            signals.push(ReceiverSignal {
                rx_id: rx.id,
                sample_rate: fs,
                center_frequency: rx.center_frequency,
                streams,
                noise_power,
                components,
            });
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rfscene_core::types::{ModulatorType, SiteConfig};

    fn tx(id: u32, x: f64) -> TxInfo {
        TxInfo {
            id,
            site: SiteConfig::new([x, 0.0, 10.0], [0.0; 2], [0.0; 3], 1),
            carrier_frequency: 1500.0,
            bandwidth: 1400.0,
            sample_rate: 8000.0,
            num_transmit_antennas: 1,
            power_dbm: 30.0,
        }
    }

    fn rx(antennas: usize) -> RxInfo {
        RxInfo {
            id: 10,
            site: SiteConfig::new([0.0, 0.0, 10.0], [0.0; 2], [0.0; 3], antennas),
            center_frequency: 1500.0,
            bandwidth: 3000.0,
            sample_rate: 8000.0,
            num_receive_antennas: antennas,
            noise_figure_db: 5.0,
        }
    }

    fn transmission(id: u32, start: f64) -> Transmission {
        Transmission {
            tx_id: id,
            segments: vec![(
                0,
                SignalSegment {
                    streams: vec![vec![Complex64::new(1.0, 0.0); 800]],
                    bandwidth: [-675.0, 675.0],
                    modulator: ModulatorType::Bpsk,
                    sample_rate: 8000.0,
                    symbol_rate: 1000.0,
                    num_antennas: 1,
                    start_time: start,
                    carrier_frequency: 1500.0,
                },
            )],
        }
    }

    fn channel(doppler: bool) -> FreeSpaceChannel {
        let config = ChannelConfig {
            doppler,
            ..Default::default()
        };
        FreeSpaceChannel::new(config, StdRng::seed_from_u64(9)).unwrap()
    }

    #[test]
    fn test_segment_lands_at_start_time() {
        let mut ch = channel(false);
        let out = ch
            .propagate(&[transmission(1, 0.05)], 1, &[tx(1, 100.0)], &[rx(1)])
            .unwrap();
        assert_eq!(out.len(), 1);
        let sig = &out[0];
        // 0.05 s start + 0.1 s of signal at 8 kHz
        assert_eq!(sig.streams[0].len(), 1200);
        let noise_rms = sig.noise_power.sqrt();
        assert!(sig.streams[0][100].norm() < 10.0 * noise_rms);
        assert!(sig.streams[0][600].norm() > 100.0 * noise_rms);
        assert_eq!(sig.components.len(), 1);
        assert!(sig.components[0].path_loss_db > 0.0);
    }

    #[test]
    fn test_path_loss_grows_with_distance() {
        let mut ch = channel(false);
        let near = ch.propagate(&[transmission(1, 0.0)], 1, &[tx(1, 50.0)], &[rx(1)]).unwrap();
        let far = ch.propagate(&[transmission(1, 0.0)], 1, &[tx(1, 500.0)], &[rx(1)]).unwrap();
        let pl_near = near[0].components[0].path_loss_db;
        let pl_far = far[0].components[0].path_loss_db;
        assert!((pl_far - pl_near - 20.0).abs() < 0.1);
    }

    #[test]
    fn test_receive_antennas_get_streams() {
        let mut ch = channel(true);
        let out = ch.propagate(&[transmission(1, 0.0)], 1, &[tx(1, 100.0)], &[rx(3)]).unwrap();
        assert_eq!(out[0].streams.len(), 3);
    }

    #[test]
    fn test_unknown_transmitter_skipped() {
        let mut ch = channel(true);
        let out = ch.propagate(&[transmission(7, 0.0)], 1, &[tx(1, 100.0)], &[rx(1)]).unwrap();
        assert!(out[0].components.is_empty());
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        let mut ch = channel(true);
        let mut bad = rx(1);
        bad.sample_rate = 0.0;
        assert!(ch.propagate(&[], 1, &[], &[bad]).is_err());
    }
}
