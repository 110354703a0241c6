//! Baseband modulator
//!
//! Maps message bits onto complex baseband with rectangular pulses:
//!
//! - **Linear** (OOK, 4ASK, PSK, QAM, APSK): Gray-coded constellations with
//!   unit average energy
//! - **Continuous phase** (FSK, MSK, CPFSK, GMSK, GFSK): phase accumulation of
//!   an NRZ frequency pulse, Gaussian-filtered for GMSK/GFSK
//! - **OFDM**: QPSK on a small set of subcarriers spanning the symbol rate
//!
//! Multi-antenna transmitters get one copy per antenna, scaled by `1/sqrt(N)`
//! so the total radiated power does not depend on the array size.

use num_complex::Complex64;
use rfscene_core::stages::{Modulate, ModulationRequest, StageError, StageResult};
use rfscene_core::types::{IQSample, Message, ModulatorType, SignalSegment};
use std::f64::consts::PI;
use tracing::trace;

/// Subcarriers per OFDM block
pub const OFDM_SUBCARRIERS: usize = 4;

#[derive(Debug, Clone)]
pub struct BasebandModulator {
    /// Bandwidth-time product of the GMSK Gaussian filter
    pub gmsk_bt: f64,
    /// Bandwidth-time product of the GFSK Gaussian filter
    pub gfsk_bt: f64,
}

impl Default for BasebandModulator {
    fn default() -> Self {
        Self {
            gmsk_bt: 0.3,
            gfsk_bt: 0.5,
        }
    }
}

impl BasebandModulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-antenna baseband waveform for `symbols`
    pub fn waveform(&self, modulator: ModulatorType, symbols: &[usize], sps: usize) -> Vec<IQSample> {
        match modulator {
            ModulatorType::Fsk2 => continuous_phase(&nrz(symbols, 2), sps, 1.0, None),
            ModulatorType::Fsk4 => continuous_phase(&nrz(symbols, 4), sps, 1.0, None),
            ModulatorType::Msk | ModulatorType::Cpfsk => continuous_phase(&nrz(symbols, 2), sps, 0.5, None),
            ModulatorType::Gmsk => continuous_phase(&nrz(symbols, 2), sps, 0.5, Some(self.gmsk_bt)),
            ModulatorType::Gfsk => continuous_phase(&nrz(symbols, 2), sps, 0.5, Some(self.gfsk_bt)),
            ModulatorType::Ofdm => ofdm(symbols, sps),
            linear => {
                let table = constellation(linear);
                symbols
                    .iter()
                    .flat_map(|&s| std::iter::repeat(table[s % table.len()]).take(sps))
                    .collect()
            }
        }
    }
}

impl Modulate for BasebandModulator {
    fn modulate(&mut self, message: &Message, request: &ModulationRequest<'_>) -> StageResult<SignalSegment> {
        if message.is_empty() {
            return Err(StageError::EmptyMessage);
        }
        if request.samples_per_symbol == 0 {
            return Err(StageError::InvalidInput("samples per symbol is zero".to_string()));
        }
        let bps = request.modulator.bits_per_symbol();
        if message.data.len() < bps {
            return Err(StageError::InvalidInput(format!(
                "{} needs {} bits per symbol, message has {}",
                request.modulator,
                bps,
                message.data.len()
            )));
        }

        // Trailing bits short of a full symbol are dropped
        let symbols: Vec<usize> = message
            .data
            .chunks_exact(bps)
            .map(|chunk| chunk.iter().fold(0usize, |acc, &b| (acc << 1) | (b & 1) as usize))
            .collect();
        let base = self.waveform(request.modulator, &symbols, request.samples_per_symbol);

        let num_antennas = request.num_antennas.max(1);
        let scale = 1.0 / (num_antennas as f64).sqrt();
        let stream: Vec<IQSample> = base.iter().map(|&s| s * scale).collect();
        let streams = vec![stream; num_antennas];

        let occupied = request.modulator.occupied_bandwidth(message.symbol_rate);
        trace!(
            frame_id = request.frame_id,
            tx_id = request.tx_id,
            segment_index = request.segment_index,
            samples = base.len(),
            "segment modulated"
        );

        Ok(SignalSegment {
            streams,
            bandwidth: [-occupied / 2.0, occupied / 2.0],
            modulator: request.modulator,
            sample_rate: message.symbol_rate * request.samples_per_symbol as f64,
            symbol_rate: message.symbol_rate,
            num_antennas,
            start_time: request.placement.start_time,
            carrier_frequency: request.placement.carrier_frequency,
        })
    }
}

/// Inverse Gray code
fn gray_decode(mut g: usize) -> usize {
    let mut b = g;
    while g > 1 {
        g >>= 1;
        b ^= g;
    }
    b
}

/// Symbol table of a linear modulation, indexed by the bit group value
pub fn constellation(modulator: ModulatorType) -> Vec<IQSample> {
    match modulator {
        ModulatorType::Ook => vec![Complex64::new(0.0, 0.0), Complex64::new(2f64.sqrt(), 0.0)],
        ModulatorType::Ask4 => {
            let a = 1.0 / 3.5f64.sqrt();
            (0..4).map(|i| Complex64::new(gray_decode(i) as f64 * a, 0.0)).collect()
        }
        ModulatorType::Bpsk => vec![Complex64::new(1.0, 0.0), Complex64::new(-1.0, 0.0)],
        ModulatorType::Qpsk => psk(4),
        ModulatorType::Psk8 => psk(8),
        ModulatorType::Qam16 => qam(16),
        ModulatorType::Qam64 => qam(64),
        ModulatorType::Apsk16 => {
            // 4+12 rings, outer/inner radius ratio 2.7
            let ratio: f64 = 2.7;
            let r1 = (16.0 / (4.0 + 12.0 * ratio * ratio)).sqrt();
            let r2 = ratio * r1;
            (0..16)
                .map(|i| {
                    if i < 4 {
                        Complex64::from_polar(r1, PI / 4.0 + PI / 2.0 * i as f64)
                    } else {
                        Complex64::from_polar(r2, PI / 12.0 + PI / 6.0 * (i - 4) as f64)
                    }
                })
                .collect()
        }
        // Non-linear schemes have no table; BPSK stands in
        _ => vec![Complex64::new(1.0, 0.0), Complex64::new(-1.0, 0.0)],
    }
}

fn psk(m: usize) -> Vec<IQSample> {
    let offset = if m == 4 { PI / 4.0 } else { 0.0 };
    (0..m)
        .map(|i| Complex64::from_polar(1.0, offset + 2.0 * PI * gray_decode(i) as f64 / m as f64))
        .collect()
}

fn qam(m: usize) -> Vec<IQSample> {
    let side = (m as f64).sqrt() as usize;
    let half_bits = side.trailing_zeros();
    let norm = (2.0 * (m as f64 - 1.0) / 3.0).sqrt();
    (0..m)
        .map(|i| {
            let level = |bits: usize| (2 * gray_decode(bits)) as f64 - (side as f64 - 1.0);
            let i_bits = i >> half_bits;
            let q_bits = i & (side - 1);
            Complex64::new(level(i_bits) / norm, level(q_bits) / norm)
        })
        .collect()
}

/// Symmetric NRZ levels `{-(M-1), ..., M-1}` in steps of 2
fn nrz(symbols: &[usize], m: usize) -> Vec<f64> {
    symbols
        .iter()
        .map(|&s| (2 * gray_decode(s % m)) as f64 - (m as f64 - 1.0))
        .collect()
}

/// Gaussian pulse taps spanning three symbols, unit sum
fn gaussian_taps(bt: f64, sps: usize) -> Vec<f64> {
    let sigma = (2f64.ln()).sqrt() / (2.0 * PI * bt.max(1e-3));
    let half = (3 * sps / 2) as isize;
    let taps: Vec<f64> = (-half..=half)
        .map(|m| {
            let t = m as f64 / sps as f64;
            (-t * t / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Continuous-phase modulation with modulation index `h`:
/// `phi[n+1] = phi[n] + pi * h * a[n] / sps`
fn continuous_phase(levels: &[f64], sps: usize, h: f64, gaussian_bt: Option<f64>) -> Vec<IQSample> {
    let mut freq: Vec<f64> = levels
        .iter()
        .flat_map(|&a| std::iter::repeat(a).take(sps))
        .collect();

    if let Some(bt) = gaussian_bt {
        let taps = gaussian_taps(bt, sps);
        let half = taps.len() / 2;
        let input = freq.clone();
        for (n, out) in freq.iter_mut().enumerate() {
            *out = taps
                .iter()
                .enumerate()
                .filter_map(|(k, &tap)| {
                    (n + k).checked_sub(half).and_then(|i| input.get(i)).map(|&x| x * tap)
                })
                .sum();
        }
    }

    let step = PI * h / sps as f64;
    let mut phase = 0.0f64;
    freq.iter()
        .map(|&a| {
            let sample = Complex64::from_polar(1.0, phase);
            phase = (phase + step * a).rem_euclid(2.0 * PI);
            sample
        })
        .collect()
}

/// QPSK over `OFDM_SUBCARRIERS` carriers spaced `Rs / K` apart
fn ofdm(symbols: &[usize], sps: usize) -> Vec<IQSample> {
    let table = psk(4);
    let k = OFDM_SUBCARRIERS;
    let block_len = k * sps;
    let total = symbols.len() * sps;
    let scale = 1.0 / (k as f64).sqrt();
    let center = (k as f64 - 1.0) / 2.0;

    let mut out = Vec::with_capacity(total);
    for block in symbols.chunks(k) {
        for n in 0..block_len {
            if out.len() == total {
                break;
            }
            let sample: Complex64 = block
                .iter()
                .enumerate()
                .map(|(c, &s)| {
                    let f = (c as f64 - center) / block_len as f64;
                    table[s % 4] * Complex64::from_polar(scale, 2.0 * PI * f * n as f64)
                })
                .sum();
            out.push(sample);
        }
    }
    out
}
