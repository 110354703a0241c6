//! Receive processing
//!
//! Keeps the composite IQ of every receiver as frame data and annotates
//! each receiver with its links: distance, path loss and the SNR of every
//! segment it heard.

use rfscene_core::config::{ConfigError, ConfigResult};
use rfscene_core::stages::{
    FrameAnnotation, FrameData, LinkAnnotation, ReceiveProcessor, ReceiverCapture, ReceiverSignal,
    RxAnnotation, StageError, StageResult,
};
use rfscene_core::types::{FrameId, RxInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Typed `Receiver` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReceiverConfig {
    /// Links below this SNR are left out of the annotation
    #[serde(rename = "MinLinkSNR")]
    pub min_link_snr_db: Option<f64>,
    /// Store IQ in the frame data; annotation-only runs turn this off
    #[serde(rename = "KeepIQ")]
    pub keep_iq: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            min_link_snr_db: None,
            keep_iq: true,
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(snr) = self.min_link_snr_db {
            if !snr.is_finite() {
                return Err(ConfigError::ValidationError(
                    "Receiver.MinLinkSNR must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn watts_to_dbm(watts: f64) -> f64 {
    10.0 * watts.max(1e-30).log10() + 30.0
}

#[derive(Debug, Clone, Default)]
pub struct EnergyReceiver {
    config: ReceiverConfig,
}

impl EnergyReceiver {
    pub fn new(config: ReceiverConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl ReceiveProcessor for EnergyReceiver {
    fn process(
        &mut self,
        frame_id: FrameId,
        signals: Vec<ReceiverSignal>,
        rx_infos: &[RxInfo],
    ) -> StageResult<(FrameData, FrameAnnotation)> {
        let mut data = FrameData::empty(frame_id);
        let mut annotation = FrameAnnotation::new(frame_id);

        for signal in signals {
            let rx = rx_infos.iter().find(|r| r.id == signal.rx_id).ok_or_else(|| {
                StageError::InvalidInput(format!("signal for unknown receiver {}", signal.rx_id))
            })?;
            let noise_power_dbm = watts_to_dbm(signal.noise_power);

            let links: Vec<LinkAnnotation> = signal
                .components
                .iter()
                .map(|c| LinkAnnotation {
                    tx_id: c.tx_id,
                    segment_index: c.segment_index,
                    distance_m: c.distance_m,
                    path_loss_db: c.path_loss_db,
                    snr_db: c.received_power_dbm - noise_power_dbm,
                })
                .filter(|l| self.config.min_link_snr_db.map_or(true, |min| l.snr_db >= min))
                .collect();

            debug!(
                frame_id,
                rx_id = rx.id,
                links = links.len(),
                noise_power_dbm,
                "receiver processed"
            );

            annotation.receivers.push(RxAnnotation {
                id: rx.id,
                center_frequency: signal.center_frequency,
                sample_rate: signal.sample_rate,
                num_receive_antennas: rx.num_receive_antennas,
                position: rx.site.position,
                noise_power_dbm,
                links,
            });

            data.receivers.push(ReceiverCapture {
                rx_id: signal.rx_id,
                sample_rate: signal.sample_rate,
                center_frequency: signal.center_frequency,
                streams: if self.config.keep_iq { signal.streams } else { Vec::new() },
            });
        }

        Ok((data, annotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;
    use rfscene_core::stages::ReceivedComponent;
    use rfscene_core::types::{ModulatorType, SiteConfig};

    fn rx() -> RxInfo {
        RxInfo {
            id: 4,
            site: SiteConfig::new([1.0, 2.0, 3.0], [0.0; 2], [0.0; 3], 2),
            center_frequency: 1500.0,
            bandwidth: 3000.0,
            sample_rate: 8000.0,
            num_receive_antennas: 2,
            noise_figure_db: 5.0,
        }
    }

    fn component(segment_index: usize, power_dbm: f64) -> ReceivedComponent {
        ReceivedComponent {
            tx_id: 1,
            segment_index,
            modulator: ModulatorType::Qpsk,
            carrier_frequency: 1500.0,
            bandwidth: [-675.0, 675.0],
            symbol_rate: 1000.0,
            start_time: 0.0,
            duration: 0.1,
            distance_m: 100.0,
            path_loss_db: 80.0,
            received_power_dbm: power_dbm,
        }
    }

    fn signal() -> ReceiverSignal {
        ReceiverSignal {
            rx_id: 4,
            sample_rate: 8000.0,
            center_frequency: 1500.0,
            streams: vec![vec![Complex64::new(0.0, 0.0); 16]; 2],
            // -100 dBm
            noise_power: 1e-13,
            components: vec![component(0, -50.0), component(1, -95.0)],
        }
    }

    #[test]
    fn test_links_and_snr() {
        let mut receiver = EnergyReceiver::default();
        let (data, ann) = receiver.process(3, vec![signal()], &[rx()]).unwrap();
        assert_eq!(data.frame_id, 3);
        assert_eq!(data.receivers.len(), 1);
        assert_eq!(data.receivers[0].streams.len(), 2);
        let r = &ann.receivers[0];
        assert!((r.noise_power_dbm + 100.0).abs() < 1e-9);
        assert_eq!(r.links.len(), 2);
        assert!((r.links[0].snr_db - 50.0).abs() < 1e-9);
        assert_eq!(r.position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_min_snr_filters_links() {
        let config = ReceiverConfig {
            min_link_snr_db: Some(10.0),
            keep_iq: false,
        };
        let mut receiver = EnergyReceiver::new(config).unwrap();
        let (data, ann) = receiver.process(1, vec![signal()], &[rx()]).unwrap();
        assert_eq!(ann.receivers[0].links.len(), 1);
        assert!(data.receivers[0].streams.is_empty());
    }

    #[test]
    fn test_unknown_receiver_is_an_error() {
        let mut receiver = EnergyReceiver::default();
        assert!(receiver.process(1, vec![signal()], &[]).is_err());
    }
}
