//! Terrain height models

use rfscene_core::config::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Terrain {
    /// Constant ground height
    Flat {
        #[serde(rename = "Height", default)]
        height: f64,
    },
    /// Two crossed sinusoids: `amplitude/2 * (sin(2πx/λ) + cos(2πy/λ))`
    Rolling {
        #[serde(rename = "Amplitude")]
        amplitude: f64,
        #[serde(rename = "Wavelength")]
        wavelength: f64,
    },
}

impl Default for Terrain {
    fn default() -> Self {
        Terrain::Flat { height: 0.0 }
    }
}

impl Terrain {
    /// Ground height in meters at `(x, y)`
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        match *self {
            Terrain::Flat { height } => height,
            Terrain::Rolling {
                amplitude,
                wavelength,
            } => {
                let k = 2.0 * PI / wavelength;
                0.5 * amplitude * ((k * x).sin() + (k * y).cos())
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match *self {
            Terrain::Flat { height } if !height.is_finite() => Err(ConfigError::ValidationError(
                "Environment.Terrain.Height must be finite".to_string(),
            )),
            Terrain::Rolling {
                amplitude,
                wavelength,
            } if !amplitude.is_finite() || !(wavelength > 0.0) => Err(ConfigError::ValidationError(
                "Environment.Terrain requires finite Amplitude and Wavelength > 0".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
