//! Weather state and its frame-to-frame evolution

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rfscene_core::config::{validate_span, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Weather {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    /// m/s
    pub wind_speed: f64,
    /// Degrees in `[0, 360)`
    pub wind_direction: f64,
    /// mm/h
    pub precipitation: f64,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            humidity: 50.0,
            pressure: 1013.25,
            wind_speed: 3.0,
            wind_direction: 0.0,
            precipitation: 0.0,
        }
    }
}

/// Standard deviations of the per-frame Gaussian perturbation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WeatherEvolution {
    pub temperature_variation: f64,
    pub humidity_variation: f64,
    pub pressure_variation: f64,
    pub wind_speed_variation: f64,
    pub wind_direction_variation: f64,
    pub precipitation_variation: f64,
}

impl Default for WeatherEvolution {
    fn default() -> Self {
        Self {
            temperature_variation: 0.5,
            humidity_variation: 1.0,
            pressure_variation: 0.5,
            wind_speed_variation: 0.5,
            wind_direction_variation: 5.0,
            precipitation_variation: 0.1,
        }
    }
}

impl WeatherEvolution {
    fn sigmas(&self) -> [f64; 6] {
        [
            self.temperature_variation,
            self.humidity_variation,
            self.pressure_variation,
            self.wind_speed_variation,
            self.wind_direction_variation,
            self.precipitation_variation,
        ]
    }
}

/// Allowed range of each scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WeatherConstraints {
    pub temperature: [f64; 2],
    pub humidity: [f64; 2],
    pub pressure: [f64; 2],
    pub wind_speed: [f64; 2],
    pub precipitation: [f64; 2],
}

impl Default for WeatherConstraints {
    fn default() -> Self {
        Self {
            temperature: [-40.0, 50.0],
            humidity: [0.0, 100.0],
            pressure: [950.0, 1050.0],
            wind_speed: [0.0, 40.0],
            precipitation: [0.0, 100.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WeatherConfig {
    pub initial: Weather,
    pub evolution: WeatherEvolution,
    pub constraints: WeatherConstraints,
}

impl WeatherConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.evolution.sigmas().iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ConfigError::ValidationError(
                "Environment.Weather.Evolution variations must be non-negative".to_string(),
            ));
        }
        let c = &self.constraints;
        validate_span("Weather.Constraints.Temperature", c.temperature)?;
        validate_span("Weather.Constraints.Humidity", c.humidity)?;
        validate_span("Weather.Constraints.Pressure", c.pressure)?;
        validate_span("Weather.Constraints.WindSpeed", c.wind_speed)?;
        validate_span("Weather.Constraints.Precipitation", c.precipitation)?;
        Ok(())
    }

    /// Initial weather, clamped into the constraints
    pub fn initial_state(&self) -> Weather {
        let mut w = self.initial.clone();
        self.clamp(&mut w);
        w
    }

    /// Advance the weather by one frame.
    ///
    /// A zero variation leaves that scalar exactly unchanged.
    pub fn evolve<R: Rng + ?Sized>(&self, weather: &mut Weather, rng: &mut R) {
        let e = &self.evolution;
        perturb(&mut weather.temperature, e.temperature_variation, rng);
        perturb(&mut weather.humidity, e.humidity_variation, rng);
        perturb(&mut weather.pressure, e.pressure_variation, rng);
        perturb(&mut weather.wind_speed, e.wind_speed_variation, rng);
        perturb(&mut weather.wind_direction, e.wind_direction_variation, rng);
        perturb(&mut weather.precipitation, e.precipitation_variation, rng);
        self.clamp(weather);
    }

    fn clamp(&self, w: &mut Weather) {
        let c = &self.constraints;
        w.temperature = w.temperature.clamp(c.temperature[0], c.temperature[1]);
        w.humidity = w.humidity.clamp(c.humidity[0], c.humidity[1]);
        w.pressure = w.pressure.clamp(c.pressure[0], c.pressure[1]);
        w.wind_speed = w.wind_speed.clamp(c.wind_speed[0], c.wind_speed[1]);
        w.precipitation = w.precipitation.clamp(c.precipitation[0], c.precipitation[1]);
        w.wind_direction = w.wind_direction.rem_euclid(360.0);
        // rem_euclid rounds tiny negative inputs up to exactly 360
        if w.wind_direction >= 360.0 {
            w.wind_direction = 0.0;
        }
    }
}

fn perturb<R: Rng + ?Sized>(value: &mut f64, sigma: f64, rng: &mut R) {
    if sigma <= 0.0 {
        return;
    }
    if let Ok(noise) = Normal::new(0.0, sigma) {
        *value += noise.sample(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_variation_is_constant() {
        let config = WeatherConfig {
            initial: Weather {
                temperature: 20.0,
                ..Default::default()
            },
            evolution: WeatherEvolution {
                temperature_variation: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(8);
        let mut w = config.initial_state();
        for _ in 0..100 {
            config.evolve(&mut w, &mut rng);
            assert_eq!(w.temperature, 20.0);
        }
    }

    #[test]
    fn test_evolution_respects_constraints() {
        let config = WeatherConfig {
            evolution: WeatherEvolution {
                humidity_variation: 50.0,
                wind_direction_variation: 400.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut w = config.initial_state();
        for _ in 0..200 {
            config.evolve(&mut w, &mut rng);
            assert!((0.0..=100.0).contains(&w.humidity));
            assert!((0.0..360.0).contains(&w.wind_direction));
        }
    }

    #[test]
    fn test_negative_variation_rejected() {
        let config = WeatherConfig {
            evolution: WeatherEvolution {
                pressure_variation: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
