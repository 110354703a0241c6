//! # Configuration System
//!
//! Scenario generation is driven by one YAML (or JSON) document. Top-level
//! keys hold run parameters; component sections (`Environment`, `Behavior`,
//! `Impairments`, `Channel`, `Receiver`) can be given at three tiers:
//!
//! 1. `Factories.<Section>`: factory-level, highest precedence
//! 2. `Scenario.<Section>`: scenario-level
//! 3. `<Section>` at the top level: legacy layout, lowest precedence
//!
//! Tiers are merged recursively with the higher tier winning on leaf values,
//! then deserialized into the component's typed configuration.
//!
//! ## Configuration Search Path
//!
//! 1. Explicit path passed to [`GeneratorConfig::load`]
//! 2. `RFSCENE_CONFIG` environment variable
//! 3. `./rfscene.yaml`
//! 4. `~/.config/rfscene/config.yaml` (platform config dir)
//! 5. `/etc/rfscene/config.yaml`
//!
//! ## Example Configuration
//!
//! ```yaml
//! Seed: 7
//! NumScenarios: 4
//! NumFramesPerScenario: 3
//! Environment:
//!   Transmitters:
//!     Count: { Min: 2, Max: 4 }
//!   Receivers:
//!     Count: { Min: 1, Max: 1 }
//! Behavior:
//!   Modulations: [BPSK, QPSK, 16QAM]
//! Scenario:
//!   Behavior:
//!     Tiling: { IsOverlap: true }
//! ```

use crate::observe::LogConfig;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "RFSCENE_CONFIG";

/// Section names of the component configurations
pub mod sections {
    pub const ENVIRONMENT: &str = "Environment";
    pub const BEHAVIOR: &str = "Behavior";
    pub const IMPAIRMENTS: &str = "Impairments";
    pub const CHANNEL: &str = "Channel";
    pub const RECEIVER: &str = "Receiver";

    /// Sections a frame cannot be generated without
    pub const REQUIRED: [&str; 2] = [ENVIRONMENT, BEHAVIOR];
}

/// Error type for configuration operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    ReadError(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),

    #[error("missing required config section '{0}'")]
    MissingSection(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Inclusive integer range `{Min, Max}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
}

impl CountRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, name: &str) -> ConfigResult<()> {
        if self.min > self.max {
            return Err(ConfigError::ValidationError(format!(
                "{}: Min ({}) must not exceed Max ({})",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Uniform draw in `[min, max]`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn contains(&self, value: usize) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Inclusive floating point range `[lo, hi]`
pub fn validate_span(name: &str, span: [f64; 2]) -> ConfigResult<()> {
    if !span[0].is_finite() || !span[1].is_finite() || span[0] > span[1] {
        return Err(ConfigError::ValidationError(format!(
            "{}: [{}, {}] is not a valid range",
            name, span[0], span[1]
        )));
    }
    Ok(())
}

/// Uniform draw in `[lo, hi]`, degenerate ranges return `lo`
pub fn sample_span<R: Rng + ?Sized>(span: [f64; 2], rng: &mut R) -> f64 {
    if span[1] > span[0] {
        rng.gen_range(span[0]..=span[1])
    } else {
        span[0]
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value (scalars, arrays, null)
/// replaces the base value. Keys present on only one side are kept.
pub fn merge_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Merge configuration tiers from lowest to highest precedence.
///
/// Returns `None` when no tier provides the section.
pub fn merge_tiers<'a, I>(tiers: I) -> Option<Value>
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let mut merged: Option<Value> = None;
    for tier in tiers.into_iter().flatten() {
        match merged {
            Some(ref mut acc) => merge_values(acc, tier),
            None => merged = Some(tier.clone()),
        }
    }
    merged
}

/// Named component sections of one configuration tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SectionSet {
    pub environment: Option<Value>,
    pub behavior: Option<Value>,
    pub impairments: Option<Value>,
    pub channel: Option<Value>,
    pub receiver: Option<Value>,
}

impl SectionSet {
    pub fn get(&self, name: &str) -> Option<&Value> {
        match name {
            sections::ENVIRONMENT => self.environment.as_ref(),
            sections::BEHAVIOR => self.behavior.as_ref(),
            sections::IMPAIRMENTS => self.impairments.as_ref(),
            sections::CHANNEL => self.channel.as_ref(),
            sections::RECEIVER => self.receiver.as_ref(),
            _ => None,
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let slot = match name {
            sections::ENVIRONMENT => &mut self.environment,
            sections::BEHAVIOR => &mut self.behavior,
            sections::IMPAIRMENTS => &mut self.impairments,
            sections::CHANNEL => &mut self.channel,
            sections::RECEIVER => &mut self.receiver,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// Complete scenario generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GeneratorConfig {
    pub version: String,
    /// Base random seed; each worker derives its own stream from it
    pub seed: u64,
    /// Total scenarios across all workers
    pub num_scenarios: usize,
    pub num_frames_per_scenario: usize,
    /// Root directory for per-worker output
    pub output_dir: PathBuf,
    pub logging: LogConfig,
    /// Factory-level sections
    pub factories: SectionSet,
    /// Scenario-level sections
    pub scenario: SectionSet,
    /// Legacy top-level sections
    #[serde(flatten)]
    pub legacy: SectionSet,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            seed: 42,
            num_scenarios: 1,
            num_frames_per_scenario: 1,
            output_dir: PathBuf::from("output"),
            logging: LogConfig::default(),
            factories: SectionSet::default(),
            scenario: SectionSet::default(),
            legacy: SectionSet::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from an explicit path or the default search path.
    ///
    /// Unlike device settings, a scenario cannot run on defaults alone, so a
    /// missing file is an error.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        let paths = Self::config_search_paths();
        for path in &paths {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Err(ConfigError::NotFound(format!(
            "no configuration in {}",
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Resolve a configuration name: an existing path, or `<name>.yaml` /
    /// `<name>.json` relative to the working directory.
    pub fn load_named(name: &str) -> ConfigResult<Self> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Self::load_from(&direct);
        }
        for ext in ["yaml", "yml", "json"] {
            let candidate = PathBuf::from(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Self::load_from(&candidate);
            }
        }
        Err(ConfigError::NotFound(format!("configuration '{}'", name)))
    }

    /// Load configuration from a specific file (YAML, or JSON by extension).
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::parse_json(&content)
        } else {
            Self::parse(&content)
        }
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string.
    pub fn parse_json(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./rfscene.yaml")];

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "rfscene") {
            paths.push(config_dir.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/rfscene/config.yaml"));
        paths
    }

    /// Validate run-level parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.num_frames_per_scenario == 0 {
            return Err(ConfigError::ValidationError(
                "NumFramesPerScenario must be > 0".to_string(),
            ));
        }
        for (tier, set) in [("Factories", &self.factories), ("Scenario", &self.scenario)] {
            for name in [
                sections::ENVIRONMENT,
                sections::BEHAVIOR,
                sections::IMPAIRMENTS,
                sections::CHANNEL,
                sections::RECEIVER,
            ] {
                if let Some(value) = set.get(name) {
                    if !value.is_object() {
                        return Err(ConfigError::ValidationError(format!(
                            "{}.{} must be a mapping",
                            tier, name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Merged section value across the three tiers, if any tier has it.
    pub fn section_value(&self, name: &str) -> Option<Value> {
        merge_tiers([
            self.legacy.get(name),
            self.scenario.get(name),
            self.factories.get(name),
        ])
    }

    /// Whether any tier provides the section.
    pub fn has_section(&self, name: &str) -> bool {
        self.legacy.get(name).is_some()
            || self.scenario.get(name).is_some()
            || self.factories.get(name).is_some()
    }

    /// Check that every required section is present.
    pub fn require_sections(&self) -> ConfigResult<()> {
        for name in sections::REQUIRED {
            if !self.has_section(name) {
                return Err(ConfigError::MissingSection(name.to_string()));
            }
        }
        Ok(())
    }

    /// Deserialize a merged section into its typed form; absent sections
    /// fall back to the type's defaults.
    pub fn section<T: DeserializeOwned + Default>(&self, name: &str) -> ConfigResult<T> {
        match self.section_value(name) {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", name, e))),
            None => Ok(T::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_override_wins_and_keeps_disjoint_keys() {
        let mut base = json!({
            "A": 1,
            "Nested": { "X": 1, "Y": 2 },
            "List": [1, 2, 3],
        });
        let overlay = json!({
            "B": 2,
            "Nested": { "Y": 20, "Z": 30 },
            "List": [9],
        });
        merge_values(&mut base, &overlay);
        assert_eq!(
            base,
            json!({
                "A": 1,
                "B": 2,
                "Nested": { "X": 1, "Y": 20, "Z": 30 },
                "List": [9],
            })
        );
    }

    #[test]
    fn test_merge_tiers_precedence() {
        let legacy = json!({ "Level": "legacy", "OnlyLegacy": true });
        let scenario = json!({ "Level": "scenario" });
        let factory = json!({ "Level": "factory" });
        let merged = merge_tiers([Some(&legacy), Some(&scenario), Some(&factory)]).unwrap();
        assert_eq!(merged["Level"], "factory");
        assert_eq!(merged["OnlyLegacy"], true);

        let merged = merge_tiers([Some(&legacy), None, None]).unwrap();
        assert_eq!(merged["Level"], "legacy");
        assert!(merge_tiers([None, None, None]).is_none());
    }

    #[test]
    fn test_parse_yaml_with_tiers() {
        let yaml = r#"
Seed: 7
NumFramesPerScenario: 3
Environment:
  TimeResolution: 0.5
  Transmitters:
    Count: { Min: 1, Max: 2 }
Behavior:
  Modulations: [BPSK]
Scenario:
  Environment:
    TimeResolution: 1.0
Factories:
  Environment:
    Transmitters:
      Count: { Min: 2, Max: 2 }
"#;
        let config = GeneratorConfig::parse(yaml).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.num_frames_per_scenario, 3);
        assert!(config.require_sections().is_ok());

        let env = config.section_value(sections::ENVIRONMENT).unwrap();
        assert_eq!(env["TimeResolution"], 1.0);
        assert_eq!(env["Transmitters"]["Count"]["Min"], 2);
    }

    #[test]
    fn test_defaults_and_missing_sections() {
        let config = GeneratorConfig::parse("Seed: 1\n").unwrap();
        assert_eq!(config.num_frames_per_scenario, 1);
        assert_eq!(
            config.require_sections(),
            Err(ConfigError::MissingSection("Environment".to_string()))
        );
    }

    #[test]
    fn test_zero_frames_rejected() {
        assert!(matches!(
            GeneratorConfig::parse("NumFramesPerScenario: 0\n"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_count_range() {
        let range = CountRange::new(2, 5);
        assert!(range.validate("x").is_ok());
        assert!(CountRange::new(3, 1).validate("x").is_err());
        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(3);
        let drawn = range.sample(&mut rng);
        assert!(range.contains(drawn));
        assert_eq!(CountRange::new(4, 4).sample(&mut rng), 4);
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"Seed": 9, "Environment": {}, "Behavior": {}}"#).unwrap();
        let config = GeneratorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.seed, 9);
        assert!(config.has_section(sections::BEHAVIOR));
    }

    #[test]
    fn test_config_search_paths() {
        let paths = GeneratorConfig::config_search_paths();
        assert!(paths[0].ends_with("rfscene.yaml"));
    }
}
