//! Worker process entry
//!
//! Workers split the scenario range by `scenario_id % total_workers` and
//! never share state; each writes below its own `worker_NNN` directory.

use crate::frame::{FrameOrchestrator, FrameOutput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rfscene_core::config::GeneratorConfig;
use rfscene_core::error::{ScenarioError, ScenarioResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Counters reported when a worker finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scenarios: usize,
    pub failed_scenarios: usize,
    pub frames: usize,
    pub failed_frames: usize,
}

/// Scenario ids handled by `worker_id` out of `total_workers`.
pub fn worker_scenarios(
    num_scenarios: usize,
    worker_id: usize,
    total_workers: usize,
) -> impl Iterator<Item = u64> {
    (0..num_scenarios)
        .filter(move |s| total_workers > 0 && s % total_workers == worker_id)
        .map(|s| s as u64)
}

pub fn worker_dir(output_dir: &Path, worker_id: usize) -> PathBuf {
    output_dir.join(format!("worker_{:03}", worker_id))
}

pub fn annotation_file_name(scenario_id: u64, global_frame_id: u64) -> String {
    format!("scenario_{:05}_frame_{:06}.json", scenario_id, global_frame_id)
}

/// Load `config_name` and run this worker's share of the scenarios.
pub fn run(worker_id: usize, total_workers: usize, config_name: &str) -> ScenarioResult<RunSummary> {
    let config = GeneratorConfig::load_named(config_name)?;
    run_with_config(worker_id, total_workers, config)
}

pub fn run_with_config(
    worker_id: usize,
    total_workers: usize,
    config: GeneratorConfig,
) -> ScenarioResult<RunSummary> {
    if total_workers == 0 || worker_id >= total_workers {
        return Err(ScenarioError::Configuration(format!(
            "worker id {} out of range for {} workers",
            worker_id, total_workers
        )));
    }
    config.require_sections()?;

    let dir = worker_dir(&config.output_dir, worker_id);
    fs::create_dir_all(&dir)?;

    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(worker_id as u64));
    let num_scenarios = config.num_scenarios;
    let mut orchestrator = FrameOrchestrator::with_reference_stages(config, &mut rng)?;

    info!(worker_id, total_workers, output = %dir.display(), "worker started");

    let mut summary = RunSummary::default();
    for scenario_id in worker_scenarios(num_scenarios, worker_id, total_workers) {
        summary.scenarios += 1;
        let result = orchestrator.generate_scenario_with(scenario_id, |frame| {
            summary.frames += 1;
            if !frame.is_ok() {
                summary.failed_frames += 1;
            }
            write_annotation(&dir, scenario_id, &frame)
        });

        match result {
            Ok(_) => {}
            Err(e @ ScenarioError::Instantiation { .. }) => {
                summary.failed_scenarios += 1;
                error!(
                    worker_id,
                    scenario_id,
                    error_kind = e.kind(),
                    error = %e,
                    "scenario aborted"
                );
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        worker_id,
        scenarios = summary.scenarios,
        failed_scenarios = summary.failed_scenarios,
        frames = summary.frames,
        failed_frames = summary.failed_frames,
        "worker finished"
    );
    Ok(summary)
}

fn write_annotation(dir: &Path, scenario_id: u64, frame: &FrameOutput) -> ScenarioResult<()> {
    let global_frame_id = frame.global_frame_id().unwrap_or(frame.annotation.frame_id);
    let path = dir.join(annotation_file_name(scenario_id, global_frame_id));
    let json = serde_json::to_string_pretty(&frame.annotation)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(output: &Path) -> GeneratorConfig {
        let yaml = format!(
            r#"
Seed: 5
NumScenarios: 5
NumFramesPerScenario: 2
OutputDir: {}
Environment:
  Transmitters:
    Count: {{ Min: 1, Max: 2 }}
  Receivers:
    Count: {{ Min: 1, Max: 1 }}
Behavior:
  Modulators: [BPSK, QPSK]
  MessageLength: {{ Min: 16, Max: 32 }}
"#,
            output.display()
        );
        GeneratorConfig::parse(&yaml).unwrap()
    }

    #[test]
    fn test_worker_partition() {
        let ids: Vec<u64> = worker_scenarios(10, 1, 3).collect();
        assert_eq!(ids, vec![1, 4, 7]);
        let all: usize = (0..3).map(|w| worker_scenarios(10, w, 3).count()).sum();
        assert_eq!(all, 10);
        assert_eq!(worker_scenarios(10, 0, 0).count(), 0);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(annotation_file_name(3, 12), "scenario_00003_frame_000012.json");
        assert_eq!(
            worker_dir(Path::new("out"), 7),
            Path::new("out").join("worker_007")
        );
    }

    #[test]
    fn test_run_writes_annotations() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = run_with_config(1, 2, config(tmp.path())).unwrap();
        assert_eq!(summary.scenarios, 2);
        assert_eq!(summary.frames, 4);

        let dir = worker_dir(tmp.path(), 1);
        let mut names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "scenario_00001_frame_000001.json",
                "scenario_00001_frame_000002.json",
                "scenario_00003_frame_000003.json",
                "scenario_00003_frame_000004.json",
            ]
        );

        let text = fs::read_to_string(dir.join(&names[0])).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["ScenarioID"], 1);
        assert_eq!(json["FrameID"], 1);
        assert_eq!(json["GlobalFrameID"], 1);
    }

    #[test]
    fn test_same_seed_same_annotations() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        run_with_config(0, 1, config(a.path())).unwrap();
        run_with_config(0, 1, config(b.path())).unwrap();

        let name = annotation_file_name(0, 1);
        let read = |root: &Path| -> serde_json::Value {
            let mut v: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(worker_dir(root, 0).join(&name)).unwrap()).unwrap();
            v.as_object_mut().unwrap().remove("GeneratedAt");
            v
        };
        assert_eq!(read(a.path()), read(b.path()));
    }

    #[test]
    fn test_bad_worker_id_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = run_with_config(2, 2, config(tmp.path())).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_missing_config_is_configuration_error() {
        let err = run(0, 1, "/nonexistent/rfscene-config").unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
