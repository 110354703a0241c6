//! Scenario generation worker
//!
//! ```bash
//! # Worker 0 of 4, config from ./scenarios.yaml
//! rfscene-worker 0 4 scenarios
//!
//! # JSON logs for collection by a batch scheduler
//! rfscene-worker 2 4 scenarios --json
//! ```

use clap::Parser;
use rfscene_core::config::GeneratorConfig;
use rfscene_core::error::ScenarioError;
use rfscene_core::observe::{init_logging, LogConfig};
use rfscene_sim::runner::run_with_config;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "rfscene-worker")]
#[command(about = "Generate synthetic RF scenarios for one worker slot")]
#[command(version)]
struct Args {
    /// Index of this worker, starting at 0
    worker_id: usize,

    /// Number of workers sharing the scenario range
    total_workers: usize,

    /// Configuration path or name (`<name>.yaml` / `<name>.json`)
    config: String,

    /// Emit JSON logs instead of the configured format
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match GeneratorConfig::load_named(&args.config) {
        Ok(config) => config,
        Err(e) => return fail(&ScenarioError::from(e)),
    };

    let log_config = if args.json {
        LogConfig::worker()
    } else {
        config.logging.clone()
    };
    init_logging(&log_config);

    match run_with_config(args.worker_id, args.total_workers, config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(e: &ScenarioError) -> ExitCode {
    tracing::error!(error_kind = e.kind(), error = %e, "worker failed");
    eprintln!("{}: {}", e.kind(), e);
    ExitCode::FAILURE
}
