//! Korean Paradox - command line runner
//!
//! `run` plays one seeded run and writes its JSONL log; `sweep` plays a seed
//! range per scenario in parallel and prints the aggregate statistics.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use paradox_sim::core::error::{Result, SimError};
use paradox_sim::core::SimulationConfig;
use paradox_sim::sim::{load_state, sweep, write_json_lines, Run, RunSummary, Scenario, SweepStats};

#[derive(Parser, Debug)]
#[command(name = "paradox-sim")]
#[command(about = "Deterministic court politics simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play one run and write its turn log
    Run {
        #[arg(long, default_value_t = 120)]
        turns: u64,

        /// Seed for the run's random stream
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// baseline, famine, deficit or warlord
        #[arg(long, default_value = "baseline")]
        scenario: Scenario,

        /// JSONL output path
        #[arg(long, default_value = "logs/run.jsonl")]
        out: PathBuf,

        /// Engine config TOML
        #[arg(long)]
        config: Option<PathBuf>,

        /// Custom starting state TOML (overrides --scenario)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Play a seed range for each scenario and print statistics
    Sweep {
        #[arg(long, default_value_t = 120)]
        turns: u64,

        /// Inclusive seed range
        #[arg(long, num_args = 2, value_names = ["START", "END"], default_values_t = [0u64, 99])]
        seeds: Vec<u64>,

        /// Only sweep this scenario
        #[arg(long)]
        scenario: Option<Scenario>,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for per-scenario row logs
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct RunReport<'a> {
    scenario: String,
    seed: u64,
    log: &'a Path,
    #[serde(flatten)]
    summary: RunSummary,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("paradox_sim=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run {
            turns,
            seed,
            scenario,
            out,
            config,
            state,
        } => run_command(turns, seed, scenario, &out, config.as_deref(), state.as_deref()),
        Command::Sweep {
            turns,
            seeds,
            scenario,
            config,
            out,
        } => sweep_command(turns, &seeds, scenario, config.as_deref(), out.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => SimulationConfig::load(path),
        None => Ok(SimulationConfig::default()),
    }
}

fn run_command(
    turns: u64,
    seed: u64,
    scenario: Scenario,
    out: &Path,
    config: Option<&Path>,
    state: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let (label, initial) = match state {
        Some(path) => (path.display().to_string(), load_state(path, &config.bounds)?),
        None => (scenario.to_string(), scenario.initial_state()),
    };

    let mut run = Run::with_config(initial, seed, config)?;
    let log = run.run_turns(turns)?;
    run.complete();
    log.write_jsonl(out)?;

    let report = RunReport {
        scenario: label,
        seed,
        log: out,
        summary: RunSummary::from_records(log.records()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn sweep_command(
    turns: u64,
    seeds: &[u64],
    scenario: Option<Scenario>,
    config: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let (start, end) = match seeds {
        [start, end] if start <= end => (*start, *end),
        _ => {
            return Err(SimError::config(format!(
                "--seeds needs START <= END, got {:?}",
                seeds
            )))
        }
    };
    let config = load_config(config)?;
    let scenarios = match scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };

    let mut summaries = BTreeMap::new();
    for scenario in scenarios {
        let rows = sweep(scenario, start..=end, turns, &config)?;
        if let Some(dir) = out {
            let path = dir.join(format!("{}.jsonl", scenario));
            let written = write_json_lines(&path, &rows)?;
            tracing::debug!("Wrote {} sweep rows to {:?}", written, path);
        }
        let stats = SweepStats::from_rows(&rows);
        tracing::info!(
            "{}: {} runs, collapse rate {:.2}",
            scenario,
            stats.runs,
            stats.collapse_rate
        );
        summaries.insert(scenario.to_string(), stats);
    }

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
