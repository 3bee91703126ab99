//! The run driver.
//!
//! Loads a scenario, runs the simulation through its phases and writes the
//! survey output. With checkpointing enabled, the full state is serialised
//! once per simulated year between steps (never mid-step), and an existing
//! checkpoint next to the output file is resumed automatically.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use malsim_core::time::DAYS_PER_YEAR;
use malsim_core::Population;
use malsim_io::{checkpoint, output, scenario, IoError};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub scenario: PathBuf,
    pub output: PathBuf,
    pub checkpoint: bool,
    pub seed: Option<u64>,
    pub stream_validator: Option<PathBuf>,
}

fn checkpoint_path(output: &Path) -> PathBuf {
    output.with_extension("ckpt")
}

pub fn run(config: &RunConfig) -> Result<(), IoError> {
    let scenario = scenario::load(&config.scenario)?;
    info!(name = %scenario.name, fingerprint = %scenario.fingerprint(), "scenario loaded");

    let mut population = Population::new(&scenario, config.seed)?;
    let ckpt = checkpoint_path(&config.output);
    if config.checkpoint && ckpt.exists() {
        checkpoint::load(&mut population, &ckpt)?;
        info!(time = %population.now(), "resumed from checkpoint");
    }

    let steps_per_year = (DAYS_PER_YEAR / scenario.simulation.step_days) as u64;
    let mut steps: u64 = 0;
    while !population.finished() {
        population.step()?;
        steps += 1;
        // The checkpoint request is honoured between steps only; no
        // partial step is ever serialised.
        if config.checkpoint && steps % steps_per_year == 0 {
            checkpoint::save(&population, &ckpt)?;
        }
    }
    info!(steps, time = %population.now(), "simulation finished");

    output::write(&population.monitoring, &config.output)?;

    if let Some(reference_path) = &config.stream_validator {
        let reference = std::fs::read_to_string(reference_path)?;
        let actual = output::render(&population.monitoring);
        if let Some((line, a, b)) = output::diff(&actual, &reference) {
            warn!(line, actual = %a, reference = %b, "stream validator mismatch");
            return Err(IoError::scenario(format!(
                "stream validator: output diverges from {} at line {line}",
                reference_path.display()
            )));
        }
        info!("stream validator: outputs identical");
    }
    Ok(())
}
