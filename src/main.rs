use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use malsim_lib::app::{self, RunConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Individual-based malaria transmission simulator", long_about = None)]
struct Args {
    /// Scenario document (TOML)
    #[arg(long)]
    scenario: PathBuf,

    /// Survey output file
    #[arg(long, default_value = "output.txt")]
    output: PathBuf,

    /// Enable periodic checkpointing (and resume from an existing
    /// checkpoint next to the output file)
    #[arg(long)]
    checkpoint: bool,

    /// Override the scenario's master seed
    #[arg(long)]
    seed: Option<u64>,

    /// Reference output for deterministic-playback diffing
    #[arg(long)]
    stream_validator: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = RunConfig {
        scenario: args.scenario,
        output: args.output,
        checkpoint: args.checkpoint,
        seed: args.seed,
        stream_validator: args.stream_validator,
    };
    match app::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code().clamp(64, 113) as u8)
        }
    }
}
