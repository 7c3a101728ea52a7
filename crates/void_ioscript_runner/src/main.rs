//! IOScript scene runner
//!
//! Loads a scene file, runs every entity's `init`, simulates a number of
//! ticks while delivering the scene's timeline events, then prints a JSON
//! report of the global variables.
//!
//! Run with: cargo run -p void_ioscript_runner -- scene.toml --ticks 60

mod scene;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use crate::scene::{load_scene, RunnerError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run IOScript entity scripts from a scene file", long_about = None)]
struct Args {
    /// Scene TOML file
    scene: PathBuf,

    /// Number of simulation ticks to run after init
    #[arg(long, default_value_t = 60)]
    ticks: u32,

    /// Tick length in milliseconds
    #[arg(long, default_value_t = 16)]
    dt_ms: u64,

    /// Seed for `random` and `^rnd_`, overriding the scene
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the init pass
    #[arg(long)]
    no_init: bool,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), RunnerError> {
    let mut scene = load_scene(&args.scene)?;
    if let Some(seed) = args.seed {
        scene.engine.rng_seed = Some(seed);
    }
    log::info!(
        "Loaded scene {} ({} entities, {} events)",
        args.scene.display(),
        scene.entities.len(),
        scene.events.len()
    );

    let base_dir = args.scene.parent().unwrap_or(Path::new("."));
    let mut loaded = scene.instantiate(base_dir)?;
    if !args.no_init {
        loaded.init()?;
    }
    loaded.run(args.ticks, Duration::from_millis(args.dt_ms));

    let report = loaded.report();
    match args.output.as_deref() {
        Some(path) => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(file, &report)?;
            log::info!("Wrote report to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
