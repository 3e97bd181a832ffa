//! Familiarity Simulation Driver
//!
//! Runs one seeded simulation, writing periodic telemetry snapshots and the
//! lifecycle event log to an output directory.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use familiar_core::output::{self, EventLogger, SnapshotSchedule};
use familiar_core::{SimConfig, SimResult, Simulation};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "familiar_sim")]
#[command(about = "Evolution of familiarity bias and cooperation in moving agents")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 1000)]
    ticks: u64,

    /// TOML configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interval between telemetry snapshots (in ticks)
    #[arg(long, default_value_t = 100)]
    snapshot_interval: u64,

    /// Directory for snapshots and the event log
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Compute the familiarity clustering coefficient in snapshots
    #[arg(long)]
    clustering: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        error!(error = %e, "simulation failed");
        std::process::exit(1);
    }
}

fn run(args: Args) -> SimResult<()> {
    if args.print_default_config {
        println!("{}", SimConfig::default().to_toml()?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };

    info!(
        seed = args.seed,
        ticks = args.ticks,
        snapshot_interval = args.snapshot_interval,
        output = %args.output.display(),
        "starting familiarity simulation"
    );

    let snapshot_dir = args.output.join("snapshots");
    std::fs::create_dir_all(&snapshot_dir)?;
    let mut logger = EventLogger::new(args.output.join("events.jsonl"))?;
    let schedule = SnapshotSchedule::new(args.snapshot_interval);

    let mut sim = Simulation::new(config, args.seed)?;
    logger.log_batch(&sim.drain_events())?;

    let initial = sim.snapshot(args.clustering);
    output::write_snapshot_to_dir(&initial, &snapshot_dir)?;

    for _ in 0..args.ticks {
        sim.step();
        logger.log_batch(&sim.drain_events())?;

        let tick = sim.tick();
        if schedule.should_snapshot(tick) {
            let snapshot = sim.snapshot(args.clustering);
            output::write_snapshot_to_dir(&snapshot, &snapshot_dir)?;
            info!(
                tick,
                population = snapshot.population,
                cooperators = snapshot.cooperators,
                mean_familiarity = snapshot.mean_familiarity(),
                "snapshot written"
            );
        }

        if sim.state().population.is_empty() {
            info!(tick, "population extinct, stopping early");
            break;
        }
    }

    let last = sim.snapshot(args.clustering);
    output::write_snapshot(&last, args.output.join("final_state.json"))?;
    logger.flush()?;

    info!(
        ticks = sim.tick(),
        population = last.population,
        cooperator_fraction = last.cooperator_fraction(),
        events = logger.event_count(),
        "simulation complete"
    );
    Ok(())
}
