//! Delivery simulation CLI
//!
//! Runs a synthetic multi-day scenario: uniform arrivals over a square
//! region, straight-line travel, nearest-neighbor routing. Metrics are
//! written as JSON lines.
//!
//! # Example
//!
//! ```bash
//! # Ten days, fixed seed, drivers wait for windows to open
//! delivery-sim --days 10 --seed 42 --policy arrival-wait
//!
//! # Settings from a file, metrics to disk
//! RUST_LOG=u_delivery=debug delivery-sim --config scenario.json --output metrics.jsonl
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use u_delivery::distance::{Bounds, EuclideanGeometry};
use u_delivery::engine::{
    JsonLinesSink, Simulation, SimulationConfig, Termination, TracingObserver, UniformArrivals,
};
use u_delivery::models::Location;
use u_delivery::routing::NearestNeighborOptimizer;
use u_delivery::simulation::TimeWindowPolicy;

/// Multi-day delivery simulator
///
/// Reproducible when a seed is given, either here or in the config file.
#[derive(Parser, Debug)]
#[command(name = "delivery-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file. Flags below override its values.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of days to simulate
    #[arg(short = 'd', long)]
    days: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Route simulations per day
    #[arg(short = 'r', long)]
    replications: Option<usize>,

    /// Time-window policy: arrival-skip, arrival-strict, arrival-wait, departure-wait-reroute
    #[arg(short = 'p', long, value_parser = parse_policy)]
    policy: Option<TimeWindowPolicy>,

    /// Vehicles available each day
    #[arg(short = 'v', long, default_value = "3")]
    vehicles: usize,

    /// Side length of the square service region, depot at its center
    #[arg(long, default_value = "10000")]
    region: f64,

    /// Travel speed in distance units per time unit
    #[arg(long, default_value = "8")]
    speed: f64,

    /// Minimum arrivals per day
    #[arg(long, default_value = "5")]
    min_arrivals: usize,

    /// Maximum arrivals per day
    #[arg(long, default_value = "15")]
    max_arrivals: usize,

    /// Length of each delivery window. Defaults to a quarter of the day.
    #[arg(long)]
    window_length: Option<f64>,

    /// Chance that a customer gives an alternate address
    #[arg(long, default_value = "0")]
    alternate_probability: f64,

    /// Write metrics here instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn parse_policy(s: &str) -> Result<TimeWindowPolicy, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown policy '{s}'"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,u_delivery=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(days) = args.days {
        config.days = days;
    }
    if let Some(replications) = args.replications {
        config.replications = replications;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    config.seed = args.seed.or(config.seed).or_else(|| Some(rand::random()));

    let half = args.region / 2.0;
    let region = Bounds::new(Location::new(-half, -half), Location::new(half, half));
    let mut arrivals = UniformArrivals::new(region, config.day_span()?)
        .with_per_day(args.min_arrivals, args.max_arrivals)
        .with_alternate_probability(args.alternate_probability);
    if let Some(length) = args.window_length {
        arrivals = arrivals.with_window_length(length);
    }

    info!(
        days = config.days,
        seed = ?config.seed,
        policy = ?config.policy,
        vehicles = args.vehicles,
        region = args.region,
        "starting delivery simulation"
    );

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    let run = Simulation::builder(config)
        .depot(Location::new(0.0, 0.0))
        .geometry(EuclideanGeometry::new(args.speed).with_bounds(region))
        .optimizer(NearestNeighborOptimizer::new(args.vehicles))
        .arrivals(arrivals)
        .sink(JsonLinesSink::new(writer))
        .observer(TracingObserver)
        .build()?
        .run()?;

    match &run.termination {
        Termination::Completed => info!(
            records = run.metrics.len(),
            undelivered = run.registry.non_depot_count(),
            "simulation complete"
        ),
        Termination::Aborted { day, reason } => info!(
            day,
            %reason,
            records = run.metrics.len(),
            "simulation stopped early"
        ),
    }
    Ok(())
}
