//! Headless runner: drives a simulation at its configured turn rate.
//!
//! Usage: `evotree-runner [config.json] [turns]`. Without a turn limit the
//! runner stops on Ctrl+C. Final population statistics are printed to
//! stdout as JSON.

mod telemetry;

use anyhow::{Context, Result};
use evotree_core::SimulationConfig;
use evotree_world::Simulation;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimulationConfig::load(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => SimulationConfig::default(),
    };
    let turns: Option<u64> = args
        .next()
        .map(|t| t.parse())
        .transpose()
        .context("turn count must be a non-negative integer")?;

    let mut sim = Simulation::new(config).context("failed to create simulation")?;
    info!(
        turns_per_second = sim.turns_per_second(),
        turn_limit = ?turns,
        "Starting EvoTree simulation"
    );

    tokio::select! {
        _ = run(&mut sim, turns) => {
            info!("Turn limit reached");
        }
        _ = shutdown_signal() => {}
    }

    sim.verify_integrity().context("world state is inconsistent")?;
    let stats = sim.stats();
    info!(
        turn = stats.turn,
        trees = stats.trees,
        seeds = stats.seeds,
        max_generation = stats.max_generation,
        "Simulation stopped"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Advances the world until `turns` is reached, paced by the simulation's
/// turn rate (0 runs unthrottled).
async fn run(sim: &mut Simulation, turns: Option<u64>) {
    let rate = sim.turns_per_second();
    let mut ticker = (rate > 0).then(|| {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / rate as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    while turns.map_or(true, |limit| sim.turn() < limit) {
        match ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
        sim.advance();
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
