//! Headless runner for the Life Engine simulation.

mod checkpoint;
#[macro_use]
mod telemetry;

use anyhow::{Context, Result};
use checkpoint::CheckpointManager;
use life_core::{Error, RunnerConfig, SimulationConfig};
use life_world::Simulation;
use tokio::signal;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Checkpoint files kept on disk
const CHECKPOINTS_TO_KEEP: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let runner = RunnerConfig::from_env();
    telemetry::init_telemetry(runner.json_logs)?;

    let config = match &runner.config_path {
        Some(path) => SimulationConfig::from_json_file(path)
            .with_context(|| format!("failed to load simulation config from {}", path))?,
        None => SimulationConfig::default(),
    };
    info!(
        seed = config.seed,
        cols = config.world.cols,
        rows = config.world.rows,
        num_ticks = runner.num_ticks,
        "Starting Life Engine runner"
    );

    let checkpoints = CheckpointManager::new(&runner.checkpoint_dir);
    let mut sim = load_simulation(&runner, config, &checkpoints).await?;

    run_loop(&mut sim, &runner, &checkpoints).await;

    sim.emit_population_metrics();
    if runner.checkpoint_interval_ticks > 0 {
        match checkpoints.create_checkpoint(&sim).await {
            Ok(_) => {
                record_counter!("checkpoints_written", 1);
            }
            Err(e) => error!("Failed to write final checkpoint: {}", e),
        }
    }
    info!(tick = sim.tick(), "Runner stopped");
    Ok(())
}

async fn load_simulation(
    runner: &RunnerConfig,
    config: SimulationConfig,
    checkpoints: &CheckpointManager,
) -> Result<Simulation> {
    if runner.resume {
        match checkpoints.load_latest().await {
            Ok(checkpoint) => {
                let mut config = config;
                config.seed = checkpoint.seed;
                let sim = Simulation::from_snapshot(config, checkpoint.snapshot)
                    .context("failed to restore simulation from checkpoint")?;
                info!(tick = sim.tick(), "Resumed from checkpoint");
                return Ok(sim);
            }
            Err(Error::NotFound(_)) => info!(
                dir = %checkpoints.checkpoint_dir().display(),
                "No checkpoint found, starting fresh"
            ),
            Err(e) => warn!("Failed to load checkpoint, starting fresh: {}", e),
        }
    }
    Ok(Simulation::new(config))
}

async fn run_loop(sim: &mut Simulation, runner: &RunnerConfig, checkpoints: &CheckpointManager) {
    let mut ticker = (runner.tick_interval_ms > 0).then(|| {
        let mut ticker = interval(Duration::from_millis(runner.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut ticks_run = 0u64;
    loop {
        if runner.num_ticks > 0 && ticks_run >= runner.num_ticks {
            info!(ticks_run, "Tick budget reached");
            break;
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = pace(&mut ticker) => {}
        }

        let Some(report) = sim.step() else {
            info!(tick = sim.tick(), "Simulation paused");
            break;
        };
        ticks_run += 1;

        if report.reset {
            record_counter!("auto_resets", 1);
        }
        if runner.metrics_interval_ticks > 0 && report.tick % runner.metrics_interval_ticks == 0 {
            sim.emit_population_metrics();
        }
        if runner.checkpoint_interval_ticks > 0 && report.tick % runner.checkpoint_interval_ticks == 0 {
            match checkpoints.create_checkpoint(sim).await {
                Ok(_) => {
                    record_counter!("checkpoints_written", 1);
                    if let Err(e) = checkpoints.cleanup_old_checkpoints(CHECKPOINTS_TO_KEEP).await {
                        warn!("Failed to clean up old checkpoints: {}", e);
                    }
                }
                Err(e) => error!("Failed to create checkpoint: {}", e),
            }
        }
    }
}

/// Wait for the next tick slot; without an interval just yield to the runtime.
async fn pace(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
