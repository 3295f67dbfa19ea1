//! Simlock - lockstep simulation coordinator
//!
//! CLI entry point for the coordinator, worker, and single-process demo.

use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{info, warn};

use simlock::cli::{Cli, Command};
use simlock::config::{Config, RunConfig};
use simlock::coordinator::{Coordinator, WorkerAssignment};
use simlock::orbit::CircularOrbit;
use simlock::worker::Worker;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load config")?;

    match cli.command {
        Command::Coordinate {
            socket,
            workers,
            entities,
            dt,
            duration,
        } => {
            let run = apply_overrides(config.run.clone(), workers, entities, dt, duration);
            let socket = socket.unwrap_or_else(|| config.socket.clone());
            run_coordinator(socket, config, run).await
        }
        Command::Work { socket } => {
            let socket = socket.unwrap_or_else(|| config.socket.clone());
            run_worker(socket).await
        }
        Command::Demo {
            socket,
            workers,
            entities,
            dt,
            duration,
        } => {
            let run = apply_overrides(config.run.clone(), workers, entities, dt, duration);
            let socket = socket.unwrap_or_else(|| config.socket.clone());
            run_demo(socket, config, run).await
        }
    }
}

fn apply_overrides(
    mut run: RunConfig,
    workers: Option<usize>,
    entities: Option<usize>,
    dt: Option<f64>,
    duration: Option<f64>,
) -> RunConfig {
    if let Some(workers) = workers {
        run.workers = workers;
    }
    if let Some(entities) = entities {
        run.entities = entities;
    }
    if let Some(dt) = dt {
        run.dt = dt;
    }
    if let Some(duration) = duration {
        run.duration = duration;
    }
    run
}

async fn run_coordinator(socket: PathBuf, config: Config, run: RunConfig) -> Result<()> {
    info!(socket = %socket.display(), workers = run.workers, "Starting coordinator");

    let mut coordinator = Coordinator::bind(&socket, config.coordinator.clone())?;
    coordinator.start(run.workers).await;

    if coordinator.live_count() == 0 {
        warn!("No workers connected, shutting down");
        coordinator.shutdown().await;
        return Ok(());
    }

    let assignments =
        WorkerAssignment::round_robin(run.entities as u64, coordinator.worker_count());
    coordinator.assign_entities(&assignments).await;

    let ok = coordinator.run_until(run.duration, run.dt).await;
    if !ok {
        warn!("Run finished with incomplete steps");
    }

    let states = coordinator.gather_states().await;
    print_summary(coordinator.current_time(), &states);

    coordinator.shutdown().await;
    Ok(())
}

async fn run_worker(socket: PathBuf) -> Result<()> {
    info!(socket = %socket.display(), "Starting worker");

    let worker = Worker::connect(&socket, Box::new(CircularOrbit::constellation())).await?;
    worker.run().await
}

async fn run_demo(socket: PathBuf, config: Config, run: RunConfig) -> Result<()> {
    info!(workers = run.workers, entities = run.entities, "Starting demo");

    // Bind before spawning workers so their connects cannot race the listener
    let mut coordinator = Coordinator::bind(&socket, config.coordinator.clone())?;

    let mut handles = Vec::with_capacity(run.workers);
    for _ in 0..run.workers {
        let path = socket.clone();
        handles.push(tokio::spawn(async move {
            let worker = Worker::connect(&path, Box::new(CircularOrbit::constellation())).await?;
            worker.run().await
        }));
    }

    coordinator.start(run.workers).await;

    let assignments =
        WorkerAssignment::round_robin(run.entities as u64, coordinator.worker_count());
    coordinator.assign_entities(&assignments).await;

    let ok = coordinator.run_until(run.duration, run.dt).await;
    if !ok {
        warn!("Demo finished with incomplete steps");
    }

    let states = coordinator.gather_states().await;
    print_summary(coordinator.current_time(), &states);

    coordinator.shutdown().await;

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "Worker exited with error"),
            Err(err) => warn!(error = %err, "Worker task panicked"),
        }
    }

    Ok(())
}

fn print_summary(time: f64, states: &[simwire::StateRecord]) {
    println!("Simulation time: {time:.1} s, {} entities", states.len());
    for state in states {
        println!(
            "  entity {}: pos ({:.1}, {:.1}, {:.1}) m, speed {:.1} m/s, t={:.1}",
            state.entity_id,
            state.px,
            state.py,
            state.pz,
            state.speed(),
            state.time,
        );
    }
}
