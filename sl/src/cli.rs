//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Simlock - lockstep simulation coordinator
#[derive(Parser)]
#[command(
    name = "simlock",
    about = "Lockstep coordinator and workers for distributed simulation",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator: accept workers, assign entities, step in lockstep
    Coordinate {
        /// Unix socket path to bind
        #[arg(short, long)]
        socket: Option<PathBuf>,

        /// Number of workers to wait for
        #[arg(short, long)]
        workers: Option<usize>,

        /// Number of simulated entities
        #[arg(short, long)]
        entities: Option<usize>,

        /// Step size in simulated seconds
        #[arg(long)]
        dt: Option<f64>,

        /// Total simulated duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Run a worker: connect to a coordinator and propagate assigned entities
    Work {
        /// Unix socket path to connect to
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Run coordinator and workers in one process (demo)
    Demo {
        /// Unix socket path to bind
        #[arg(short, long)]
        socket: Option<PathBuf>,

        /// Number of in-process workers to spawn
        #[arg(short, long)]
        workers: Option<usize>,

        /// Number of simulated entities
        #[arg(short, long)]
        entities: Option<usize>,

        /// Step size in simulated seconds
        #[arg(long)]
        dt: Option<f64>,

        /// Total simulated duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },
}
