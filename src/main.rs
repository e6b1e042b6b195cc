//! Campaign Player - kiosk controller for scheduled video campaigns.
//!
//! Polls the campaign backend for the next media item, keeps device and
//! campaign status on screen and lets an operator skip content or open the
//! day's schedule.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod api;
mod commands;
mod config;
mod controller;
mod input;
mod media;
mod notify;
mod schedule;
mod surface;
mod view;

#[cfg(feature = "window")]
mod renderer;
#[cfg(feature = "window")]
mod video;
#[cfg(feature = "window")]
mod window;

#[cfg(test)]
mod testing;

use crate::config::Settings;

/// Campaign Player - kiosk video controller
#[derive(Parser)]
#[command(name = "campaign-player")]
#[command(version)]
#[command(about = "Kiosk controller for scheduled video campaigns", long_about = None)]
struct Cli {
    /// Config file (defaults to ./campaign-player.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the player (default)
    Run {
        /// Don't open a window even when built with one
        #[arg(long)]
        headless: bool,
    },

    /// Print campaign and schedule status once
    Status,

    /// Register this device with the backend
    Setup {
        /// Device name
        #[arg(long)]
        name: Option<String>,

        /// Numeric location id
        #[arg(long)]
        location_id: Option<i64>,

        /// Stream type (video, audio)
        #[arg(long)]
        stream_type: Option<String>,
    },

    /// Ask the backend to reload its schedule and campaigns
    Reload,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "campaign_player=debug"
    } else {
        "campaign_player=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load config")?;
    tracing::debug!("Settings: {:?}", settings);

    // SDL needs the main thread, so the runtime is built by hand.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let result = match cli.command.unwrap_or(Commands::Run { headless: false }) {
        Commands::Run { headless } => commands::run(&runtime, settings, headless),
        Commands::Status => runtime.block_on(commands::status(&settings)),
        Commands::Setup {
            name,
            location_id,
            stream_type,
        } => runtime.block_on(commands::setup(&settings, name, location_id, stream_type)),
        Commands::Reload => runtime.block_on(commands::reload(&settings)),
    };

    // A console read can still be parked on a blocking thread.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}
