//! Markov fading logic walkthrough.
//!
//! Drives one channel through a fixed event schedule: queries at 10, 30, 50,
//! 60, 90, 100, 130 and 200 ms while the elevation steps from 45 to 55 deg at
//! 45 ms and to 75 deg at 95 ms. Run with `RUST_LOG=debug` to see set switches
//! and state transitions.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use satfading::{ChannelType, FadingConfig, FadingOrchestrator, GeometryAccessors, SimTime};

#[derive(Debug, Parser)]
#[command(name = "markov_logic")]
#[command(about = "Step a Markov fading chain through an elevation schedule")]
struct Cli {
    /// TOML parameter tables; defaults to the built-in three-bracket tables
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "FORWARD_USER")]
    channel: ChannelType,

    #[arg(long, default_value_t = 0.0)]
    velocity: f64,
}

enum Event {
    Elevation(f64),
    Query,
}

fn schedule() -> Vec<(u64, Event)> {
    vec![
        (10, Event::Query),
        (30, Event::Query),
        (45, Event::Elevation(55.0)),
        (50, Event::Query),
        (60, Event::Query),
        (90, Event::Query),
        (95, Event::Elevation(75.0)),
        (100, Event::Query),
        (130, Event::Query),
        (200, Event::Query),
    ]
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FadingConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => FadingConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let elevation = Rc::new(Cell::new(45.0));
    let clock = Rc::new(Cell::new(SimTime::ZERO));
    let velocity = cli.velocity;

    let geometry = GeometryAccessors::new(
        {
            let elevation = Rc::clone(&elevation);
            move || elevation.get()
        },
        move || velocity,
    );
    let mut orchestrator = FadingOrchestrator::from_config(config, geometry, {
        let clock = Rc::clone(&clock);
        move || clock.get()
    })
    .context("invalid fading configuration")?;

    for (ms, event) in schedule() {
        clock.set(SimTime::from_millis(ms));
        match event {
            Event::Elevation(deg) => {
                info!(time_ms = ms, elevation_deg = deg, "elevation changed");
                elevation.set(deg);
            }
            Event::Query => {
                let value = orchestrator.fading(cli.channel)?;
                let (set, state) = orchestrator
                    .chain(cli.channel)
                    .map(|chain| (chain.set_index(), chain.state_index()))
                    .unwrap_or_default();
                info!(
                    time_ms = ms,
                    channel = %cli.channel,
                    elevation_deg = elevation.get(),
                    set,
                    state,
                    value,
                    "fading"
                );
            }
        }
    }

    Ok(())
}
