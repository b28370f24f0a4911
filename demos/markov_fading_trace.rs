//! Markov fading trace.
//!
//! Samples one channel at a fixed step while cycling the chain through the
//! states of one parameter set, and writes every reported value to CSV.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use satfading::{
    write_trace_csv, ChannelType, FadingConfig, FadingOrchestrator, GeometryAccessors, SimTime,
};

#[derive(Debug, Parser)]
#[command(name = "markov_fading_trace")]
#[command(about = "Write a Markov fading trace with cycled state locks")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "FORWARD_USER")]
    channel: ChannelType,

    #[arg(long, default_value_t = 45.0)]
    elevation: f64,

    #[arg(long, default_value_t = 0.0)]
    velocity: f64,

    /// Number of samples
    #[arg(long, default_value_t = 100_000)]
    samples: u64,

    #[arg(long, default_value_t = 1)]
    step_ms: u64,

    /// Samples between lock changes
    #[arg(long, default_value_t = 20_000)]
    lock_every: u64,

    /// Parameter set whose states are cycled
    #[arg(long, default_value_t = 0)]
    set: usize,

    #[arg(long, default_value = "markov_fading_trace.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    ensure!(cli.lock_every > 0, "--lock-every must be greater than zero");

    let mut config = match &cli.config {
        Some(path) => FadingConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => FadingConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let clock = Rc::new(Cell::new(SimTime::ZERO));
    let mut orchestrator = FadingOrchestrator::from_config(
        config,
        GeometryAccessors::fixed(cli.elevation, cli.velocity),
        {
            let clock = Rc::clone(&clock);
            move || clock.get()
        },
    )
    .context("invalid fading configuration")?;

    let states = orchestrator
        .params()
        .sets()
        .get(cli.set)
        .map(|set| set.state_count())
        .with_context(|| format!("parameter set {} does not exist", cli.set))?;

    let records = Rc::new(RefCell::new(Vec::with_capacity(cli.samples as usize)));
    orchestrator.set_trace_sink({
        let records = Rc::clone(&records);
        move |record| records.borrow_mut().push(record.clone())
    });

    for i in 0..cli.samples {
        let now = SimTime::from_millis(i * cli.step_ms);
        clock.set(now);

        if i % cli.lock_every == 0 {
            let state = ((i / cli.lock_every) % states as u64) as usize;
            let chain = orchestrator
                .chain_mut(cli.channel)
                .with_context(|| format!("channel {} is not configured", cli.channel))?;
            chain.lock_to_set_and_state(cli.set, state)?;
            info!(time = %now, set = cli.set, state, "lock changed");
        }

        orchestrator.fading(cli.channel)?;
    }

    let records = records.borrow();
    write_trace_csv(&cli.output, &records)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(
        records = records.len(),
        output = %cli.output.display(),
        "trace written"
    );

    Ok(())
}
