//! satfading - Markov fading engine for satellite channels
//!
//! A multi-state, elevation- and velocity-aware Markov process that selects,
//! at each query, which statistical fading law (Loo shadowing or Rayleigh
//! multipath) supplies the instantaneous channel gain. One chain runs per
//! logical channel; a discrete-event simulator polls the
//! [`FadingOrchestrator`] whenever a transmission has to be evaluated.

pub mod chain;
pub mod channel;
pub mod config;
pub mod fader;
pub mod loo;
pub mod markov;
pub mod orchestrator;
pub mod oscillator;
pub mod params;
pub mod rayleigh;
pub mod time;
pub mod trace;

use thiserror::Error;

// Re-export main types
pub use chain::MarkovChain;
pub use channel::ChannelType;
pub use config::{FadingConfig, LooParams, RayleighParams, SetConfig, StateModel};
pub use fader::{Fader, FaderKind};
pub use loo::LooFader;
pub use markov::TransitionMatrix;
pub use orchestrator::{FadingOrchestrator, GeometryAccessors};
pub use params::{ParameterConfig, ParameterSet, SetLookup};
pub use rayleigh::RayleighFader;
pub use time::SimTime;
pub use trace::{write_trace_csv, FadingTraceRecord};

#[derive(Debug, Error)]
pub enum FadingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    #[error("cannot lock to set {set}, state {state}")]
    InvalidLock { set: usize, state: usize },
    #[error("set {set} state {state} uses the {found} model, not {expected}")]
    ModelMismatch {
        set: usize,
        state: usize,
        expected: FaderKind,
        found: FaderKind,
    },
}

/// Convert a power ratio in dB to linear scale.
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Convert a linear power ratio to dB.
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}
