//! Fading model interface
//!
//! A fader synthesises a correlated gain trajectory for one family of
//! sub-models. The Markov chain owns at most one fader per [`FaderKind`] and
//! rebinds it to whichever (set, state) pair is active.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::config::StateModel;
use crate::db_to_linear;
use crate::loo::LooFader;
use crate::params::ParameterConfig;
use crate::rayleigh::RayleighFader;
use crate::time::SimTime;
use crate::FadingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaderKind {
    Loo,
    Rayleigh,
}

impl FaderKind {
    pub const ALL: [FaderKind; 2] = [FaderKind::Loo, FaderKind::Rayleigh];

    /// Dense index, usable as a slot in per-kind tables.
    pub fn index(self) -> usize {
        match self {
            FaderKind::Loo => 0,
            FaderKind::Rayleigh => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FaderKind::Loo => "loo",
            FaderKind::Rayleigh => "rayleigh",
        }
    }
}

impl From<&StateModel> for FaderKind {
    fn from(model: &StateModel) -> Self {
        match model {
            StateModel::Loo(_) => FaderKind::Loo,
            StateModel::Rayleigh(_) => FaderKind::Rayleigh,
        }
    }
}

impl fmt::Display for FaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Fader: fmt::Debug {
    fn kind(&self) -> FaderKind;

    /// `(set, state)` the fader currently draws its parameters from.
    fn binding(&self) -> (usize, usize);

    /// Rebind to the parameters of `(set, state)` without resetting the
    /// correlated internal state. A state of another kind leaves the binding
    /// untouched and returns [`FadingError::ModelMismatch`].
    fn update_parameters(&mut self, set: usize, state: usize) -> Result<(), FadingError>;

    /// Advance the process to `now` and return the new gain sample [dB].
    fn sample_gain_db(&mut self, now: SimTime, velocity_mps: f64, rng: &mut dyn RngCore) -> f64;

    /// Last sampled gain [dB].
    fn gain_db(&self) -> f64;

    /// Last sampled gain as a linear power ratio.
    fn gain(&self) -> f64 {
        db_to_linear(self.gain_db())
    }
}

/// Build the fader serving `(set, state)`, already bound to it.
pub fn build_fader(
    params: &Arc<ParameterConfig>,
    set: usize,
    state: usize,
    rng: &mut dyn RngCore,
) -> Result<Box<dyn Fader>, FadingError> {
    Ok(match params.state_model(set, state) {
        StateModel::Loo(_) => Box::new(LooFader::new(Arc::clone(params), set, state, rng)?),
        StateModel::Rayleigh(_) => {
            Box::new(RayleighFader::new(Arc::clone(params), set, state, rng)?)
        }
    })
}

/// Elapsed seconds between the previous sample and `now`.
pub(crate) fn elapsed_s(last: Option<SimTime>, now: SimTime) -> f64 {
    last.and_then(|last| now.duration_since(last))
        .map(|dt| dt.as_secs_f64())
        .unwrap_or(0.0)
}
