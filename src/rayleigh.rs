//! Rayleigh multipath fader
//!
//! Sum-of-sinusoids synthesis: the envelope is a unit-power sum of
//! oscillators whose maximum Doppler follows the terminal velocity when a
//! carrier frequency is configured. Oscillator phases are drawn once, so the
//! trajectory itself consumes no randomness.

use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::config::{RayleighParams, StateModel};
use crate::fader::{elapsed_s, Fader, FaderKind};
use crate::linear_to_db;
use crate::oscillator::OscillatorBank;
use crate::params::ParameterConfig;
use crate::time::SimTime;
use crate::FadingError;

/// Speed of light [m/s].
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

#[derive(Debug, Clone)]
pub struct RayleighFader {
    params: Arc<ParameterConfig>,
    set: usize,
    state: usize,
    rayleigh: RayleighParams,
    bank: OscillatorBank,
    last_sample: Option<SimTime>,
    gain_db: f64,
}

impl RayleighFader {
    /// Fader bound to `(set, state)`, which must be a Rayleigh state.
    ///
    /// Phases come from the state's `phase_seed` when one is configured,
    /// otherwise from `rng`.
    pub fn new(
        params: Arc<ParameterConfig>,
        set: usize,
        state: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self, FadingError> {
        let rayleigh = rayleigh_params(&params, set, state)?;
        let capacity = params.max_rayleigh_oscillators();
        let bank = match rayleigh.phase_seed {
            Some(seed) => OscillatorBank::new(capacity, &mut ChaCha8Rng::seed_from_u64(seed)),
            None => OscillatorBank::new(capacity, rng),
        };

        let mut fader = Self {
            params,
            set,
            state,
            rayleigh,
            bank,
            last_sample: None,
            gain_db: 0.0,
        };
        fader.gain_db = fader.compose_gain_db();
        Ok(fader)
    }

    pub fn params(&self) -> &RayleighParams {
        &self.rayleigh
    }

    /// Maximum Doppler shift for a terminal moving at `velocity_mps` [Hz].
    ///
    /// With a carrier configured the shift is `|v| f_c / c`, so a stationary
    /// terminal sees a frozen envelope. Without one the configured
    /// `doppler_hz` applies at any velocity.
    pub fn doppler_hz(&self, velocity_mps: f64) -> f64 {
        match self.rayleigh.carrier_frequency_hz {
            Some(carrier) if velocity_mps.is_finite() => {
                velocity_mps.abs() * carrier / SPEED_OF_LIGHT
            }
            Some(_) => 0.0,
            None => self.rayleigh.doppler_hz,
        }
    }

    pub fn phases(&self) -> &[f64] {
        self.bank.phases()
    }

    fn compose_gain_db(&self) -> f64 {
        let envelope = self.bank.envelope(self.rayleigh.oscillators);
        self.params.clamp_gain_db(linear_to_db(envelope.norm_sqr()))
    }
}

impl Fader for RayleighFader {
    fn kind(&self) -> FaderKind {
        FaderKind::Rayleigh
    }

    fn binding(&self) -> (usize, usize) {
        (self.set, self.state)
    }

    fn update_parameters(&mut self, set: usize, state: usize) -> Result<(), FadingError> {
        self.rayleigh = rayleigh_params(&self.params, set, state)?;
        self.set = set;
        self.state = state;
        Ok(())
    }

    fn sample_gain_db(&mut self, now: SimTime, velocity_mps: f64, _rng: &mut dyn RngCore) -> f64 {
        let dt = elapsed_s(self.last_sample, now);
        let doppler = self.doppler_hz(velocity_mps);
        self.bank.advance(self.rayleigh.oscillators, doppler, dt);

        self.last_sample = Some(now);
        self.gain_db = self.compose_gain_db();
        trace!(
            set = self.set,
            state = self.state,
            doppler,
            gain_db = self.gain_db,
            "rayleigh sample"
        );
        self.gain_db
    }

    fn gain_db(&self) -> f64 {
        self.gain_db
    }
}

fn rayleigh_params(
    params: &ParameterConfig,
    set: usize,
    state: usize,
) -> Result<RayleighParams, FadingError> {
    match params.state_model(set, state) {
        StateModel::Rayleigh(rayleigh) => Ok(rayleigh.clone()),
        other => Err(FadingError::ModelMismatch {
            set,
            state,
            expected: FaderKind::Rayleigh,
            found: FaderKind::from(other),
        }),
    }
}
