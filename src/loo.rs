//! Loo shadowed-multipath fader
//!
//! The complex gain is a log-normally shadowed direct component plus a
//! Rayleigh-distributed multipath component:
//!
//! `g = 10^((m + s * x) / 20) * e^{j phi} + sqrt(P_mp) * w`
//!
//! where `x` is a unit-variance AR(1) shadowing sequence whose correlation
//! decays over `shadowing_correlation_m` of travelled distance, `phi` rotates
//! at the direct Doppler frequency and `w` is a unit-power sum of sinusoids.

use std::f64::consts::TAU;
use std::sync::Arc;

use num_complex::Complex64;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use tracing::trace;

use crate::config::{LooParams, StateModel};
use crate::fader::{elapsed_s, Fader, FaderKind};
use crate::linear_to_db;
use crate::oscillator::OscillatorBank;
use crate::params::ParameterConfig;
use crate::time::SimTime;
use crate::FadingError;

#[derive(Debug, Clone)]
pub struct LooFader {
    params: Arc<ParameterConfig>,
    set: usize,
    state: usize,
    loo: LooParams,
    /// Standardised shadowing, N(0, 1) marginal
    shadowing: f64,
    direct_phase: f64,
    multipath: OscillatorBank,
    last_sample: Option<SimTime>,
    gain_db: f64,
}

impl LooFader {
    /// Fader bound to `(set, state)`, which must be a Loo state.
    pub fn new(
        params: Arc<ParameterConfig>,
        set: usize,
        state: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self, FadingError> {
        let loo = loo_params(&params, set, state)?;
        let shadowing: f64 = rng.sample(StandardNormal);
        let direct_phase = rng.gen_range(0.0..TAU);
        let multipath = OscillatorBank::new(params.max_loo_oscillators(), rng);

        let mut fader = Self {
            params,
            set,
            state,
            loo,
            shadowing,
            direct_phase,
            multipath,
            last_sample: None,
            gain_db: 0.0,
        };
        fader.gain_db = fader.compose_gain_db();
        Ok(fader)
    }

    pub fn params(&self) -> &LooParams {
        &self.loo
    }

    /// Current complex channel coefficient.
    pub fn coefficient(&self) -> Complex64 {
        let direct_db = self.loo.direct_mean_db + self.loo.direct_std_db * self.shadowing;
        let direct = Complex64::from_polar(10f64.powf(direct_db / 20.0), self.direct_phase);
        let multipath_amp = 10f64.powf(self.loo.multipath_power_db / 20.0);
        direct + self.multipath.envelope(self.loo.multipath_oscillators) * multipath_amp
    }

    fn compose_gain_db(&self) -> f64 {
        self.params
            .clamp_gain_db(linear_to_db(self.coefficient().norm_sqr()))
    }
}

impl Fader for LooFader {
    fn kind(&self) -> FaderKind {
        FaderKind::Loo
    }

    fn binding(&self) -> (usize, usize) {
        (self.set, self.state)
    }

    fn update_parameters(&mut self, set: usize, state: usize) -> Result<(), FadingError> {
        self.loo = loo_params(&self.params, set, state)?;
        self.set = set;
        self.state = state;
        Ok(())
    }

    fn sample_gain_db(&mut self, now: SimTime, velocity_mps: f64, rng: &mut dyn RngCore) -> f64 {
        let dt = elapsed_s(self.last_sample, now);

        let distance = if velocity_mps.is_finite() {
            velocity_mps.abs() * dt
        } else {
            0.0
        };
        let rho = (-distance / self.loo.shadowing_correlation_m).exp();
        let innovation: f64 = rng.sample(StandardNormal);
        self.shadowing = rho * self.shadowing + (1.0 - rho * rho).sqrt() * innovation;

        let cycles = self.loo.direct_doppler_hz * dt;
        self.direct_phase = (self.direct_phase + TAU * (cycles - cycles.floor())).rem_euclid(TAU);
        self.multipath.advance(
            self.loo.multipath_oscillators,
            self.loo.multipath_doppler_hz,
            dt,
        );

        self.last_sample = Some(now);
        self.gain_db = self.compose_gain_db();
        trace!(set = self.set, state = self.state, gain_db = self.gain_db, "loo sample");
        self.gain_db
    }

    fn gain_db(&self) -> f64 {
        self.gain_db
    }
}

fn loo_params(
    params: &ParameterConfig,
    set: usize,
    state: usize,
) -> Result<LooParams, FadingError> {
    match params.state_model(set, state) {
        StateModel::Loo(loo) => Ok(loo.clone()),
        other => Err(FadingError::ModelMismatch {
            set,
            state,
            expected: FaderKind::Loo,
            found: FaderKind::from(other),
        }),
    }
}
