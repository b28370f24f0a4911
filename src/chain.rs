//! Per-channel Markov chain
//!
//! Tracks the active parameter set and state of one channel, draws state
//! transitions scaled to the elapsed simulated time, and delegates the gain
//! query to the fader serving the occupied state.

use std::sync::Arc;

use rand::{Rng, RngCore};
use tracing::debug;

use crate::fader::{build_fader, Fader, FaderKind};
use crate::markov::sample_row;
use crate::params::ParameterConfig;
use crate::time::SimTime;
use crate::{db_to_linear, FadingError};

#[derive(Debug)]
pub struct MarkovChain {
    params: Arc<ParameterConfig>,
    set: usize,
    state: usize,
    /// Time of the last query, cached or not
    last_query: SimTime,
    /// Time of the last computed sample
    last_update: SimTime,
    /// Time of the last transition decision
    last_transition: SimTime,
    cached_gain_db: Option<f64>,
    set_locked: bool,
    state_locked: bool,
    /// One lazily created fader per kind
    faders: [Option<Box<dyn Fader>>; 2],
}

impl MarkovChain {
    /// Chain starting at `start` in set 0 and the configured initial state.
    pub fn new(params: Arc<ParameterConfig>, start: SimTime) -> Self {
        let state = params.initial_state();
        Self {
            params,
            set: 0,
            state,
            last_query: start,
            last_update: start,
            last_transition: start,
            cached_gain_db: None,
            set_locked: false,
            state_locked: false,
            faders: [None, None],
        }
    }

    /// Gain [dB] at `now` for a terminal at `elevation_deg` moving at
    /// `velocity_mps`.
    ///
    /// Panics if `now` precedes the previous query, including one answered
    /// from the cooldown cache.
    pub fn evaluate(
        &mut self,
        elevation_deg: f64,
        velocity_mps: f64,
        now: SimTime,
        rng: &mut dyn RngCore,
    ) -> Result<f64, FadingError> {
        assert!(
            now >= self.last_query,
            "time regression: query at {now} precedes previous query at {}",
            self.last_query
        );
        self.last_query = now;

        if !self.set_locked {
            let target = self.params.lookup(elevation_deg).index;
            if target != self.set {
                self.switch_set(target);
            }
        }

        // Inside the cooldown (or at dt = 0) the previous sample stands
        let since_update = now.duration_since(self.last_update).unwrap_or(SimTime::ZERO);
        if let Some(cached) = self.cached_gain_db {
            if since_update <= self.params.cooldown() {
                return Ok(cached);
            }
        }

        let since_transition = now
            .duration_since(self.last_transition)
            .unwrap_or(SimTime::ZERO);
        if since_transition > SimTime::ZERO && self.position_changed(since_transition, velocity_mps)
        {
            self.transition(since_transition, rng);
            self.last_transition = now;
        }

        let gain_db = self.sample(now, velocity_mps, rng)?;
        self.cached_gain_db = Some(gain_db);
        self.last_update = now;
        Ok(gain_db)
    }

    fn switch_set(&mut self, set: usize) {
        let max_state = self.params.state_count(set) - 1;
        let state = self.state.min(max_state);
        debug!(
            from_set = self.set,
            to_set = set,
            from_state = self.state,
            to_state = state,
            "parameter set switch"
        );
        self.set = set;
        self.state = state;
    }

    /// Whether the terminal moved far enough for a transition decision.
    fn position_changed(&self, elapsed: SimTime, velocity_mps: f64) -> bool {
        match self.params.min_position_change_m() {
            Some(min_distance) => velocity_mps.abs() * elapsed.as_secs_f64() > min_distance,
            None => true,
        }
    }

    /// Draw the next state after `elapsed`; one uniform draw per decision.
    fn transition(&mut self, elapsed: SimTime, rng: &mut dyn RngCore) {
        if self.state_locked {
            return;
        }

        let steps = elapsed.as_secs_f64() / self.params.transition_interval().as_secs_f64();
        let row = self.params.matrix(self.set).row_after(self.state, steps);
        let u: f64 = rng.gen();
        let next = sample_row(&row, u);

        if next != self.state {
            debug!(set = self.set, from = self.state, to = next, steps, "state transition");
            self.state = next;
        }
    }

    /// Sample the fader serving the current state, rebinding it first if it
    /// last served another (set, state).
    fn sample(
        &mut self,
        now: SimTime,
        velocity_mps: f64,
        rng: &mut dyn RngCore,
    ) -> Result<f64, FadingError> {
        let (set, state) = (self.set, self.state);
        let kind = FaderKind::from(self.params.state_model(set, state));

        let slot = &mut self.faders[kind.index()];
        let fader = match slot.take() {
            Some(fader) => fader,
            None => build_fader(&self.params, set, state, rng)?,
        };
        let fader = slot.insert(fader);
        if fader.binding() != (set, state) {
            fader.update_parameters(set, state)?;
        }
        Ok(fader.sample_gain_db(now, velocity_mps, rng))
    }

    /// Pin the chain to `(set, state)`: no elevation rebinding, no transitions.
    pub fn lock_to_set_and_state(&mut self, set: usize, state: usize) -> Result<(), FadingError> {
        self.check_lock(set, state)?;
        self.set = set;
        self.state = state;
        self.set_locked = true;
        self.state_locked = true;
        debug!(set, state, "locked to set and state");
        Ok(())
    }

    /// Pin the parameter set; states keep transitioning within it.
    pub fn lock_to_set(&mut self, set: usize) -> Result<(), FadingError> {
        if set >= self.params.set_count() {
            return Err(FadingError::InvalidLock {
                set,
                state: self.state,
            });
        }
        if set != self.set {
            self.switch_set(set);
        }
        self.set_locked = true;
        self.state_locked = false;
        debug!(set, "locked to set");
        Ok(())
    }

    /// Lock to a uniformly chosen set and state.
    pub fn randomize_locked_set_and_state(&mut self, rng: &mut dyn RngCore) {
        let set = rng.gen_range(0..self.params.set_count());
        let state = rng.gen_range(0..self.params.state_count(set));
        self.set = set;
        self.state = state;
        self.set_locked = true;
        self.state_locked = true;
        debug!(set, state, "locked to random set and state");
    }

    /// Lock to `set` and a uniformly chosen state within it.
    pub fn randomize_locked_state(
        &mut self,
        set: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(), FadingError> {
        if set >= self.params.set_count() {
            return Err(FadingError::InvalidLock {
                set,
                state: self.state,
            });
        }
        let state = rng.gen_range(0..self.params.state_count(set));
        self.lock_to_set_and_state(set, state)
    }

    pub fn unlock(&mut self) {
        self.set_locked = false;
        self.state_locked = false;
        debug!(set = self.set, state = self.state, "unlocked");
    }

    fn check_lock(&self, set: usize, state: usize) -> Result<(), FadingError> {
        if set >= self.params.set_count() || state >= self.params.state_count(set) {
            return Err(FadingError::InvalidLock { set, state });
        }
        Ok(())
    }

    pub fn set_index(&self) -> usize {
        self.set
    }

    pub fn state_index(&self) -> usize {
        self.state
    }

    pub fn last_update(&self) -> SimTime {
        self.last_update
    }

    pub fn cached_gain_db(&self) -> Option<f64> {
        self.cached_gain_db
    }

    /// Linear view of the cached sample.
    pub fn cached_gain(&self) -> Option<f64> {
        self.cached_gain_db.map(db_to_linear)
    }

    pub fn is_set_locked(&self) -> bool {
        self.set_locked
    }

    pub fn is_state_locked(&self) -> bool {
        self.state_locked
    }

    /// Fader of `kind`, if the chain has needed one yet.
    pub fn fader(&self, kind: FaderKind) -> Option<&dyn Fader> {
        self.faders[kind.index()].as_deref()
    }

    pub fn params(&self) -> &Arc<ParameterConfig> {
        &self.params
    }
}
