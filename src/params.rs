//! Parameter configuration
//!
//! Validated, immutable elevation-binned parameter sets shared by every
//! Markov chain of an orchestrator.

use tracing::warn;

use crate::config::{FadingConfig, StateModel};
use crate::markov::TransitionMatrix;
use crate::time::SimTime;
use crate::FadingError;

/// Statistics of one elevation bracket.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    /// Inclusive lower elevation bound [deg]
    pub min_elevation_deg: f64,
    matrix: TransitionMatrix,
    states: Vec<StateModel>,
    stationary: Vec<f64>,
}

impl ParameterSet {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    pub fn state_model(&self, state: usize) -> &StateModel {
        &self.states[state]
    }

    pub fn states(&self) -> &[StateModel] {
        &self.states
    }

    pub fn stationary_distribution(&self) -> &[f64] {
        &self.stationary
    }
}

/// Outcome of an elevation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLookup {
    pub index: usize,
    /// The elevation lay outside the configured domain.
    pub clamped: bool,
}

/// Loaded and validated engine parameters.
#[derive(Debug, Clone)]
pub struct ParameterConfig {
    sets: Vec<ParameterSet>,
    max_elevation_deg: f64,
    seed: u64,
    initial_state: usize,
    transition_interval: SimTime,
    cooldown: SimTime,
    min_position_change_m: Option<f64>,
    use_decibels: bool,
    gain_floor_db: f64,
    gain_ceiling_db: f64,
}

impl ParameterConfig {
    /// Validate `config` and freeze its tables.
    pub fn new(config: FadingConfig) -> Result<Self, FadingError> {
        config.validate()?;

        let sets = config
            .sets
            .into_iter()
            .map(|set| {
                let matrix = TransitionMatrix::from_rows(&set.matrix);
                let stationary = matrix.stationary_distribution();
                ParameterSet {
                    min_elevation_deg: set.min_elevation_deg,
                    matrix,
                    states: set.states,
                    stationary,
                }
            })
            .collect();

        Ok(Self {
            sets,
            max_elevation_deg: config.max_elevation_deg,
            seed: config.seed,
            initial_state: config.initial_state,
            transition_interval: SimTime::from_secs(config.transition_interval_s),
            cooldown: SimTime::from_secs(config.cooldown_s),
            min_position_change_m: config.min_position_change_m,
            use_decibels: config.use_decibels,
            gain_floor_db: config.gain_floor_db,
            gain_ceiling_db: config.gain_ceiling_db,
        })
    }

    /// Resolve the parameter set for `elevation_deg`.
    ///
    /// Brackets are closed below: a value equal to a bound belongs to the
    /// bracket starting there. Values outside the domain are clamped to the
    /// nearest bracket and reported through `clamped`.
    pub fn lookup(&self, elevation_deg: f64) -> SetLookup {
        let lowest = self.sets[0].min_elevation_deg;

        if elevation_deg.is_nan() || elevation_deg < lowest {
            warn!(
                elevation_deg,
                lowest, "elevation below configured domain, clamping to lowest set"
            );
            return SetLookup {
                index: 0,
                clamped: true,
            };
        }

        let clamped = elevation_deg > self.max_elevation_deg;
        if clamped {
            warn!(
                elevation_deg,
                max = self.max_elevation_deg,
                "elevation above configured domain, clamping to highest set"
            );
        }

        let index = self
            .sets
            .iter()
            .rposition(|set| elevation_deg >= set.min_elevation_deg)
            .unwrap_or(0);

        SetLookup { index, clamped }
    }

    pub fn set_index(&self, elevation_deg: f64) -> usize {
        self.lookup(elevation_deg).index
    }

    pub fn set(&self, index: usize) -> &ParameterSet {
        &self.sets[index]
    }

    pub fn sets(&self) -> &[ParameterSet] {
        &self.sets
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn state_count(&self, set: usize) -> usize {
        self.sets[set].state_count()
    }

    pub fn state_model(&self, set: usize, state: usize) -> &StateModel {
        self.sets[set].state_model(state)
    }

    pub fn matrix(&self, set: usize) -> &TransitionMatrix {
        &self.sets[set].matrix
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn initial_state(&self) -> usize {
        self.initial_state
    }

    pub fn transition_interval(&self) -> SimTime {
        self.transition_interval
    }

    pub fn cooldown(&self) -> SimTime {
        self.cooldown
    }

    pub fn min_position_change_m(&self) -> Option<f64> {
        self.min_position_change_m
    }

    pub fn use_decibels(&self) -> bool {
        self.use_decibels
    }

    /// Clamp a gain sample into the configured envelope.
    pub fn clamp_gain_db(&self, gain_db: f64) -> f64 {
        if gain_db.is_nan() {
            return self.gain_floor_db;
        }
        gain_db.clamp(self.gain_floor_db, self.gain_ceiling_db)
    }

    /// Largest multipath oscillator count over all Loo states.
    pub fn max_loo_oscillators(&self) -> usize {
        self.models()
            .filter_map(|model| match model {
                StateModel::Loo(p) => Some(p.multipath_oscillators),
                StateModel::Rayleigh(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Largest oscillator count over all Rayleigh states.
    pub fn max_rayleigh_oscillators(&self) -> usize {
        self.models()
            .filter_map(|model| match model {
                StateModel::Rayleigh(p) => Some(p.oscillators),
                StateModel::Loo(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn models(&self) -> impl Iterator<Item = &StateModel> {
        self.sets.iter().flat_map(|set| set.states.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ROW_SUM_TOLERANCE;

    fn default_params() -> ParameterConfig {
        ParameterConfig::new(FadingConfig::default()).unwrap()
    }

    #[test]
    fn rows_of_loaded_sets_are_stochastic() {
        let params = default_params();
        for set in params.sets() {
            for i in 0..set.state_count() {
                let sum: f64 = set.matrix().row(i).iter().sum();
                assert!((sum - 1.0).abs() < ROW_SUM_TOLERANCE);
            }
        }
    }

    #[test]
    fn lookup_resolves_brackets() {
        let params = default_params();
        assert_eq!(params.set_index(0.0), 0);
        assert_eq!(params.set_index(29.999), 0);
        assert_eq!(params.set_index(30.0), 1);
        assert_eq!(params.set_index(45.0), 1);
        assert_eq!(params.set_index(60.0), 2);
        assert_eq!(params.set_index(90.0), 2);
    }

    #[test]
    fn out_of_domain_elevations_are_clamped_and_reported() {
        let params = default_params();
        let below = params.lookup(-10.0);
        assert_eq!(below, SetLookup { index: 0, clamped: true });
        assert_eq!(below.index, params.lookup(0.0).index);
        assert!(!params.lookup(0.0).clamped);

        let above = params.lookup(120.0);
        assert_eq!(above, SetLookup { index: 2, clamped: true });

        assert!(params.lookup(f64::NAN).clamped);
    }

    #[test]
    fn invalid_config_refuses_to_load() {
        let mut config = FadingConfig::default();
        config.sets[2].matrix[0][0] = 0.9;
        assert!(matches!(
            ParameterConfig::new(config),
            Err(FadingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn engine_settings_are_carried_over() {
        let config = FadingConfig {
            cooldown_s: 0.0005,
            transition_interval_s: 0.01,
            ..FadingConfig::default()
        };
        let params = ParameterConfig::new(config).unwrap();
        assert_eq!(params.cooldown(), SimTime::from_micros(500));
        assert_eq!(params.transition_interval(), SimTime::from_millis(10));
    }
}
