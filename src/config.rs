use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;
use crate::FadingError;

/// Tolerance for transition matrix rows summing to one.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Engine configuration as loaded from TOML.
///
/// Only [`FadingConfig::validate`] decides whether the tables are usable;
/// [`crate::ParameterConfig::new`] refuses to build from anything it rejects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FadingConfig {
    /// Seed of the engine's RNG stream.
    pub seed: u64,
    /// State every chain starts in.
    pub initial_state: usize,
    /// Interval the transition matrices are expressed for [s].
    pub transition_interval_s: f64,
    /// Queries closer than this to the previous sample reuse it [s].
    pub cooldown_s: f64,
    /// Distance the terminal must cover before a transition is drawn [m].
    pub min_position_change_m: Option<f64>,
    /// Report dB (true) or linear power gain (false).
    pub use_decibels: bool,
    /// Upper bound of the elevation domain [deg].
    pub max_elevation_deg: f64,
    /// Samples are clamped into `[gain_floor_db, gain_ceiling_db]`.
    pub gain_floor_db: f64,
    pub gain_ceiling_db: f64,
    pub sets: Vec<SetConfig>,
}

/// One elevation bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConfig {
    /// Lower (inclusive) bound of the bracket [deg].
    pub min_elevation_deg: f64,
    /// Row-stochastic transition matrix, `states.len()` square.
    pub matrix: Vec<Vec<f64>>,
    pub states: Vec<StateModel>,
}

/// Sub-model bound to a Markov state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum StateModel {
    Loo(LooParams),
    Rayleigh(RayleighParams),
}

/// Loo shadowed-fading parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LooParams {
    /// Mean of the log-normal direct signal [dB]
    pub direct_mean_db: f64,
    /// Standard deviation of the log-normal direct signal [dB]
    pub direct_std_db: f64,
    /// Average multipath power relative to unit direct power [dB]
    pub multipath_power_db: f64,
    #[serde(default = "default_oscillators")]
    pub multipath_oscillators: usize,
    #[serde(default = "default_direct_doppler_hz")]
    pub direct_doppler_hz: f64,
    #[serde(default = "default_multipath_doppler_hz")]
    pub multipath_doppler_hz: f64,
    /// Distance over which shadowing decorrelates to 1/e [m]
    #[serde(default = "default_shadowing_correlation_m")]
    pub shadowing_correlation_m: f64,
}

/// Rayleigh multipath parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayleighParams {
    /// Maximum Doppler shift used when no carrier is configured [Hz]
    #[serde(default = "default_rayleigh_doppler_hz")]
    pub doppler_hz: f64,
    #[serde(default = "default_oscillators")]
    pub oscillators: usize,
    /// Carrier frequency; when set, Doppler follows terminal velocity [Hz]
    #[serde(default)]
    pub carrier_frequency_hz: Option<f64>,
    /// Seeds the oscillator phases independently of the engine stream.
    #[serde(default)]
    pub phase_seed: Option<u64>,
}

fn default_oscillators() -> usize {
    10
}

fn default_direct_doppler_hz() -> f64 {
    2.0
}

fn default_multipath_doppler_hz() -> f64 {
    30.0
}

fn default_shadowing_correlation_m() -> f64 {
    10.0
}

fn default_rayleigh_doppler_hz() -> f64 {
    10.0
}

impl LooParams {
    pub fn new(direct_mean_db: f64, direct_std_db: f64, multipath_power_db: f64) -> Self {
        Self {
            direct_mean_db,
            direct_std_db,
            multipath_power_db,
            multipath_oscillators: default_oscillators(),
            direct_doppler_hz: default_direct_doppler_hz(),
            multipath_doppler_hz: default_multipath_doppler_hz(),
            shadowing_correlation_m: default_shadowing_correlation_m(),
        }
    }

    fn validate(&self, at: &str) -> Result<(), FadingError> {
        let finite = [
            self.direct_mean_db,
            self.direct_std_db,
            self.multipath_power_db,
            self.direct_doppler_hz,
            self.multipath_doppler_hz,
            self.shadowing_correlation_m,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("{at}: Loo parameters must be finite")));
        }
        if self.direct_std_db < 0.0 {
            return Err(invalid(format!("{at}: direct_std_db must be >= 0")));
        }
        if self.multipath_oscillators == 0 {
            return Err(invalid(format!(
                "{at}: multipath_oscillators must be greater than zero"
            )));
        }
        if self.direct_doppler_hz < 0.0 || self.multipath_doppler_hz < 0.0 {
            return Err(invalid(format!("{at}: Doppler frequencies must be >= 0")));
        }
        if self.shadowing_correlation_m <= 0.0 {
            return Err(invalid(format!(
                "{at}: shadowing_correlation_m must be > 0"
            )));
        }
        Ok(())
    }
}

impl RayleighParams {
    pub fn new(doppler_hz: f64, oscillators: usize) -> Self {
        Self {
            doppler_hz,
            oscillators,
            carrier_frequency_hz: None,
            phase_seed: None,
        }
    }

    fn validate(&self, at: &str) -> Result<(), FadingError> {
        if !self.doppler_hz.is_finite() || self.doppler_hz < 0.0 {
            return Err(invalid(format!("{at}: doppler_hz must be finite and >= 0")));
        }
        if self.oscillators == 0 {
            return Err(invalid(format!("{at}: oscillators must be greater than zero")));
        }
        if let Some(carrier) = self.carrier_frequency_hz {
            if !carrier.is_finite() || carrier <= 0.0 {
                return Err(invalid(format!(
                    "{at}: carrier_frequency_hz must be finite and > 0"
                )));
            }
        }
        Ok(())
    }
}

/// Default tables: three elevation brackets, three Loo states each.
const DEFAULT_BRACKETS_DEG: [f64; 3] = [0.0, 30.0, 60.0];

const DEFAULT_MATRICES: [[[f64; 3]; 3]; 3] = [
    [[0.8, 0.1, 0.1], [0.1, 0.8, 0.1], [0.1, 0.1, 0.8]],
    [[0.6, 0.2, 0.2], [0.2, 0.6, 0.2], [0.2, 0.2, 0.6]],
    [[0.4, 0.3, 0.3], [0.3, 0.4, 0.3], [0.3, 0.3, 0.4]],
];

/// {direct mean dB, direct std dB, multipath power dB} per state
const DEFAULT_LOO_STATES: [[f64; 3]; 3] = [
    [0.0, 0.5, -25.0],
    [-10.0, 3.0, -25.0],
    [-21.0, 4.0, -25.0],
];

impl Default for FadingConfig {
    fn default() -> Self {
        let sets = DEFAULT_BRACKETS_DEG
            .iter()
            .zip(DEFAULT_MATRICES.iter())
            .map(|(&min_elevation_deg, matrix)| SetConfig {
                min_elevation_deg,
                matrix: matrix.iter().map(|row| row.to_vec()).collect(),
                states: DEFAULT_LOO_STATES
                    .iter()
                    .map(|p| StateModel::Loo(LooParams::new(p[0], p[1], p[2])))
                    .collect(),
            })
            .collect();

        Self {
            seed: 0x5A7F_AD1E_u64,
            initial_state: 0,
            transition_interval_s: 0.001,
            cooldown_s: 0.0,
            min_position_change_m: None,
            use_decibels: true,
            max_elevation_deg: 90.0,
            gain_floor_db: -60.0,
            gain_ceiling_db: 40.0,
            sets,
        }
    }
}

impl FadingConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, FadingError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FadingError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Single-state configuration covering the whole elevation domain.
    pub fn single_state(model: StateModel) -> Self {
        Self {
            sets: vec![SetConfig {
                min_elevation_deg: 0.0,
                matrix: vec![vec![1.0]],
                states: vec![model],
            }],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), FadingError> {
        if self.sets.is_empty() {
            return Err(invalid("at least one parameter set is required".to_string()));
        }

        if !self.transition_interval_s.is_finite() || self.transition_interval_s <= 0.0 {
            return Err(invalid(
                "transition_interval_s must be finite and > 0".to_string(),
            ));
        }
        if SimTime::from_secs(self.transition_interval_s).as_nanos() == 0 {
            return Err(invalid(
                "transition_interval_s must be at least 1 ns".to_string(),
            ));
        }

        if !self.cooldown_s.is_finite() || self.cooldown_s < 0.0 {
            return Err(invalid("cooldown_s must be finite and >= 0".to_string()));
        }

        if let Some(distance) = self.min_position_change_m {
            if !distance.is_finite() || distance < 0.0 {
                return Err(invalid(
                    "min_position_change_m must be finite and >= 0".to_string(),
                ));
            }
        }

        if !self.gain_floor_db.is_finite()
            || !self.gain_ceiling_db.is_finite()
            || self.gain_floor_db >= self.gain_ceiling_db
        {
            return Err(invalid(
                "gain_floor_db must be finite and below gain_ceiling_db".to_string(),
            ));
        }

        if !self.max_elevation_deg.is_finite() {
            return Err(invalid("max_elevation_deg must be finite".to_string()));
        }

        let mut previous_bound = f64::NEG_INFINITY;
        for (set_idx, set) in self.sets.iter().enumerate() {
            let at = format!("set {set_idx}");

            if !set.min_elevation_deg.is_finite() {
                return Err(invalid(format!("{at}: min_elevation_deg must be finite")));
            }
            if set.min_elevation_deg <= previous_bound {
                return Err(invalid(format!(
                    "{at}: elevation brackets must be strictly increasing"
                )));
            }
            if set.min_elevation_deg >= self.max_elevation_deg {
                return Err(invalid(format!(
                    "{at}: min_elevation_deg must be below max_elevation_deg"
                )));
            }
            previous_bound = set.min_elevation_deg;

            let n = set.states.len();
            if n == 0 {
                return Err(invalid(format!("{at}: at least one state is required")));
            }
            if set.matrix.len() != n {
                return Err(invalid(format!(
                    "{at}: matrix has {} rows but {} states are configured",
                    set.matrix.len(),
                    n
                )));
            }

            for (row_idx, row) in set.matrix.iter().enumerate() {
                if row.len() != n {
                    return Err(invalid(format!(
                        "{at}: row {row_idx} has {} entries, expected {n}",
                        row.len()
                    )));
                }
                if row.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
                    return Err(invalid(format!(
                        "{at}: row {row_idx} has a probability outside [0, 1]"
                    )));
                }
                let sum: f64 = row.iter().sum();
                if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                    return Err(invalid(format!(
                        "{at}: row {row_idx} sums to {sum}, not 1"
                    )));
                }
            }

            for (state_idx, model) in set.states.iter().enumerate() {
                let at = format!("set {set_idx} state {state_idx}");
                match model {
                    StateModel::Loo(params) => params.validate(&at)?,
                    StateModel::Rayleigh(params) => params.validate(&at)?,
                }
            }
        }

        if self.initial_state >= self.sets[0].states.len() {
            return Err(invalid(format!(
                "initial_state {} is out of range for set 0",
                self.initial_state
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> FadingError {
    FadingError::InvalidConfig(message)
}
