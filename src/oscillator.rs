//! Sum-of-sinusoids oscillator bank
//!
//! Each oscillator rotates at `f_d * cos(alpha_n)` where
//! `alpha_n = (2 pi n - pi + theta) / 4M`, `n = 1..M`. Phases are kept as
//! accumulators wrapped into `[0, 2 pi)`, so arbitrarily long gaps between
//! samples never grow them without bound.

use std::f64::consts::{PI, TAU};

use num_complex::Complex64;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct OscillatorBank {
    /// Common angle-of-arrival offset
    theta: f64,
    phases: Vec<f64>,
}

impl OscillatorBank {
    /// Bank of `capacity` oscillators with independent uniform phases.
    pub fn new<R: Rng + ?Sized>(capacity: usize, rng: &mut R) -> Self {
        let theta = rng.gen_range(-PI..PI);
        let phases = (0..capacity).map(|_| rng.gen_range(0.0..TAU)).collect();
        Self { theta, phases }
    }

    pub fn capacity(&self) -> usize {
        self.phases.len()
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// Frequency factor `cos(alpha_n)` of oscillator `idx` in an `active`-sized sum.
    fn doppler_factor(&self, idx: usize, active: usize) -> f64 {
        let n = (idx + 1) as f64;
        let alpha = (2.0 * PI * n - PI + self.theta) / (4.0 * active as f64);
        alpha.cos()
    }

    /// Rotate the first `active` oscillators by `elapsed_s` at maximum Doppler `doppler_hz`.
    pub fn advance(&mut self, active: usize, doppler_hz: f64, elapsed_s: f64) {
        let active = active.min(self.phases.len());
        for idx in 0..active {
            let cycles = doppler_hz * self.doppler_factor(idx, active) * elapsed_s;
            // Only the fractional turn matters; keeps precision for huge gaps
            let turn = cycles - cycles.floor();
            if turn.is_finite() {
                self.phases[idx] = (self.phases[idx] + TAU * turn).rem_euclid(TAU);
            }
        }
    }

    /// Unit-power complex envelope of the first `active` oscillators.
    pub fn envelope(&self, active: usize) -> Complex64 {
        let active = active.min(self.phases.len());
        if active == 0 {
            return Complex64::new(0.0, 0.0);
        }
        let sum: Complex64 = self.phases[..active]
            .iter()
            .map(|&phase| Complex64::from_polar(1.0, phase))
            .sum();
        sum / (active as f64).sqrt()
    }
}
