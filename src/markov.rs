//! Markov transition kernel
//!
//! A row-stochastic matrix expressed for one reference interval, and the
//! time scaling that turns it into the transition distribution for an
//! arbitrary elapsed time.

/// Row-stochastic transition matrix, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    n: usize,
    p: Vec<f64>,
}

impl TransitionMatrix {
    /// Build from validated rows. Rows must be square and row-stochastic.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        assert!(n > 0, "transition matrix must have at least one state");
        assert!(
            rows.iter().all(|row| row.len() == n),
            "transition matrix must be square"
        );
        Self {
            n,
            p: rows.iter().flatten().copied().collect(),
        }
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.p[from * self.n + to]
    }

    pub fn row(&self, from: usize) -> &[f64] {
        &self.p[from * self.n..(from + 1) * self.n]
    }

    /// Distribution over next states after `steps` reference intervals,
    /// starting from `state`.
    ///
    /// Uses `P(n) = P^floor(n) * ((1 - f) I + f P)` with `f = n - floor(n)`,
    /// which is exact at integer `n`, favours self-transition for `n < 1`
    /// and tends to the stationary distribution as `n` grows.
    pub fn row_after(&self, state: usize, steps: f64) -> Vec<f64> {
        assert!(state < self.n, "state {state} out of range");

        let steps = if steps.is_nan() { 0.0 } else { steps.max(0.0) };
        let whole = steps.floor();
        let frac = steps - whole;
        let mut k = if whole >= u64::MAX as f64 {
            u64::MAX
        } else {
            whole as u64
        };

        let mut v = vec![0.0; self.n];
        v[state] = 1.0;

        // Square-and-multiply on the row vector
        let mut base = self.p.clone();
        while k > 0 {
            if k & 1 == 1 {
                v = vec_mat(&v, &base, self.n);
            }
            k >>= 1;
            if k > 0 {
                base = mat_mat(&base, &base, self.n);
            }
        }

        if frac > 0.0 {
            let stepped = vec_mat(&v, &self.p, self.n);
            for (vi, si) in v.iter_mut().zip(stepped) {
                *vi = (1.0 - frac) * *vi + frac * si;
            }
        }

        normalize(&mut v);
        v
    }

    /// Stationary distribution, computed on the lazy chain `(P + I) / 2` so
    /// periodic chains converge too.
    pub fn stationary_distribution(&self) -> Vec<f64> {
        let n = self.n;
        let mut lazy = self.p.clone();
        for i in 0..n {
            for j in 0..n {
                let identity = if i == j { 1.0 } else { 0.0 };
                lazy[i * n + j] = 0.5 * (lazy[i * n + j] + identity);
            }
        }

        // lazy^(2^64)
        for _ in 0..64 {
            lazy = mat_mat(&lazy, &lazy, n);
        }

        let uniform = vec![1.0 / n as f64; n];
        let mut pi = vec_mat(&uniform, &lazy, n);
        normalize(&mut pi);
        pi
    }
}

/// Inverse-CDF selection of a state from a probability row. `u` is a
/// uniform draw in `[0, 1)`. Round-off falls through to the last state with
/// non-zero probability, so a zero-probability state is never selected.
pub fn sample_row(row: &[f64], u: f64) -> usize {
    let mut acc = 0.0;
    for (idx, &p) in row.iter().enumerate() {
        acc += p;
        if u < acc {
            return idx;
        }
    }
    row.iter()
        .rposition(|&p| p > 0.0)
        .unwrap_or(row.len().saturating_sub(1))
}

fn vec_mat(v: &[f64], m: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for (i, &vi) in v.iter().enumerate() {
        if vi == 0.0 {
            continue;
        }
        for j in 0..n {
            out[j] += vi * m[i * n + j];
        }
    }
    out
}

fn mat_mat(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        let row = vec_mat(&a[i * n..(i + 1) * n], b, n);
        out[i * n..(i + 1) * n].copy_from_slice(&row);
    }
    for i in 0..n {
        normalize(&mut out[i * n..(i + 1) * n]);
    }
    out
}

fn normalize(v: &mut [f64]) {
    for x in v.iter_mut() {
        if *x < 0.0 {
            *x = 0.0;
        }
    }
    let sum: f64 = v.iter().sum();
    if sum > 0.0 {
        for x in v.iter_mut() {
            *x /= sum;
        }
    }
}
