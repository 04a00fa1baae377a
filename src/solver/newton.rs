//! Newton-Raphson and secant root finders
//!
//! Every rate computation in the engine inverts a present-value equation for
//! the discount factor `k = 1/(1+periodic rate)`. Both solvers stop when the
//! residual falls inside the tolerance or after a fixed number of rounds; the
//! outcome says which of the two happened.

use log::{debug, warn};
use serde::Serialize;

use crate::error::{CalcError, CalcResult};

/// Round cap shared by every iteration in the engine
pub const MAX_ROUNDS: u32 = 100;

/// Outcome of an iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Convergence {
    /// Residual inside tolerance
    Converged { value: f64, rounds: u32 },
    /// Round cap reached; `value` is the last iterate
    Exhausted { value: f64, rounds: u32 },
}

impl Convergence {
    pub fn value(&self) -> f64 {
        match *self {
            Convergence::Converged { value, .. } | Convergence::Exhausted { value, .. } => value,
        }
    }

    pub fn rounds(&self) -> u32 {
        match *self {
            Convergence::Converged { rounds, .. } | Convergence::Exhausted { rounds, .. } => rounds,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged { .. })
    }
}

/// Newton-Raphson iteration with an analytic derivative.
///
/// Each round evaluates the residual and its derivative at the current
/// iterate and then moves the iterate; the loop ends once the residual seen
/// in that round is within `tolerance`. A step that would land exactly on
/// `pole` is skipped for the round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonSolver {
    /// Largest accepted `|f(x)|`
    pub tolerance: f64,

    pub max_rounds: u32,

    /// Value the iterate must never take (k = 1 for annuity formulas)
    pub pole: Option<f64>,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_rounds: MAX_ROUNDS,
            pole: Some(1.0),
        }
    }
}

impl NewtonSolver {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    /// Same iteration without a pole guard
    pub fn unguarded(tolerance: f64) -> Self {
        Self {
            tolerance,
            max_rounds: MAX_ROUNDS,
            pole: None,
        }
    }

    /// Iterate from `start`.
    ///
    /// # Arguments
    /// * `start` - Initial guess
    /// * `eval` - Returns `(f(x), f'(x))` at `x`
    pub fn solve<F>(&self, start: f64, mut eval: F) -> Convergence
    where
        F: FnMut(f64) -> (f64, f64),
    {
        let mut x = start;
        let mut rounds = 0;

        loop {
            let (residual, slope) = eval(x);
            let delta = -residual / slope;
            if self.pole != Some(x + delta) {
                x += delta;
            }
            rounds += 1;

            if residual.abs() <= self.tolerance {
                debug!("newton converged to {} after {} rounds", x, rounds);
                return Convergence::Converged { value: x, rounds };
            }
            if rounds >= self.max_rounds {
                warn!(
                    "newton stopped after {} rounds with residual {} at {}",
                    rounds, residual, x
                );
                return Convergence::Exhausted { value: x, rounds };
            }
        }
    }
}

/// Secant iteration for residuals without a closed-form derivative.
///
/// The slope comes from a second evaluation at `k - k * offset`. The first
/// round steps by `initial_offset`; later rounds use `refined_offset`
/// around the updated iterate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecantSolver {
    pub tolerance: f64,

    pub max_rounds: u32,

    pub initial_offset: f64,

    pub refined_offset: f64,
}

impl Default for SecantSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_rounds: MAX_ROUNDS,
            initial_offset: 1e-6,
            refined_offset: 1e-11,
        }
    }
}

impl SecantSolver {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    /// Iterate from `start`; `eval` returns `f(x)`
    pub fn solve<F>(&self, start: f64, mut eval: F) -> Convergence
    where
        F: FnMut(f64) -> f64,
    {
        let mut k = start;
        let mut shifted = k - k * self.initial_offset;
        let mut rounds = 0;

        loop {
            let y = eval(k);
            let z = eval(shifted);
            let gradient = (z - y) / (shifted - k);
            k += -y / gradient;
            shifted = k - k * self.refined_offset;
            rounds += 1;

            if y.abs() <= self.tolerance {
                debug!("secant converged to {} after {} rounds", k, rounds);
                return Convergence::Converged { value: k, rounds };
            }
            if rounds >= self.max_rounds {
                warn!("secant stopped after {} rounds with residual {} at {}", rounds, y, k);
                return Convergence::Exhausted { value: k, rounds };
            }
        }
    }
}

/// Annual effective rate in percent for discount factor `k`
pub fn effective_annual_rate(k: f64, capitalization_freq: u32) -> f64 {
    ((1.0 / k).powi(capitalization_freq as i32) - 1.0) * 100.0
}

/// Like [`effective_annual_rate`], but NaN or an infinite rate is an error
pub fn checked_effective_rate(k: f64, capitalization_freq: u32) -> CalcResult<f64> {
    let rate = effective_annual_rate(k, capitalization_freq);
    if !rate.is_finite() {
        return Err(CalcError::EffectiveRateWasNan);
    }
    Ok(rate)
}
