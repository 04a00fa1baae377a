//! Present value of a payment stream made of level intervals
//!
//! Intervals are consecutive in time. Interval `j` pays `payment_j` for
//! `terms_j` periods, starting where the previous one ended. For an interval
//! covering periods `[s, e)` the present value is
//!
//! - arrears: `p/(1-k) * (k^(s+1) - k^(e+1))`
//! - advance: `p/(1-k) * (k^s - k^e)`
//!
//! A single rounded residue is paid with the last period of the horizon.

use crate::common::PaymentTiming;
use crate::error::CalcResult;

use super::newton::{checked_effective_rate, Convergence, NewtonSolver};

/// One level stretch of the stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInterval {
    /// Payment including fees
    pub payment: f64,
    pub terms: f64,
}

/// Payment stream handed to the rate solver
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalStream {
    /// Intervals in time order
    pub intervals: Vec<StreamInterval>,

    /// Rounded amount settled in the last period
    pub residue: f64,

    /// Period at which the residue is paid
    pub horizon: f64,

    pub timing: PaymentTiming,
}

impl IntervalStream {
    /// Present value and its derivative with respect to `k`
    pub fn present_value(&self, k: f64) -> (f64, f64) {
        let mut pv = 0.0;
        let mut pv_dif = 0.0;
        let mut start = 0.0;
        let mut end = 0.0;
        let one_minus_k = 1.0 - k;

        for interval in &self.intervals {
            start = end;
            end += interval.terms;
            let p = interval.payment;

            match self.timing {
                PaymentTiming::Advance => {
                    let span = k.powf(start) - k.powf(end);
                    pv += p / one_minus_k * span;
                    pv_dif += p / one_minus_k.powi(2) * span
                        + p / one_minus_k
                            * (start * k.powf(start - 1.0) - end * k.powf(end - 1.0));
                }
                PaymentTiming::Arrears => {
                    let span = k.powf(start + 1.0) - k.powf(end + 1.0);
                    pv += p / one_minus_k * span;
                    pv_dif += p / one_minus_k.powi(2) * span
                        + p / one_minus_k
                            * ((start + 1.0) * k.powf(start) - (end + 1.0) * k.powf(end));
                }
            }
        }

        let n = self.horizon;
        match self.timing {
            PaymentTiming::Advance => {
                pv += self.residue * k.powf(n - 1.0);
                pv_dif += self.residue * (n - 1.0) * k.powf(n - 2.0);
            }
            PaymentTiming::Arrears => {
                pv += self.residue * k.powf(n);
                pv_dif += self.residue * n * k.powf(n - 1.0);
            }
        }

        (pv, pv_dif)
    }

    /// Solve for the `k` that makes the stream worth `received`
    pub fn solve(&self, received: f64, start: f64, solver: &NewtonSolver) -> Convergence {
        solver.solve(start, |k| {
            let (pv, pv_dif) = self.present_value(k);
            (pv - received, pv_dif)
        })
    }
}

/// Effective annual rate implied by a stream; NaN or infinite rates are rejected
pub fn stream_rate(
    stream: &IntervalStream,
    received: f64,
    start: f64,
    capitalization_freq: u32,
) -> CalcResult<(f64, Convergence)> {
    let outcome = stream.solve(received, start, &NewtonSolver::default());
    let rate = checked_effective_rate(outcome.value(), capitalization_freq)?;
    Ok((rate, outcome))
}
