//! Length of one rate interval of an annuity loan
//!
//! An annuity fitted to the whole remaining horizon pays the principal down
//! from `upper` towards zero. The interval ends at the first whole period in
//! which the principal has passed `lower`, where the next rate takes over.
//!
//! With `k = 1/(1+r)` and rounded annuity `a`, the number of periods left when
//! the principal equals `L` is
//!
//! - arrears: `(ln C - ln k)/ln k` with `C = k - L(1-k)/a`
//! - advance: `ln C/ln k` with `C = 1 - L(1-k)/a`
//!
//! It is floored so the threshold is really passed. The principal left at the
//! end is the present value of the remaining rounded payments plus the
//! rounding deviation grown with interest.

use crate::common::{AnnuityRow, PaymentTiming, Rounding};
use crate::error::{CalcError, CalcResult};

/// Inputs for one interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRequest {
    /// Principal when the interval starts
    pub upper: f64,

    /// Principal at which the next rate applies
    pub lower: f64,

    /// Nominal annual rate in percent
    pub rate: f64,

    /// Periods left of the whole loan
    pub periods: f64,

    /// Balloon interest added to every payment before rounding
    pub balloon_interest: f64,
}

/// Computes interval length and closing principal for one rate regime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSolver {
    pub rounding: Rounding,
    pub timing: PaymentTiming,
    pub rate_divisor: f64,
}

impl IntervalSolver {
    pub fn new(rounding: Rounding, timing: PaymentTiming, rate_divisor: f64) -> Self {
        Self {
            rounding,
            timing,
            rate_divisor,
        }
    }

    /// Amortize `request.upper` down past `request.lower`.
    ///
    /// The returned row carries the rounded annuity, the elapsed periods,
    /// the closing principal as floor and `upper` as ceiling.
    pub fn solve(&self, request: &IntervalRequest) -> CalcResult<AnnuityRow> {
        let periodic_rate = request.rate / self.rate_divisor;
        let k = 1.0 / (1.0 + periodic_rate);
        if k < 0.0 {
            return Err(CalcError::FailingConvergence);
        }

        let n = request.periods;
        let advance = self.timing.is_advance();

        // Annuity formulas divide by zero for these horizons
        if (advance && n == 1.0) || (!advance && n == 0.0) {
            return Err(CalcError::FailingConvergence);
        }

        let (full, annuity, remaining) = if advance {
            let full = request.upper * (1.0 - k) / (1.0 - k.powf(n));
            let annuity = self.rounding.apply(full);
            let c = 1.0 - request.lower * (1.0 - k) / annuity;
            (full, annuity, c.ln() / k.ln())
        } else {
            let full = request.upper * (1.0 - k) / (k - k.powf(n + 1.0));
            let annuity = self.rounding.apply(full);
            let c = k - request.lower * (1.0 - k) / annuity;
            (full, annuity, (c.ln() - k.ln()) / k.ln())
        };
        let remaining = remaining.floor();

        let interest = request.balloon_interest;
        let annuity_true = self.rounding.apply(full + interest) - interest;
        let elapsed = n - remaining;

        let upper_adjusted = if advance {
            annuity_true * (1.0 - k.powf(n)) / (1.0 - k)
        } else {
            annuity_true * (k - k.powf(n + 1.0)) / (1.0 - k)
        };
        let deviation = request.upper - upper_adjusted;

        let closing = if advance {
            annuity_true * (1.0 - k.powf(remaining)) / (1.0 - k)
                + deviation * (1.0 + periodic_rate).powf(elapsed - 1.0)
        } else {
            annuity_true * (k - k.powf(remaining + 1.0)) / (1.0 - k)
                + deviation * (1.0 + periodic_rate).powf(elapsed)
        };

        Ok(AnnuityRow {
            payment: annuity,
            periodic_fee: 0.0,
            term_count: elapsed,
            principal_floor: closing,
            principal_ceiling: request.upper,
            remainder: full - annuity,
        })
    }

    /// Convenience for the number of periods an interval takes
    pub fn term_count(&self, request: &IntervalRequest) -> CalcResult<f64> {
        Ok(self.solve(request)?.term_count)
    }
}
