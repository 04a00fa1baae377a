//! Interval length when every segment accrues interest at the same time
//!
//! Each segment is amortized as its own annuity over the remaining horizon.
//! The interval for the top segment ends when the summed installments of all
//! segments equal the size of that segment.

use log::debug;

use crate::common::{AnnuityRow, PaymentTiming, Rounding};
use crate::error::CalcResult;
use crate::solver::NewtonSolver;

use super::interval::{IntervalRequest, IntervalSolver};
use super::segment::RateSegment;

/// Residual accepted for the summed installments
const INSTALLMENT_TOLERANCE: f64 = 0.001;

/// Per-segment annuity, fixed for the whole computation
#[derive(Debug, Clone, Copy)]
struct SegmentAnnuity {
    principal: f64,
    k: f64,
    annuity: f64,
    periodic_rate: f64,
}

impl SegmentAnnuity {
    fn new(segment: &RateSegment, periods: f64, rate_divisor: f64) -> Self {
        let principal = upper(segment) - segment.lower_limit;
        let periodic_rate = segment.annual_interest / rate_divisor;
        let k = 1.0 / (1.0 + periodic_rate);
        let annuity = principal * (1.0 - k) / (k - k.powf(periods + 1.0));
        Self {
            principal,
            k,
            annuity,
            periodic_rate,
        }
    }

    /// Installments paid until `remaining` periods are left
    fn paid_down(&self, remaining: f64) -> f64 {
        let k = self.k;
        self.principal - self.annuity * (k - k.powf(remaining + 1.0)) / (1.0 - k)
    }

    fn paid_down_slope(&self, remaining: f64) -> f64 {
        let k = self.k;
        self.annuity * k.powf(remaining + 1.0) * k.ln() / (1.0 - k)
    }
}

fn upper(segment: &RateSegment) -> f64 {
    segment.upper_limit.value_or(segment.lower_limit)
}

/// Solver for concurrently accruing segments.
///
/// Payments are in arrears; annuity-due loans are rejected before this runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParallelSegmentSolver {
    pub rounding: Rounding,
    pub rate_divisor: f64,
}

impl ParallelSegmentSolver {
    pub fn new(rounding: Rounding, rate_divisor: f64) -> Self {
        Self {
            rounding,
            rate_divisor,
        }
    }

    /// Length of the interval in which segment `step` is paid down.
    ///
    /// # Arguments
    /// * `segments` - Segments `0..=step`, each bounded above
    /// * `step` - Index of the top segment
    /// * `periods_remaining` - Periods left of the whole loan
    /// * `balloon_interest` - Added to every payment before rounding
    pub fn solve(
        &self,
        segments: &[RateSegment],
        step: usize,
        periods_remaining: f64,
        balloon_interest: f64,
    ) -> CalcResult<AnnuityRow> {
        let active = &segments[..=step];
        let top = &active[step];

        let start_principal = upper(top) - active[0].lower_limit;
        let weighted_rate: f64 = active
            .iter()
            .map(|segment| segment.annual_interest * (upper(segment) - segment.lower_limit))
            .sum::<f64>()
            / start_principal;

        // First estimate: the whole loan at the weighted rate
        let estimate = if step > 0 {
            IntervalSolver::new(self.rounding, PaymentTiming::Arrears, self.rate_divisor)
                .term_count(&IntervalRequest {
                    upper: upper(top),
                    lower: top.lower_limit,
                    rate: weighted_rate,
                    periods: periods_remaining,
                    balloon_interest,
                })?
        } else {
            periods_remaining
        };

        let annuities: Vec<SegmentAnnuity> = active
            .iter()
            .map(|segment| SegmentAnnuity::new(segment, periods_remaining, self.rate_divisor))
            .collect();
        let sum_annuity: f64 = annuities.iter().map(|a| a.annuity).sum();
        let downpaid = upper(top) - top.lower_limit;

        let outcome = NewtonSolver::unguarded(INSTALLMENT_TOLERANCE).solve(
            periods_remaining - estimate,
            |remaining| {
                let paid: f64 = annuities.iter().map(|a| a.paid_down(remaining)).sum();
                let slope: f64 = annuities.iter().map(|a| a.paid_down_slope(remaining)).sum();
                (paid - downpaid, slope)
            },
        );
        let remaining = outcome.value().floor();
        let these_periods = periods_remaining - remaining;
        debug!(
            "segment {} runs {} periods (estimate {}, {} rounds)",
            step,
            these_periods,
            estimate,
            outcome.rounds()
        );

        // Walk the estimated periods with rounded payments to find the closing principal
        let others = &annuities[..step];
        let other_interest: f64 = others.iter().map(|a| a.principal * a.periodic_rate).sum();
        let other_annuity: f64 = others.iter().map(|a| a.annuity).sum();
        let other_principal: f64 = others.iter().map(|a| a.principal).sum();

        let top_annuity = &annuities[step];
        let total_annuity = top_annuity.annuity + other_annuity;
        let rounded_payment = self.rounding.apply(total_annuity + balloon_interest);

        let mut part_principal = upper(top) - other_principal;
        let mut period = 1.0;
        while period <= estimate {
            let interest =
                part_principal * top_annuity.periodic_rate + other_interest + balloon_interest;
            part_principal -= rounded_payment - interest;
            period += 1.0;
        }

        let payment = self.rounding.apply(sum_annuity);
        Ok(AnnuityRow {
            payment,
            periodic_fee: 0.0,
            term_count: these_periods,
            principal_floor: other_principal + part_principal,
            principal_ceiling: upper(top),
            remainder: sum_annuity - payment,
        })
    }
}
