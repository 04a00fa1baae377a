//! Serial loan: equal installments, interest on the outstanding balance
//!
//! Every period is simulated directly. Each payment is rounded on its own
//! and the rounding difference is taken off the principal before the next
//! period, so the schedule tracks what the bank books. The effective rate is
//! then found with a secant iteration over the rounded payments.

use log::debug;

use crate::common::{ScheduleRow, SerialRow};
use crate::error::{CalcError, CalcResult};
use crate::solver::{checked_effective_rate, SecantSolver};

use super::config::{LoanConfig, PaymentTarget};
use super::result::SerialLoanResult;
use super::segment::RateSegment;

/// Highest segment whose lower limit lies below the principal
fn top_segment(segments: &[RateSegment], principal: f64) -> usize {
    segments
        .iter()
        .rposition(|segment| principal > segment.lower_limit)
        .unwrap_or(0)
}

/// Cumulative interest of the fully drawn segments below each index
fn segment_interest_floors(
    segments: &[RateSegment],
    top: usize,
    principal: f64,
    concurrent: bool,
    rate_divisor: f64,
) -> Vec<f64> {
    let mut floors = vec![0.0; top];
    for j in 0..top {
        let segment = &segments[j];
        let unbounded = segment.upper_limit.is_unbounded();
        let upper = segment.upper_limit.value_or(principal);
        if !(upper <= principal || unbounded || j == 0) {
            continue;
        }

        floors[j] = if concurrent {
            let size = if unbounded {
                principal - segment.lower_limit
            } else {
                upper - segment.lower_limit
            };
            let below = if j > 0 { floors[j - 1] } else { 0.0 };
            segment.periodic_interest(size, rate_divisor) + below
        } else {
            segments[j + 1].periodic_interest(upper, rate_divisor)
        };
    }
    floors
}

pub(crate) fn serial_loan(config: &LoanConfig) -> CalcResult<SerialLoanResult> {
    config.preprocess()?;

    let principal = config.principal();
    let balloon = config.balloon;
    if balloon > principal {
        return Err(CalcError::BalloonTooSmall);
    }

    let rate_divisor = config.rate_divisor();
    let cap = config.effective_capitalization() as f64;
    let segments = config.working_segments();
    let top = top_segment(&segments, principal);
    let fee_share = config.fees.period_percentage * principal / 100.0;

    let term_number = match config.target {
        PaymentTarget::FirstPayment(first_payment) => {
            let net_payment = first_payment * 12.0 / cap - segments[top].periodic_fee - fee_share;
            let net_installment = net_payment - segments[top].periodic_interest(principal, rate_divisor);
            if net_installment < 0.0 {
                return Err(CalcError::PaymentTooSmall);
            }
            ((principal - balloon) / net_installment).ceil()
        }
        PaymentTarget::Periods(n) => n as f64,
    };

    let calculation_periods = config.to_capitalization_periods(term_number).ceil();
    let grace_periods = config.grace_periods();
    let installment_periods = calculation_periods - grace_periods;
    let installment = if installment_periods != 0.0 {
        (principal - balloon) / installment_periods
    } else {
        0.0
    };

    let interest_floors = segment_interest_floors(
        &segments,
        top,
        principal,
        config.rates_run_concurrently,
        rate_divisor,
    );

    let advance = config.timing.is_advance();
    let first = if advance { 0 } else { 1 };
    let last = calculation_periods as usize;

    let mut rows = Vec::with_capacity(last + 1 - first);
    let mut remaining = principal;
    let mut current = top;
    let mut unrounded = 0.0;

    for period in first..=last {
        if current > 0 && remaining < segments[current].lower_limit {
            current -= 1;
        }

        let thresholds = config.rate_changes_at_thresholds;
        let balance = if current == 0 || !thresholds {
            remaining
        } else {
            remaining - segments[current - 1].upper_limit.value_or(0.0)
        };
        let (rate, base_interest) = if thresholds {
            let base = if current > 0 { interest_floors[current - 1] } else { 0.0 };
            (segments[current].annual_interest, base)
        } else {
            (segments[top].annual_interest, 0.0)
        };

        let interest = if advance && period == last {
            0.0
        } else {
            base_interest + balance * rate / rate_divisor
        };
        let installment_part = if period == 0 { 0.0 } else { installment };

        let periodic_fee = segments[current].periodic_fee + fee_share;
        let amortizing = period as f64 > grace_periods;
        unrounded = interest + periodic_fee;
        if amortizing {
            unrounded += installment_part;
        }

        let payment = config.rounding.apply(unrounded);
        let paid_down = payment - interest - periodic_fee;
        remaining -= paid_down;

        rows.push(SerialRow {
            payment,
            periodic_fee,
            installment: paid_down,
        });
    }

    let last_payment = rows.last().map(|row| row.payment).unwrap_or(0.0);
    let remainder = if config.remainder.is_ignored() {
        config.rounding.nearest(balloon + unrounded) - last_payment
    } else {
        config.rounding.nearest(remaining + unrounded) - last_payment
    };

    let periodic = (segments[0].annual_interest / 100.0 + 1.0).powf(1.0 / cap) - 1.0;
    if periodic == -1.0 {
        return Err(CalcError::InterestPeriodTooLong);
    }
    let start = 1.0 / (1.0 + periodic);

    let solver = SecantSolver::with_tolerance(config.accuracy.tolerance(principal));
    let outcome = solver.solve(start, |k| {
        let pv: f64 = rows
            .iter()
            .enumerate()
            .map(|(i, row)| row.payment * k.powi((first + i) as i32))
            .sum();
        pv + remainder * k.powf(calculation_periods) - config.received
    });
    let effective_rate = checked_effective_rate(outcome.value(), config.effective_capitalization())?;

    debug!(
        "serial loan: {} periods, rate {:.6}%, remainder {}",
        rows.len(),
        effective_rate,
        remainder
    );

    Ok(SerialLoanResult {
        effective_rate,
        remainder,
        rounds: outcome.rounds(),
        convergence: outcome,
        payback_period_count: term_number,
        schedule: rows.into_iter().map(ScheduleRow::Serial).collect(),
    })
}
