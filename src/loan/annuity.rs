//! Annuity loan schedule and effective rate
//!
//! The builder walks the rate segments from the one holding the principal
//! down to the lowest, producing one schedule row per segment the principal
//! passes through. Three modes decide how a row is computed:
//!
//! - single rate: one row for the whole loan
//! - thresholds: the rate switches when the principal crosses a limit
//! - concurrent: every segment accrues its own rate and only the top
//!   segment is paid down
//!
//! A balloon is kept out of the amortization but its interest is added to
//! every payment. Interest-only periods become one leading row.

use log::debug;

use crate::common::{AnnuityRow, PaymentTiming, ScheduleRow};
use crate::error::{CalcError, CalcResult};
use crate::solver::{stream_rate, IntervalStream, StreamInterval};

use super::config::{LoanConfig, PaymentTarget};
use super::interval::{IntervalRequest, IntervalSolver};
use super::parallel::ParallelSegmentSolver;
use super::result::AnnuityLoanResult;
use super::segment::{concurrent_balloon_interest, net_of_balloon, UpperLimit};

/// Periods until `loan` is repaid by `annuity` at `periodic_rate`
fn term_number(loan: f64, annuity: f64, periodic_rate: f64, timing: PaymentTiming) -> f64 {
    let k = 1.0 / (1.0 + periodic_rate);
    match timing {
        PaymentTiming::Advance => (1.0 - loan * (1.0 - k) / annuity).ln() / k.ln(),
        PaymentTiming::Arrears => (k - loan * (1.0 - k) / annuity).ln() / k.ln() - 1.0,
    }
}

/// Rows in time order plus what the residue and grace row need
struct Schedule {
    rows: Vec<AnnuityRow>,
    /// Highest segment index that produced a row
    top: usize,
    /// Rate of the last row built
    last_rate: f64,
    /// Interest per period over the concurrent segments
    interest_only_amount: f64,
    balloon_interest: f64,
}

pub(crate) fn annuity_loan(config: &LoanConfig) -> CalcResult<AnnuityLoanResult> {
    config.preprocess()?;

    if config.rates_run_concurrently && config.timing.is_advance() {
        return Err(CalcError::UnsupportedCombinationAdvance);
    }

    let principal = config.principal();
    if config.balloon > principal {
        return Err(CalcError::UnsupportedCombinationAdvance);
    }

    let rate_divisor = config.rate_divisor();
    let calculation_periods = match config.target {
        PaymentTarget::Periods(n) => config.to_capitalization_periods(n as f64),
        PaymentTarget::FirstPayment(_) => 0.0,
    };
    let grace_periods = config.grace_periods();

    let segments = config.working_segments();
    if let Some(first_payment) = config.first_payment() {
        let interest = segments[0].periodic_interest(principal, rate_divisor);
        if interest > first_payment || (interest == first_payment && principal != config.balloon)
        {
            return Err(CalcError::PaymentTooSmall);
        }
    }

    let schedule = build_rows(config, principal, calculation_periods - grace_periods)?;
    let mut rows = schedule.rows;

    if grace_periods > 0.0 {
        let principal_ann = principal - config.balloon;
        let unrounded = if config.rates_run_concurrently {
            schedule.interest_only_amount + schedule.balloon_interest
        } else {
            principal * schedule.last_rate / rate_divisor
        };
        let payment = config.rounding.apply(unrounded);

        let fee_segment = config
            .segments
            .get(schedule.top)
            .or(config.segments.last())
            .ok_or(CalcError::FirstSegmentNotDefined)?;
        let mut periodic_fee = fee_segment.periodic_fee;
        if config.fees.percentage > 0.0 {
            periodic_fee += principal * config.fees.period_percentage / 100.0;
        }

        rows.insert(
            0,
            AnnuityRow {
                payment,
                periodic_fee,
                term_count: grace_periods,
                principal_floor: principal_ann,
                principal_ceiling: principal_ann,
                remainder: unrounded - payment,
            },
        );
    }

    let last = rows.last().ok_or(CalcError::NoSegmentFound)?;
    let residue = if config.remainder.is_ignored() {
        config.rounding.nearest(config.balloon)
    } else {
        config.rounding.nearest(
            last.payment + last.remainder + last.principal_floor + config.balloon + last.periodic_fee,
        ) - last.gross_payment()
    };

    let stream = IntervalStream {
        intervals: rows
            .iter()
            .map(|row| StreamInterval {
                payment: row.gross_payment(),
                terms: row.term_count,
            })
            .collect(),
        residue,
        horizon: calculation_periods,
        timing: config.timing,
    };
    let start = 1.0 / (1.0 + segments[0].annual_interest / rate_divisor);
    let (effective_rate, convergence) = stream_rate(
        &stream,
        config.received,
        start,
        config.effective_capitalization(),
    )?;

    let payback_period_count = rows.iter().map(|row| row.term_count).sum();
    debug!(
        "annuity loan: {} rows, rate {:.6}%, residue {}",
        rows.len(),
        effective_rate,
        residue
    );

    Ok(AnnuityLoanResult {
        effective_rate,
        residue,
        rounds: convergence.rounds(),
        convergence,
        payback_period_count,
        schedule: rows.into_iter().map(ScheduleRow::Annuity).collect(),
    })
}

/// Amortization rows for the part of the principal above the balloon
fn build_rows(config: &LoanConfig, principal: f64, installment_periods: f64) -> CalcResult<Schedule> {
    let balloon = config.balloon;
    let rate_divisor = config.rate_divisor();
    let principal_ann = principal - balloon;
    let offered = config.working_segments();
    let mut segments = net_of_balloon(&offered, balloon);

    let single_rate = !config.rate_changes_at_thresholds && !config.rates_run_concurrently;
    let interval_solver = IntervalSolver::new(config.rounding, config.timing, rate_divisor);
    let parallel_solver = ParallelSegmentSolver::new(config.rounding, rate_divisor);

    let mut balloon_interest = if balloon > 0.0 && config.rates_run_concurrently {
        concurrent_balloon_interest(&offered, balloon, rate_divisor)
    } else {
        0.0
    };

    let mut rows: Vec<AnnuityRow> = Vec::new();
    let mut top: Option<usize> = None;
    let mut last_rate = 0.0;
    let mut interest_only_amount = 0.0;
    let mut periods_remaining = installment_periods;

    for i in (0..segments.len()).rev() {
        let segment = segments[i];
        if rows.is_empty() && !segment.spans(principal_ann) {
            continue;
        }
        let previous_floor = rows
            .last()
            .map(|row| row.principal_floor)
            .filter(|floor| *floor > 0.0);

        let step;
        let mut row = if config.rates_run_concurrently {
            step = i;
            top.get_or_insert(i);

            if segment.upper_limit.admits(principal_ann) {
                segments[i].upper_limit = UpperLimit::Bounded(principal_ann);
            }
            if let Some(floor) = previous_floor {
                segments[i].upper_limit = UpperLimit::Bounded(floor);
            }

            let row =
                parallel_solver.solve(&segments, step, periods_remaining, balloon_interest)?;

            if config.interest_only_periods > 0 {
                let upper = segments[i].upper_limit.value_or(principal_ann).min(principal_ann);
                interest_only_amount +=
                    segments[i].periodic_interest(upper - segments[i].lower_limit, rate_divisor);
            }
            row
        } else {
            let (lower, upper) = if single_rate {
                step = 0;
                (0.0, principal_ann)
            } else {
                step = i;
                top.get_or_insert(i);
                let upper = if segment.upper_limit.admits(principal_ann) {
                    principal_ann
                } else if let Some(floor) = previous_floor {
                    floor
                } else {
                    segment.upper_limit.value_or(principal_ann)
                };
                (segment.lower_limit, upper)
            };

            last_rate = segment.annual_interest;
            balloon_interest = balloon * last_rate / rate_divisor;

            if let Some(first_payment) = config.first_payment() {
                let net_payment = first_payment * 12.0 / config.effective_capitalization() as f64
                    - segment.periodic_fee
                    - upper * config.fees.period_percentage / 100.0
                    - balloon_interest;
                periods_remaining = term_number(
                    upper,
                    net_payment,
                    last_rate / rate_divisor,
                    config.timing,
                );
            }

            interval_solver.solve(&IntervalRequest {
                upper,
                lower,
                rate: last_rate,
                periods: periods_remaining,
                balloon_interest,
            })?
        };

        if balloon > 0.0 {
            if config.remainder.is_ignored() {
                let unrounded = row.payment + balloon_interest + row.remainder;
                row.payment = config.rounding.apply(unrounded);
                row.remainder = unrounded - row.payment;
            } else {
                row.payment = config.rounding.apply(row.payment + balloon_interest);
            }
        }

        row.periodic_fee = segments[step].periodic_fee;
        if config.fees.period_percentage > 0.0 {
            row.periodic_fee += principal * config.fees.period_percentage / 100.0;
        }

        periods_remaining -= row.term_count;
        debug!(
            "segment {}: {} x {} from {} to {}",
            i, row.term_count, row.payment, row.principal_ceiling, row.principal_floor
        );
        rows.push(row);

        if single_rate {
            break;
        }
    }

    if rows.is_empty() {
        return Err(CalcError::NoSegmentFound);
    }

    Ok(Schedule {
        rows,
        top: top.unwrap_or(0),
        last_rate,
        interest_only_amount,
        balloon_interest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RemainderPolicy;
    use crate::loan::config::{FeeSchedule, LoanConfigBuilder};
    use crate::loan::segment::RateSegment;
    use approx::assert_relative_eq;

    fn loan(received: f64, periods: u32, segments: Vec<RateSegment>) -> LoanConfigBuilder {
        LoanConfig::builder()
            .received(received)
            .number_of_periods(periods)
            .periods_per_year(12)
            .segments(segments)
    }

    fn ladder() -> Vec<RateSegment> {
        vec![
            RateSegment::bounded(4.15, 0.0, 0.0, 1_000_000.0),
            RateSegment::bounded(4.05, 0.0, 1_000_000.0, 2_000_000.0),
            RateSegment {
                lower_limit: 2_000_000.0,
                ..RateSegment::flat(3.95, 0.0)
            },
        ]
    }

    fn annuity_rows(result: &AnnuityLoanResult) -> Vec<AnnuityRow> {
        result
            .schedule
            .iter()
            .filter_map(|row| row.as_annuity().copied())
            .collect()
    }

    /// Unrounded arrears annuity at a monthly nominal rate
    fn level_payment(principal: f64, annual_rate: f64, periods: f64) -> f64 {
        let k = 1.0 / (1.0 + annual_rate / 1200.0);
        principal * (1.0 - k) / (k - k.powf(periods + 1.0))
    }

    /// The residue settles the balloon plus whatever the last row leaves open
    fn assert_residue_settles_last_row(result: &AnnuityLoanResult, balloon: f64) {
        let rows = annuity_rows(result);
        let last = rows[rows.len() - 1];
        let open = last.principal_floor + last.remainder + balloon;
        assert!((result.residue - open).abs() < 0.0051);
    }

    #[test]
    fn test_closed_form_consistency() {
        let config = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 0.0)])
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 1);
        assert_relative_eq!(rows[0].payment, 8606.64, max_relative = 1e-4);
        assert_relative_eq!(result.effective_rate, 6.1678, max_relative = 1e-4);
        assert_eq!(result.payback_period_count, 12.0);
        assert!(result.convergence.is_converged());
        assert!((result.residue - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_rounding_conservation() {
        let config = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 0.0)])
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rounding_deltas: f64 = annuity_rows(&result)
            .iter()
            .map(|row| -row.remainder * row.term_count)
            .sum();

        // The residue gives back what rounding held back, to within a cent
        assert!((rounding_deltas + result.residue).abs() < 0.01);
    }

    #[test]
    fn test_threshold_rows_are_continuous() {
        let config = loan(2_500_000.0, 240, ladder())
            .rate_changes_at_thresholds(true)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].principal_ceiling, 2_500_000.0);
        assert!((rows[0].payment - 15_083.72).abs() < 1e-9);
        assert_eq!(rows[0].term_count, 66.0);
        for pair in rows.windows(2) {
            assert_eq!(pair[0].principal_floor, pair[1].principal_ceiling);
        }
        let terms: f64 = rows.iter().map(|r| r.term_count).sum();
        assert_eq!(terms, 240.0);
        assert_eq!(result.payback_period_count, 240.0);
        assert!(result.effective_rate > 4.0 && result.effective_rate < 4.3);
    }

    #[test]
    fn test_concurrent_rows_are_continuous() {
        let config = loan(1_500_000.0, 240, ladder())
            .rates_run_concurrently(true)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 2);
        for pair in rows.windows(2) {
            assert_eq!(pair[0].principal_floor, pair[1].principal_ceiling);
        }
        let terms: f64 = rows.iter().map(|r| r.term_count).sum();
        assert_eq!(terms, result.payback_period_count);
        assert_eq!(terms, 240.0);
    }

    #[test]
    fn test_grace_row_leads_schedule() {
        let config = loan(100_000.0, 24, vec![RateSegment::flat(6.0, 50.0)])
            .interest_only(6, 12)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 2);
        let grace = rows[0];
        assert_eq!(grace.term_count, 6.0);
        assert!((grace.payment - 500.0).abs() < 1e-9);
        assert_eq!(grace.periodic_fee, 50.0);
        assert_eq!(grace.principal_floor, 100_000.0);
        assert_eq!(rows[1].term_count, 18.0);
        assert_eq!(result.payback_period_count, 24.0);
    }

    #[test]
    fn test_balloon_interest_added_to_payment() {
        let with_balloon = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 0.0)])
            .balloon(40_000.0)
            .build()
            .unwrap();
        let result = annuity_loan(&with_balloon).unwrap();
        let row = annuity_rows(&result)[0];

        // 60000 amortized plus 200 balloon interest per month
        let plain = 60_000.0 * 0.005 / (1.0 - 1.005_f64.powi(-12));
        assert!((row.payment - (plain + 200.0)).abs() < 0.01);
        assert!((result.residue - 40_000.0).abs() < 1.0);
        assert_relative_eq!(result.effective_rate, 6.1678, max_relative = 1e-3);
    }

    #[test]
    fn test_ignored_remainder_drops_residue() {
        let config = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 0.0)])
            .remainder(RemainderPolicy::Ignore)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        assert_eq!(result.residue, 0.0);
    }

    #[test]
    fn test_payment_mode_derives_term_count() {
        let config = loan(100_000.0, 0, vec![RateSegment::flat(6.0, 0.0)])
            .first_payment(8_606.64)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 1);
        assert!((result.payback_period_count - 12.0).abs() < 0.01);
        assert!((rows[0].payment - 8_606.64).abs() < 0.02);
    }

    #[test]
    fn test_payment_too_small() {
        let config = loan(100_000.0, 0, vec![RateSegment::flat(6.0, 0.0)])
            .first_payment(400.0)
            .build()
            .unwrap();
        assert_eq!(annuity_loan(&config).unwrap_err(), CalcError::PaymentTooSmall);

        let config = loan(100_000.0, 0, vec![RateSegment::flat(6.0, 0.0)])
            .first_payment(500.0)
            .build()
            .unwrap();
        assert_eq!(annuity_loan(&config).unwrap_err().code(), -8);
    }

    #[test]
    fn test_mode_exclusivity() {
        let advance = loan(1_500_000.0, 240, ladder())
            .rates_run_concurrently(true)
            .timing(PaymentTiming::Advance)
            .build()
            .unwrap();
        assert_eq!(
            annuity_loan(&advance).unwrap_err(),
            CalcError::UnsupportedCombinationAdvance
        );

        let fixed_payment = loan(1_500_000.0, 0, ladder())
            .rates_run_concurrently(true)
            .first_payment(20_000.0)
            .build()
            .unwrap();
        assert_eq!(
            annuity_loan(&fixed_payment).unwrap_err(),
            CalcError::UnsupportedCombinationPeriodic
        );
    }

    #[test]
    fn test_configuration_errors() {
        let config = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 0.0)])
            .balloon(200_000.0)
            .build()
            .unwrap();
        assert_eq!(annuity_loan(&config).unwrap_err().code(), -7);

        let config = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 0.0)])
            .interest_only(12, 6)
            .build()
            .unwrap();
        assert_eq!(annuity_loan(&config).unwrap_err(), CalcError::InterestPeriodTooLong);

        let config = loan(
            5_000_000.0,
            12,
            vec![RateSegment::bounded(6.0, 0.0, 0.0, 1_000_000.0)],
        )
        .build()
        .unwrap();
        assert_eq!(annuity_loan(&config).unwrap_err(), CalcError::NoSegmentFound);
    }

    #[test]
    fn test_fees_enter_principal_and_rows() {
        let config = loan(100_000.0, 12, vec![RateSegment::flat(6.0, 25.0)])
            .fees(FeeSchedule {
                processing: 950.0,
                document: 0.0,
                percentage: 0.0,
                period_percentage: 0.1,
            })
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let row = annuity_rows(&result)[0];

        assert_eq!(row.principal_ceiling, 100_950.0);
        assert!((row.periodic_fee - (25.0 + 100.95)).abs() < 1e-9);
        assert!(result.effective_rate > 6.1678);
    }

    #[test]
    fn test_threshold_conservation_with_balloon() {
        let config = loan(2_500_000.0, 240, ladder())
            .rate_changes_at_thresholds(true)
            .balloon(300_000.0)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].principal_ceiling, 2_200_000.0);
        for pair in rows.windows(2) {
            assert_eq!(pair[0].principal_floor, pair[1].principal_ceiling);
        }
        assert_eq!(result.payback_period_count, 240.0);

        // Amortized part is paid off up to the rounding drift
        assert!(rows[2].principal_floor.abs() < 1.0);
        assert!((result.residue - 300_000.0).abs() < 1.0);
        assert_residue_settles_last_row(&result, 300_000.0);
    }

    #[test]
    fn test_concurrent_conservation_with_balloon() {
        let config = loan(1_500_000.0, 240, ladder())
            .rates_run_concurrently(true)
            .balloon(200_000.0)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].principal_ceiling, 1_300_000.0);
        assert_eq!(rows[0].principal_floor, rows[1].principal_ceiling);
        assert_eq!(result.payback_period_count, 240.0);

        assert!(rows[1].principal_floor.abs() < 1.0);
        assert!((result.residue - 200_000.0).abs() < 1.0);
        assert_residue_settles_last_row(&result, 200_000.0);
    }

    #[test]
    fn test_concurrent_balloon_interest_in_payment() {
        let config = loan(1_500_000.0, 240, ladder())
            .rates_run_concurrently(true)
            .balloon(200_000.0)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        // The balloon sits in the lowest band at 4.15%
        let balloon_interest = 200_000.0 * 4.15 / 1200.0;

        // Netted bands: 800000 at 4.15% and 500000 at 4.05%
        let top = level_payment(800_000.0, 4.15, 240.0) + level_payment(500_000.0, 4.05, 240.0);
        assert!((rows[0].payment - (top + balloon_interest)).abs() < 0.011);

        let lowest = level_payment(rows[1].principal_ceiling, 4.15, rows[1].term_count);
        assert!((rows[1].payment - (lowest + balloon_interest)).abs() < 0.011);
        assert!(result.effective_rate > 4.0 && result.effective_rate < 4.3);
    }

    #[test]
    fn test_concurrent_grace_row() {
        let config = loan(1_500_000.0, 240, ladder())
            .rates_run_concurrently(true)
            .interest_only(6, 12)
            .build()
            .unwrap();
        let result = annuity_loan(&config).unwrap();
        let rows = annuity_rows(&result);

        assert_eq!(rows.len(), 3);
        let grace = rows[0];
        assert_eq!(grace.term_count, 6.0);
        assert_eq!(grace.principal_ceiling, 1_500_000.0);
        assert_eq!(grace.principal_floor, 1_500_000.0);

        // Each band charges its own rate on the part of the principal it holds
        let interest = 500_000.0 * 4.05 / 1200.0 + rows[2].principal_ceiling * 4.15 / 1200.0;
        assert!((grace.payment + grace.remainder - interest).abs() < 1e-6);
        assert!((grace.payment - interest).abs() < 0.0051);
        assert_eq!(rows[1].principal_ceiling, 1_500_000.0);
        assert_eq!(rows[1].principal_floor, rows[2].principal_ceiling);
        assert_eq!(result.payback_period_count, 240.0);
    }
}
