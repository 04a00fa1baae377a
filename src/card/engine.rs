//! Credit card effective rates
//!
//! Card debt is split into three streams sharing monthly capitalization:
//! purchases, cash withdrawals and the annual fee. The annual fee is first
//! valued as yearly payments in advance and then spread over the months as
//! an arrears annuity. A fixed periodic fee comes on top.
//!
//! The regulatory rate assumes everything is drawn on day one and repaid in
//! arrears. The realistic rate lets purchases ride the interest-free period
//! and charges simple interest on the rest for the days past it.

use log::debug;

use crate::common::PaymentTiming;
use crate::error::{CalcError, CalcResult};
use crate::solver::{
    effective_annual_rate, Convergence, IntervalStream, NewtonSolver, StreamInterval, MAX_ROUNDS,
};

use super::config::CardConfig;
use super::result::CardResult;

/// Days from the start of a month until the bill is due
const DUE_DAYS: u32 = 45;

/// Residual accepted by the realistic rate iteration
const REALISTIC_TOLERANCE: f64 = 1e-5;

/// Arrears annuity for `loan` over `months` with discount factor `k`
fn arrears_annuity(loan: f64, k: f64, months: f64) -> f64 {
    loan * (1.0 - k) / (k - k.powf(months + 1.0))
}

/// Present value factor of `months` arrears payments of one
fn arrears_factor(k: f64, months: f64) -> f64 {
    (k - k.powf(months + 1.0)) / (1.0 - k)
}

/// Realistic present value less the amount received, with its slope in `k`.
///
/// Payments lag the month end by `fraction` of a month and the remainder
/// follows the last payment.
fn realistic_residual(
    payment: f64,
    remainder: f64,
    received: f64,
    months: f64,
    fraction: f64,
    k: f64,
) -> (f64, f64) {
    let exponent = months + fraction;
    let factor = arrears_factor(k, months);
    let value = payment * factor * k.powf(fraction) - received + remainder * k.powf(exponent);

    let inv = 1.0 / k;
    let slope = ((payment * (1.0 - (months + 1.0) * k.powf(months)) * (1.0 - k)
        + payment * (k - k.powf(months + 1.0)))
        / (1.0 - k).powi(2)
        * inv.powf(fraction)
        + payment * factor * fraction * inv.powf(fraction - 1.0) / k.powi(2))
        / inv.powf(2.0 * fraction)
        + remainder * exponent * k.powf(exponent - 1.0);

    (value, slope)
}

/// Monthly annuities of the three streams
#[derive(Debug, Clone, Copy)]
struct CardAnnuities {
    purchase: f64,
    /// Unrounded sum of all streams and the periodic fee
    total: f64,
    rounded: f64,
}

pub struct CardEngine {
    config: CardConfig,
    max_rounds: u32,
}

impl CardEngine {
    pub fn new(config: CardConfig) -> Self {
        Self {
            config,
            max_rounds: MAX_ROUNDS,
        }
    }

    /// Cap both rate iterations at `rounds`
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    /// Regulatory and realistic rates with their monthly payments
    pub fn calculate(&self) -> CalcResult<CardResult> {
        let config = &self.config;
        let months = config.number_of_months as f64;
        let kc = 1.0 / (1.0 + config.rate_cash / 1200.0);
        let kp = 1.0 / (1.0 + config.rate_purchase / 1200.0);

        let annuities = self.annuities(kc, kp);
        self.check_minimum_payment(annuities.total)?;

        let government_convergence = self.government_rate(annuities.rounded);
        let government_rate = effective_annual_rate(government_convergence.value(), 12);

        let extra_days = if config.interest_free_days > 30 {
            config.interest_free_days - 30
        } else {
            DUE_DAYS - 30
        } as f64;

        let purchase_due = config.purchase_loan() * (1.0 - kp) / (1.0 - kp.powf(months));
        let other = annuities.total - annuities.purchase - config.fees.period;
        let extra_interest = config.rate_cash / 36_000.0 * extra_days;
        let unrounded = purchase_due + other * (1.0 + extra_interest) + config.fees.period;
        let payment = config.rounding.apply(unrounded);

        if config.minpay_units > payment {
            return Err(CalcError::AnnuityBelowMinPayment);
        }

        let fraction = extra_days / 30.0;
        let remainder = if config.remainder.is_ignored() {
            0.0
        } else {
            let k = kp;
            let lag = (1.0 / k).powf(fraction);
            let pv_rounded = payment * arrears_factor(k, months) / lag;
            let pv_unrounded = unrounded * arrears_factor(k, months) / lag;
            let future = (pv_unrounded - pv_rounded) * (1.0 / k).powf(months) * lag;
            config
                .rounding
                .apply(config.rounding.apply(unrounded + future) - payment)
        };

        let received = config.received();
        let solver = NewtonSolver {
            max_rounds: self.max_rounds,
            ..NewtonSolver::with_tolerance(REALISTIC_TOLERANCE)
        };
        let convergence = solver.solve(kp, |k| {
            realistic_residual(payment, remainder, received, months, fraction, k)
        });
        let effective_rate = effective_annual_rate(convergence.value(), 12);

        if !government_rate.is_finite() || !effective_rate.is_finite() {
            return Err(CalcError::EffectiveRateWasNan);
        }

        debug!(
            "card: government {:.4}% at {}, realistic {:.4}% at {}",
            government_rate, annuities.rounded, effective_rate, payment
        );

        Ok(CardResult {
            government_effective_rate: government_rate,
            government_monthly_payment: annuities.rounded,
            effective_rate,
            monthly_payment: payment,
            remainder,
            government_rounds: government_convergence.rounds(),
            rounds: convergence.rounds(),
            government_convergence,
            convergence,
        })
    }

    fn annuities(&self, kc: f64, kp: f64) -> CardAnnuities {
        let config = &self.config;
        let months = config.number_of_months as f64;

        let cash_loan = config.cash_loan();
        let cash = if cash_loan > 0.0 {
            arrears_annuity(cash_loan, kc, months)
        } else {
            0.0
        };
        let purchase_loan = config.purchase_loan();
        let purchase = if purchase_loan > 0.0 {
            arrears_annuity(purchase_loan, kp, months)
        } else {
            0.0
        };

        // Annual fees are paid yearly in advance, discounted at the cash rate
        let ka = 1.0 / (1.0 + config.rate_cash / 100.0);
        let years = (months / 12.0).ceil();
        let annual_pv = config.fees.annual * (1.0 - ka.powf(years)) / (1.0 - ka);
        let annual = arrears_annuity(annual_pv, kc, months);

        let total = cash + purchase + annual + config.fees.period;
        CardAnnuities {
            purchase,
            total,
            rounded: config.rounding.apply(total),
        }
    }

    fn check_minimum_payment(&self, annuity: f64) -> CalcResult<()> {
        let config = &self.config;
        let initial_debt = config.cash_loan() + config.purchase_loan() + config.fees.annual;
        let percentage_floor = config.minpay_percentage / 100.0 * initial_debt;
        if config.minpay_units > annuity || percentage_floor > annuity {
            return Err(CalcError::AnnuityBelowMinPayment);
        }
        Ok(())
    }

    /// Discount factor of the regulatory rate
    fn government_rate(&self, payment: f64) -> Convergence {
        let config = &self.config;
        let months = config.number_of_months as f64;
        let stream = IntervalStream {
            intervals: vec![StreamInterval {
                payment,
                terms: months,
            }],
            residue: 0.0,
            horizon: months,
            timing: PaymentTiming::Arrears,
        };
        let start = 1.0 / (1.0 + config.rate_purchase / 12.0 / 100.0);
        let solver = NewtonSolver {
            max_rounds: self.max_rounds,
            ..NewtonSolver::default()
        };
        stream.solve(config.received(), start, &solver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::config::CardFees;
    use crate::common::RemainderPolicy;
    use approx::assert_relative_eq;

    fn purchases_only() -> CardConfig {
        CardConfig::builder()
            .received_purchase(10_000.0)
            .number_of_months(12)
            .rate_cash(20.0)
            .rate_purchase(20.0)
            .minimum_payment(3.0, 100.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_government_rate_matches_nominal() {
        let result = CardEngine::new(purchases_only()).calculate().unwrap();

        assert!((result.government_monthly_payment - 926.35).abs() < 1e-9);
        // Rounding the payment moves the rate by a hair
        assert_relative_eq!(
            result.government_effective_rate,
            ((1.0 + 20.0 / 1200.0_f64).powi(12) - 1.0) * 100.0,
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_interest_free_period_lowers_realistic_rate() {
        let result = CardEngine::new(purchases_only()).calculate().unwrap();

        assert!(result.monthly_payment < result.government_monthly_payment);
        assert!(result.effective_rate < result.government_effective_rate);
        assert!(result.effective_rate > 0.0);
        assert!(result.remainder.abs() < 1.0);
    }

    #[test]
    fn test_minimum_payment_floor() {
        let config = CardConfig {
            minpay_units: 2_000.0,
            ..purchases_only()
        };
        assert_eq!(
            CardEngine::new(config).calculate().unwrap_err(),
            CalcError::AnnuityBelowMinPayment
        );

        // 10% of the balance is more than the twelve-month annuity
        let config = CardConfig {
            minpay_percentage: 10.0,
            ..purchases_only()
        };
        assert_eq!(CardEngine::new(config).calculate().unwrap_err().code(), -11);
    }

    #[test]
    fn test_fees_raise_both_rates() {
        let plain = CardEngine::new(purchases_only()).calculate().unwrap();
        let config = CardConfig {
            received_cash: 2_000.0,
            fees: CardFees {
                cash_transaction: 40.0,
                purchase_transaction: 0.0,
                origination: 0.0,
                annual: 300.0,
                period: 30.0,
            },
            remainder: RemainderPolicy::Ignore,
            ..purchases_only()
        };
        let charged = CardEngine::new(config).calculate().unwrap();

        assert!(charged.government_effective_rate > plain.government_effective_rate);
        assert!(charged.effective_rate > plain.effective_rate);
        assert_eq!(charged.remainder, 0.0);
    }

    #[test]
    fn test_long_interest_free_period() {
        let config = CardConfig {
            interest_free_days: 50,
            received_cash: 1_000.0,
            ..purchases_only()
        };
        let result = CardEngine::new(config).calculate().unwrap();
        assert!(result.effective_rate.is_finite());
        assert!(result.rounds <= MAX_ROUNDS);
    }

    #[test]
    fn test_both_iterations_report_convergence() {
        let result = CardEngine::new(purchases_only()).calculate().unwrap();

        assert!(result.government_convergence.is_converged());
        assert!(result.convergence.is_converged());
        assert_eq!(result.government_rounds, result.government_convergence.rounds());
        assert_eq!(result.rounds, result.convergence.rounds());
    }

    #[test]
    fn test_round_cap_marks_result_exhausted() {
        let capped = CardEngine::new(purchases_only())
            .with_max_rounds(1)
            .calculate()
            .unwrap();

        assert!(!capped.convergence.is_converged());
        assert!(matches!(
            capped.convergence,
            Convergence::Exhausted { rounds: 1, .. }
        ));
        assert_eq!(capped.government_convergence.rounds(), 1);
        assert!(capped.effective_rate.is_finite());
    }

    #[test]
    fn test_realistic_slope_matches_finite_difference() {
        let (payment, remainder, received, months, fraction) = (901.37, 0.42, 10_000.0, 12.0, 0.5);
        let k = 1.0 / (1.0 + 20.0 / 1200.0);
        let h = 1e-6;

        let (_, slope) = realistic_residual(payment, remainder, received, months, fraction, k);
        let (above, _) = realistic_residual(payment, remainder, received, months, fraction, k + h);
        let (below, _) = realistic_residual(payment, remainder, received, months, fraction, k - h);

        assert_relative_eq!(slope, (above - below) / (2.0 * h), max_relative = 1e-6);
    }

    #[test]
    fn test_realistic_slope_without_lag() {
        let k = 1.0 / 1.01;
        let h = 1e-6;
        let (_, slope) = realistic_residual(500.0, 0.0, 5_000.0, 24.0, 0.0, k);
        let (above, _) = realistic_residual(500.0, 0.0, 5_000.0, 24.0, 0.0, k + h);
        let (below, _) = realistic_residual(500.0, 0.0, 5_000.0, 24.0, 0.0, k - h);

        assert!((slope - (above - below) / (2.0 * h)).abs() < 1e-3);
    }
}
