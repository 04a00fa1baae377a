//! Loan configuration and its validating builder

use serde::{Deserialize, Serialize};

use crate::common::{Accuracy, PaymentTiming, RemainderPolicy, Rounding};
use crate::error::{CalcError, CalcResult};

use super::segment::{close_gaps, RateSegment};

/// How the payback horizon is chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTarget {
    /// Period mode: number of payment periods is given
    Periods(u32),
    /// Payment mode: first periodic payment is given
    FirstPayment(f64),
}

/// One-off and running fees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Fixed processing fee added to the principal
    pub processing: f64,

    /// Document fee added to the principal before the percentage fee
    pub document: f64,

    /// Origination fee in percent of the principal
    pub percentage: f64,

    /// Running fee per period in percent of the principal
    pub period_percentage: f64,
}

/// A validated loan configuration.
///
/// Build one with [`LoanConfigBuilder`]; the builder checks that every
/// required field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanConfig {
    /// Net amount the borrower receives
    pub received: f64,

    pub target: PaymentTarget,

    pub periods_per_year: u32,

    /// Capitalizations per year
    pub capitalization_freq: u32,

    /// Principal left for the final period
    pub balloon: f64,

    /// Leading interest-only periods requested
    pub interest_only_periods: u32,

    /// Longest interest-only stretch the bank offers
    pub interest_only_max: u32,

    pub rounding: Rounding,

    pub remainder: RemainderPolicy,

    /// Leave origination fees out of the principal
    pub ignore_origination: bool,

    pub timing: PaymentTiming,

    pub fees: FeeSchedule,

    /// Rate switches as the principal crosses segment limits
    pub rate_changes_at_thresholds: bool,

    /// Every segment accrues its own rate at the same time
    pub rates_run_concurrently: bool,

    /// Ordered, non-overlapping rate segments
    pub segments: Vec<RateSegment>,

    /// Serial-loan convergence target
    pub accuracy: Accuracy,
}

impl LoanConfig {
    pub fn builder() -> LoanConfigBuilder {
        LoanConfigBuilder::default()
    }

    /// Principal after origination fees
    pub fn principal(&self) -> f64 {
        if self.ignore_origination {
            self.received
        } else {
            (self.received + self.fees.document) * (100.0 + self.fees.percentage) / 100.0
                + self.fees.processing
        }
    }

    /// Capitalization frequency, with 0 read as monthly
    pub fn effective_capitalization(&self) -> u32 {
        if self.capitalization_freq == 0 {
            12
        } else {
            self.capitalization_freq
        }
    }

    pub fn rate_divisor(&self) -> f64 {
        100.0 * self.effective_capitalization() as f64
    }

    /// First payment, when the loan runs in payment mode
    pub fn first_payment(&self) -> Option<f64> {
        match self.target {
            PaymentTarget::FirstPayment(amount) => Some(amount),
            PaymentTarget::Periods(_) => None,
        }
    }

    /// Convert a count of payment periods to capitalization periods
    pub fn to_capitalization_periods(&self, periods: f64) -> f64 {
        periods / self.periods_per_year as f64 * self.effective_capitalization() as f64
    }

    /// Interest-only periods on the capitalization clock
    pub fn grace_periods(&self) -> f64 {
        self.to_capitalization_periods(self.interest_only_periods as f64)
    }

    /// Checks shared by annuity and serial loans, in a fixed order
    pub(crate) fn preprocess(&self) -> CalcResult<()> {
        if self.interest_only_periods > 0
            && (self.interest_only_max == 0 || self.interest_only_periods > self.interest_only_max)
        {
            return Err(CalcError::InterestPeriodTooLong);
        }

        let first = self.segments.first().ok_or(CalcError::FirstSegmentNotDefined)?;
        if self.balloon < first.lower_limit {
            return Err(CalcError::BalloonTooSmall);
        }

        if let Some(last) = self.segments.last() {
            let upper = last.upper_limit.value_or(0.0);
            if upper > 0.0 && self.balloon > upper {
                return Err(CalcError::BalloonTooBig);
            }
        }

        if self.first_payment().is_some() && self.rates_run_concurrently {
            return Err(CalcError::UnsupportedCombinationPeriodic);
        }

        Ok(())
    }

    /// Segment copy used for computation: the first lower limit reads as zero
    pub(crate) fn working_segments(&self) -> Vec<RateSegment> {
        let mut segments = self.segments.clone();
        if let Some(first) = segments.first_mut() {
            first.lower_limit = 0.0;
        }
        segments
    }
}

/// Collects loan settings and validates them into a [`LoanConfig`].
///
/// Deserializes from JSON with every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfigBuilder {
    pub received: Option<f64>,
    pub number_of_periods: Option<u32>,
    pub first_payment: Option<f64>,
    pub periods_per_year: Option<u32>,
    pub capitalization_freq: u32,
    pub balloon: f64,
    pub interest_only_periods: u32,
    pub interest_only_max: u32,
    pub rounding: Rounding,
    pub remainder: RemainderPolicy,
    pub ignore_origination: bool,
    pub timing: PaymentTiming,
    pub fees: FeeSchedule,
    pub rate_changes_at_thresholds: bool,
    pub rates_run_concurrently: bool,
    pub segments: Vec<RateSegment>,
    pub accuracy: Accuracy,
}

impl LoanConfigBuilder {
    pub fn received(mut self, amount: f64) -> Self {
        self.received = Some(amount);
        self
    }

    pub fn number_of_periods(mut self, periods: u32) -> Self {
        self.number_of_periods = Some(periods);
        self
    }

    pub fn first_payment(mut self, amount: f64) -> Self {
        self.first_payment = Some(amount);
        self
    }

    pub fn periods_per_year(mut self, periods: u32) -> Self {
        self.periods_per_year = Some(periods);
        self
    }

    pub fn capitalization_freq(mut self, freq: u32) -> Self {
        self.capitalization_freq = freq;
        self
    }

    pub fn balloon(mut self, amount: f64) -> Self {
        self.balloon = amount;
        self
    }

    pub fn interest_only(mut self, periods: u32, offered_max: u32) -> Self {
        self.interest_only_periods = periods;
        self.interest_only_max = offered_max;
        self
    }

    pub fn rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn remainder(mut self, policy: RemainderPolicy) -> Self {
        self.remainder = policy;
        self
    }

    pub fn ignore_origination(mut self, ignore: bool) -> Self {
        self.ignore_origination = ignore;
        self
    }

    pub fn timing(mut self, timing: PaymentTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn rate_changes_at_thresholds(mut self, enabled: bool) -> Self {
        self.rate_changes_at_thresholds = enabled;
        self
    }

    pub fn rates_run_concurrently(mut self, enabled: bool) -> Self {
        self.rates_run_concurrently = enabled;
        self
    }

    pub fn segment(mut self, segment: RateSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn segments(mut self, segments: Vec<RateSegment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn accuracy(mut self, accuracy: Accuracy) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Validate and build.
    ///
    /// All missing required fields are reported together. A nonzero first
    /// payment selects payment mode; otherwise the period count is used.
    pub fn build(self) -> CalcResult<LoanConfig> {
        let mut missing = Vec::new();

        if self.received.is_none() {
            missing.push("received");
        }
        if self.periods_per_year.is_none() {
            missing.push("periods_per_year");
        }
        let target = match (self.first_payment, self.number_of_periods) {
            (Some(amount), _) if amount != 0.0 => Some(PaymentTarget::FirstPayment(amount)),
            (_, Some(periods)) => Some(PaymentTarget::Periods(periods)),
            _ => {
                missing.push("number_of_periods or first_payment");
                None
            }
        };

        match (self.received, self.periods_per_year, target) {
            (Some(received), Some(periods_per_year), Some(target)) if missing.is_empty() => {
                if self.segments.is_empty() {
                    return Err(CalcError::FirstSegmentNotDefined);
                }
                let mut segments = self.segments;
                close_gaps(&mut segments);

                Ok(LoanConfig {
                    received,
                    target,
                    periods_per_year,
                    capitalization_freq: self.capitalization_freq,
                    balloon: self.balloon,
                    interest_only_periods: self.interest_only_periods,
                    interest_only_max: self.interest_only_max,
                    rounding: self.rounding,
                    remainder: self.remainder,
                    ignore_origination: self.ignore_origination,
                    timing: self.timing,
                    fees: self.fees,
                    rate_changes_at_thresholds: self.rate_changes_at_thresholds,
                    rates_run_concurrently: self.rates_run_concurrently,
                    segments,
                    accuracy: self.accuracy,
                })
            }
            _ => Err(CalcError::ParameterMissing {
                fields: missing.into_iter().map(String::from).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LoanConfigBuilder {
        LoanConfig::builder()
            .received(100_000.0)
            .number_of_periods(12)
            .periods_per_year(12)
            .segment(RateSegment::flat(6.0, 0.0))
    }

    #[test]
    fn test_builder_reports_every_missing_field() {
        let err = LoanConfig::builder().build().unwrap_err();
        assert_eq!(
            err,
            CalcError::ParameterMissing {
                fields: vec![
                    "received".to_string(),
                    "periods_per_year".to_string(),
                    "number_of_periods or first_payment".to_string(),
                ],
            }
        );
        assert_eq!(err.code(), -12);
    }

    #[test]
    fn test_builder_requires_a_segment() {
        let err = LoanConfig::builder()
            .received(1.0)
            .number_of_periods(1)
            .periods_per_year(12)
            .build()
            .unwrap_err();
        assert_eq!(err, CalcError::FirstSegmentNotDefined);
    }

    #[test]
    fn test_payment_mode_wins_when_nonzero() {
        let config = base().first_payment(9_000.0).build().unwrap();
        assert_eq!(config.target, PaymentTarget::FirstPayment(9_000.0));

        let config = base().first_payment(0.0).build().unwrap();
        assert_eq!(config.target, PaymentTarget::Periods(12));
    }

    #[test]
    fn test_principal_with_origination_fees() {
        let config = base()
            .fees(FeeSchedule {
                processing: 1_000.0,
                document: 500.0,
                percentage: 1.0,
                period_percentage: 0.0,
            })
            .build()
            .unwrap();
        // (100000 + 500) * 1.01 + 1000
        assert!((config.principal() - 102_505.0).abs() < 1e-9);
        assert_eq!(config.effective_capitalization(), 12);
        assert_eq!(config.rate_divisor(), 1200.0);
    }

    #[test]
    fn test_preprocess_order() {
        let config = base().interest_only(6, 0).balloon(-1.0).build().unwrap();
        assert_eq!(config.preprocess(), Err(CalcError::InterestPeriodTooLong));

        let config = base().interest_only(6, 12).build().unwrap();
        assert_eq!(config.preprocess(), Ok(()));

        let config = base()
            .segments(vec![RateSegment::bounded(6.0, 0.0, 10_000.0, 500_000.0)])
            .balloon(5_000.0)
            .build()
            .unwrap();
        assert_eq!(config.preprocess(), Err(CalcError::BalloonTooSmall));

        let config = base()
            .segments(vec![RateSegment::bounded(6.0, 0.0, 0.0, 500_000.0)])
            .balloon(600_000.0)
            .build()
            .unwrap();
        assert_eq!(config.preprocess(), Err(CalcError::BalloonTooBig));

        let config = base()
            .first_payment(9_000.0)
            .rates_run_concurrently(true)
            .build()
            .unwrap();
        assert_eq!(config.preprocess(), Err(CalcError::UnsupportedCombinationPeriodic));
    }

    #[test]
    fn test_builder_from_json() {
        let builder: LoanConfigBuilder = serde_json::from_str(
            r#"{
                "received": 250000,
                "number_of_periods": 120,
                "periods_per_year": 12,
                "timing": "advance",
                "rounding": {"direction": "up", "precision": "integer"},
                "segments": [{"annual_interest": 4.5, "periodic_fee": 45}]
            }"#,
        )
        .unwrap();
        let config = builder.build().unwrap();
        assert_eq!(config.timing, PaymentTiming::Advance);
        assert_eq!(config.segments.len(), 1);
        assert!(config.segments[0].upper_limit.is_unbounded());
    }
}
