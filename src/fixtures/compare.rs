//! Expected results and field-by-field comparison
//!
//! Expected records carry the error code, the effective rate, the payback
//! count, the residue as `"<amount> / <rounds>"` and a period table. The
//! table is indexed from 1; entry 0 is a placeholder.
//!
//! Annuity tables are indexed by segment, with the highest segment paid
//! first. Unused segments appear as null or all-zero entries. Serial tables
//! are indexed by period.

use std::fmt;

use serde::{Deserialize, Deserializer};

use crate::common::{AnnuityRow, PaymentTiming, SerialRow};
use crate::error::CalcResult;
use crate::loan::{AnnuityLoanResult, SerialLoanResult};
use crate::scenario::LoanOutcome;

pub const RATE_TOLERANCE: f64 = 1e-8;
pub const ANNUITY_RESIDUE_TOLERANCE: f64 = 1e-7;
pub const SERIAL_REMAINDER_TOLERANCE: f64 = 1e-6;
pub const ROW_TOLERANCE: f64 = 1e-4;

fn residue_before_rounds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text
        .as_deref()
        .and_then(|text| text.split(" / ").next())
        .and_then(|amount| amount.trim().parse().ok())
        .unwrap_or(0.0))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of an expected period table
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpectedPeriod {
    pub ann_payment: f64,
    pub ann_number_of_terms: f64,
    pub ann_periodic_fee: f64,
    pub ann_lower_segment_limit: f64,
    pub ann_upper_segment_limit: f64,
    pub ann_remainder: f64,
    pub ser_payment: f64,
    pub ser_installment: f64,
    pub ser_fee: f64,
}

impl ExpectedPeriod {
    fn is_blank_annuity(&self) -> bool {
        self.ann_payment == 0.0
            && self.ann_number_of_terms == 0.0
            && self.ann_periodic_fee == 0.0
            && self.ann_lower_segment_limit == 0.0
            && self.ann_upper_segment_limit == 0.0
            && self.ann_remainder == 0.0
    }
}

/// A recorded result for one product
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpectedResult {
    /// Error code, 0 on success
    pub error: i32,
    pub effective_interest_rate: f64,
    #[serde(rename = "resitude", deserialize_with = "residue_before_rounds")]
    pub residue: f64,
    pub payback_period_count: f64,
    #[serde(deserialize_with = "null_as_empty")]
    pub periods: Vec<Option<ExpectedPeriod>>,
}

/// A field that differs from its recorded value
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub field: String,
    pub expected: f64,
    pub actual: f64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

#[derive(Default)]
struct Mismatches(Vec<Mismatch>);

impl Mismatches {
    fn check(&mut self, field: impl Into<String>, expected: f64, actual: f64, tolerance: f64) {
        if !((expected - actual).abs() <= tolerance) {
            self.0.push(Mismatch {
                field: field.into(),
                expected,
                actual,
            });
        }
    }

    fn count(&mut self, field: &str, expected: usize, actual: usize) -> bool {
        self.check(field, expected as f64, actual as f64, 0.0);
        expected == actual
    }

    /// Error codes must agree; the result when both sides succeeded
    fn succeeded<'a, T>(
        &mut self,
        outcome: &'a CalcResult<T>,
        expected: &ExpectedResult,
    ) -> Option<&'a T> {
        let actual = outcome.as_ref().err().map_or(0, |err| err.code());
        self.check("error", expected.error as f64, actual as f64, 0.0);
        match outcome {
            Ok(result) if expected.error == 0 => Some(result),
            _ => None,
        }
    }
}

/// Compare an annuity result with its recorded values
pub fn compare_annuity(
    outcome: &CalcResult<AnnuityLoanResult>,
    expected: &ExpectedResult,
) -> Vec<Mismatch> {
    let mut found = Mismatches::default();
    if let Some(result) = found.succeeded(outcome, expected) {
        annuity_fields(&mut found, result, expected);
    }
    found.0
}

fn annuity_fields(found: &mut Mismatches, result: &AnnuityLoanResult, expected: &ExpectedResult) {
    found.check("effectiveInterestRate", expected.effective_interest_rate, result.effective_rate, RATE_TOLERANCE);
    found.check("paybackPeriodCount", expected.payback_period_count, result.payback_period_count, RATE_TOLERANCE);
    found.check("residue", expected.residue, result.residue, ANNUITY_RESIDUE_TOLERANCE);

    // Table order is bottom segment first; the schedule runs in time order
    let table: Vec<&ExpectedPeriod> = expected
        .periods
        .iter()
        .skip(1)
        .flatten()
        .filter(|period| !period.is_blank_annuity())
        .rev()
        .collect();
    let rows: Vec<&AnnuityRow> = result.schedule.iter().filter_map(|row| row.as_annuity()).collect();
    if !table.is_empty() && found.count("periods", table.len(), rows.len()) {
        for (i, (want, row)) in table.iter().zip(rows).enumerate() {
            found.check(format!("row {i} annLowerSegmentLimit"), want.ann_lower_segment_limit, row.principal_floor, ROW_TOLERANCE);
            found.check(format!("row {i} annUpperSegmentLimit"), want.ann_upper_segment_limit, row.principal_ceiling, ROW_TOLERANCE);
            found.check(format!("row {i} annPayment"), want.ann_payment, row.payment, ROW_TOLERANCE);
            found.check(format!("row {i} annRemainder"), want.ann_remainder, row.remainder, ROW_TOLERANCE);
            found.check(format!("row {i} annPeriodicFee"), want.ann_periodic_fee, row.periodic_fee, ROW_TOLERANCE);
            found.check(format!("row {i} annNumberOfTerms"), want.ann_number_of_terms, row.term_count, ROW_TOLERANCE);
        }
    }
}

/// Compare a serial result with its recorded values.
///
/// Arrears loans start paying in period 1, so their table has one more
/// entry than the schedule has rows.
pub fn compare_serial(
    outcome: &CalcResult<SerialLoanResult>,
    expected: &ExpectedResult,
    timing: PaymentTiming,
) -> Vec<Mismatch> {
    let mut found = Mismatches::default();
    if let Some(result) = found.succeeded(outcome, expected) {
        serial_fields(&mut found, result, expected, timing);
    }
    found.0
}

fn serial_fields(
    found: &mut Mismatches,
    result: &SerialLoanResult,
    expected: &ExpectedResult,
    timing: PaymentTiming,
) {
    found.check("effectiveInterestRate", expected.effective_interest_rate, result.effective_rate, RATE_TOLERANCE);
    found.check("paybackPeriodCount", expected.payback_period_count, result.payback_period_count, RATE_TOLERANCE);
    found.check("remainder", expected.residue, result.remainder, SERIAL_REMAINDER_TOLERANCE);

    let first = if timing.is_advance() { 0 } else { 1 };
    let rows: Vec<&SerialRow> = result.schedule.iter().filter_map(|row| row.as_serial()).collect();
    if found.count("periods", expected.periods.len(), rows.len() + first) {
        for (period, want) in expected.periods.iter().enumerate().skip(1) {
            let want = want.unwrap_or_default();
            let row = rows[period - first];
            found.check(format!("period {period} serFee"), want.ser_fee, row.periodic_fee, ROW_TOLERANCE);
            found.check(format!("period {period} serInstallment"), want.ser_installment, row.installment, ROW_TOLERANCE);
            found.check(format!("period {period} serPayment"), want.ser_payment, row.payment, ROW_TOLERANCE);
        }
    }
}

/// Compare either loan shape
pub fn compare_outcome(
    outcome: &CalcResult<LoanOutcome>,
    expected: &ExpectedResult,
    timing: PaymentTiming,
) -> Vec<Mismatch> {
    let mut found = Mismatches::default();
    match found.succeeded(outcome, expected) {
        Some(LoanOutcome::Annuity(result)) => annuity_fields(&mut found, result, expected),
        Some(LoanOutcome::Serial(result)) => serial_fields(&mut found, result, expected, timing),
        None => {}
    }
    found.0
}
