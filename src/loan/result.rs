//! Loan result records

use serde::Serialize;

use crate::common::ScheduleRow;
use crate::solver::Convergence;

/// Outcome of an annuity loan calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnuityLoanResult {
    /// Effective annual rate in percent
    pub effective_rate: f64,

    /// Rounding residue settled with the final payment
    pub residue: f64,

    /// Newton rounds used
    pub rounds: u32,

    pub convergence: Convergence,

    /// Payment periods including interest-only periods
    pub payback_period_count: f64,

    /// Rows in time order, interest-only row first
    pub schedule: Vec<ScheduleRow>,
}

impl AnnuityLoanResult {
    pub fn summary(&self) -> LoanSummary {
        let mut summary = LoanSummary::from_rows(&self.schedule);
        summary.total_paid += self.residue;
        summary
    }
}

/// Outcome of a serial loan calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialLoanResult {
    /// Effective annual rate in percent
    pub effective_rate: f64,

    /// Adjustment of the last payment
    pub remainder: f64,

    /// Secant rounds used
    pub rounds: u32,

    pub convergence: Convergence,

    pub payback_period_count: f64,

    /// One row per period
    pub schedule: Vec<ScheduleRow>,
}

impl SerialLoanResult {
    pub fn summary(&self) -> LoanSummary {
        let mut summary = LoanSummary::from_rows(&self.schedule);
        summary.total_paid += self.remainder;
        summary
    }
}

/// Totals over a schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoanSummary {
    pub rows: usize,
    pub payments: f64,
    /// Everything the borrower pays, fees and final adjustment included
    pub total_paid: f64,
    pub total_fees: f64,
}

impl LoanSummary {
    fn from_rows(rows: &[ScheduleRow]) -> Self {
        let payments: f64 = rows.iter().map(|r| r.term_count()).sum();
        let total_fees: f64 = rows.iter().map(|r| r.periodic_fee() * r.term_count()).sum();
        let total_paid: f64 = rows
            .iter()
            .map(|row| match row {
                // Annuity payments exclude the fee, serial payments include it
                ScheduleRow::Annuity(a) => a.gross_payment() * a.term_count,
                ScheduleRow::Serial(s) => s.payment,
            })
            .sum();

        Self {
            rows: rows.len(),
            payments,
            total_paid,
            total_fees,
        }
    }
}
