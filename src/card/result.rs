//! Credit card result record

use serde::Serialize;

use crate::solver::Convergence;

/// Regulatory and realistic effective rates for one card configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardResult {
    /// Rate with every amount drawn on day one and repaid in arrears
    pub government_effective_rate: f64,
    pub government_monthly_payment: f64,
    /// Rate with the interest-free period taken into account
    pub effective_rate: f64,
    pub monthly_payment: f64,
    /// Adjustment of the last realistic payment
    pub remainder: f64,
    pub government_rounds: u32,
    pub rounds: u32,
    /// Whether the regulatory iteration met its tolerance
    pub government_convergence: Convergence,
    pub convergence: Convergence,
}

impl CardResult {
    /// Months paid times the realistic payment, plus the remainder
    pub fn total_paid(&self, months: u32) -> f64 {
        self.monthly_payment * months as f64 + self.remainder
    }
}
