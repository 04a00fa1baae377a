//! Annuity and serial loan calculations over rate segments

mod annuity;
mod config;
mod interval;
mod parallel;
mod result;
mod segment;
mod serial;

pub use config::{FeeSchedule, LoanConfig, LoanConfigBuilder, PaymentTarget};
pub use interval::{IntervalRequest, IntervalSolver};
pub use parallel::ParallelSegmentSolver;
pub use result::{AnnuityLoanResult, LoanSummary, SerialLoanResult};
pub use segment::{close_gaps, concurrent_balloon_interest, net_of_balloon, RateSegment, UpperLimit};

use crate::error::CalcResult;

/// Loan engine for one validated configuration
pub struct LoanEngine {
    config: LoanConfig,
}

impl LoanEngine {
    pub fn new(config: LoanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoanConfig {
        &self.config
    }

    /// Annuity schedule and effective rate
    pub fn annuity_loan(&self) -> CalcResult<AnnuityLoanResult> {
        annuity::annuity_loan(&self.config)
    }

    /// Serial schedule and effective rate
    pub fn serial_loan(&self) -> CalcResult<SerialLoanResult> {
        serial::serial_loan(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_runs_both_shapes() {
        let config = LoanConfig::builder()
            .received(100_000.0)
            .number_of_periods(12)
            .periods_per_year(12)
            .segment(RateSegment::flat(6.0, 0.0))
            .build()
            .unwrap();
        let engine = LoanEngine::new(config);

        let annuity = engine.annuity_loan().unwrap();
        let serial = engine.serial_loan().unwrap();
        assert!((annuity.effective_rate - serial.effective_rate).abs() < 0.01);
        // Serial repays faster, so it pays less interest
        assert!(serial.summary().total_paid < annuity.summary().total_paid);
    }
}
