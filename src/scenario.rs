//! Scenario runner for product catalogue comparisons
//!
//! A scenario is one borrower request: amount, horizon and the rounding and
//! rate rules to apply. The runner prices it against every product in a
//! catalogue, one product after another.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::common::{Accuracy, PaymentTiming, RemainderPolicy, RoundDirection, RoundPrecision, Rounding};
use crate::error::CalcResult;
use crate::fixtures::ProductRecord;
use crate::loan::{AnnuityLoanResult, LoanEngine, SerialLoanResult};

/// Repayment profile of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanShape {
    #[default]
    Annuity,
    Serial,
}

/// A borrower request, one row of a scenario CSV
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanScenario {
    pub name: String,
    pub shape: LoanShape,
    pub received: f64,
    pub balloon: f64,
    pub number_of_periods: Option<u32>,
    pub first_payment: Option<f64>,
    pub periods_per_year: u32,
    pub interest_only_periods: u32,
    pub timing: PaymentTiming,
    pub round_direction: RoundDirection,
    pub round_precision: RoundPrecision,
    pub remainder: RemainderPolicy,
    pub ignore_origination: bool,
    pub rate_changes_at_thresholds: bool,
    pub rates_run_concurrently: bool,
    pub accuracy: Accuracy,
}

impl LoanScenario {
    pub fn rounding(&self) -> Rounding {
        Rounding::new(self.round_direction, self.round_precision)
    }
}

/// Result of one scenario for one product
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum LoanOutcome {
    Annuity(AnnuityLoanResult),
    Serial(SerialLoanResult),
}

impl LoanOutcome {
    pub fn effective_rate(&self) -> f64 {
        match self {
            LoanOutcome::Annuity(result) => result.effective_rate,
            LoanOutcome::Serial(result) => result.effective_rate,
        }
    }

    pub fn payback_period_count(&self) -> f64 {
        match self {
            LoanOutcome::Annuity(result) => result.payback_period_count,
            LoanOutcome::Serial(result) => result.payback_period_count,
        }
    }

    /// Annuity residue or serial remainder
    pub fn remainder(&self) -> f64 {
        match self {
            LoanOutcome::Annuity(result) => result.residue,
            LoanOutcome::Serial(result) => result.remainder,
        }
    }

    pub fn rounds(&self) -> u32 {
        match self {
            LoanOutcome::Annuity(result) => result.rounds,
            LoanOutcome::Serial(result) => result.rounds,
        }
    }
}

/// Runs scenarios against a loaded product catalogue
#[derive(Debug, Clone, Default)]
pub struct ScenarioRunner {
    products: Vec<ProductRecord>,
}

impl ScenarioRunner {
    pub fn new(products: Vec<ProductRecord>) -> Self {
        Self { products }
    }

    /// Price one scenario against a single product.
    ///
    /// `None` when the product does not offer the requested amount.
    pub fn run_product(
        &self,
        product: &ProductRecord,
        scenario: &LoanScenario,
    ) -> Option<CalcResult<LoanOutcome>> {
        let Some(builder) = product.loan_builder(scenario) else {
            debug!("{}: {} not offered", scenario.name, product.name);
            return None;
        };

        let outcome = builder.build().and_then(|config| {
            let engine = LoanEngine::new(config);
            match scenario.shape {
                LoanShape::Annuity => engine.annuity_loan().map(LoanOutcome::Annuity),
                LoanShape::Serial => engine.serial_loan().map(LoanOutcome::Serial),
            }
        });
        Some(outcome)
    }

    /// Price a scenario against every product that offers it, in catalogue order
    pub fn run(&self, scenario: &LoanScenario) -> Vec<(String, CalcResult<LoanOutcome>)> {
        let results: Vec<_> = self
            .products
            .iter()
            .filter_map(|product| {
                self.run_product(product, scenario)
                    .map(|outcome| (product.name.clone(), outcome))
            })
            .collect();

        let failed = results.iter().filter(|(_, outcome)| outcome.is_err()).count();
        info!(
            "{}: {} of {} products priced, {} failed",
            scenario.name,
            results.len(),
            self.products.len(),
            failed
        );
        results
    }

    /// Run several scenarios, keeping each scenario's results together
    pub fn run_scenarios(
        &self,
        scenarios: &[LoanScenario],
    ) -> Vec<Vec<(String, CalcResult<LoanOutcome>)>> {
        scenarios.iter().map(|scenario| self.run(scenario)).collect()
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalcError;
    use crate::fixtures::RateStep;

    fn product(name: &str, min_amount: f64, rate: f64) -> ProductRecord {
        ProductRecord {
            name: name.to_string(),
            capitalization_months: 1,
            interest_only_years: 1,
            steps: vec![RateStep {
                min_amount,
                max_amount: None,
                periodic_fee: 50.0,
                annual_interest: rate,
            }],
            ..ProductRecord::default()
        }
    }

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(vec![
            product("cheap", 0.0, 3.5),
            product("dear", 0.0, 5.0),
            product("large loans", 2_000_000.0, 3.0),
        ])
    }

    fn scenario(shape: LoanShape) -> LoanScenario {
        LoanScenario {
            name: "family".to_string(),
            shape,
            received: 1_500_000.0,
            number_of_periods: Some(240),
            periods_per_year: 12,
            ..LoanScenario::default()
        }
    }

    #[test]
    fn test_products_not_offering_are_skipped() {
        let results = runner().run(&scenario(LoanShape::Annuity));
        let names: Vec<_> = results.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["cheap", "dear"]);
    }

    #[test]
    fn test_cheaper_product_has_lower_rate() {
        for shape in [LoanShape::Annuity, LoanShape::Serial] {
            let results = runner().run(&scenario(shape));
            let cheap = results[0].1.as_ref().unwrap();
            let dear = results[1].1.as_ref().unwrap();
            assert!(cheap.effective_rate() < dear.effective_rate());
            assert!(matches!(
                (shape, cheap),
                (LoanShape::Annuity, LoanOutcome::Annuity(_)) | (LoanShape::Serial, LoanOutcome::Serial(_))
            ));
        }
    }

    #[test]
    fn test_failures_are_kept_per_product() {
        // Twelve interest-only periods are the most any product offers
        let request = LoanScenario {
            interest_only_periods: 24,
            ..scenario(LoanShape::Serial)
        };
        let results = runner().run(&request);
        assert_eq!(results.len(), 2);
        for (_, outcome) in &results {
            assert_eq!(outcome.as_ref().unwrap_err(), &CalcError::InterestPeriodTooLong);
        }
    }

    #[test]
    fn test_run_scenarios_groups_by_scenario() {
        let scenarios = [scenario(LoanShape::Annuity), scenario(LoanShape::Serial)];
        let grouped = runner().run_scenarios(&scenarios);
        assert_eq!(grouped.len(), 2);
        assert!(grouped.iter().all(|results| results.len() == 2));
    }
}
