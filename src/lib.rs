//! Loan Rate Engine - Effective interest rates for consumer credit
//!
//! This library provides:
//! - Annuity loans over banded rate segments, with threshold or concurrent rates
//! - Serial loans with equal installments
//! - Credit cards with regulatory and realistic effective rates
//! - Newton and secant solvers for the effective annual rate
//! - Product catalogue loading and scenario comparison

pub mod card;
pub mod common;
pub mod error;
pub mod fixtures;
pub mod loan;
pub mod scenario;
pub mod solver;

// Re-export commonly used types
pub use card::{CardConfig, CardEngine, CardResult};
pub use common::{Accuracy, PaymentTiming, RemainderPolicy, RoundDirection, RoundPrecision, Rounding};
pub use error::{CalcError, CalcResult, FixtureError};
pub use loan::{AnnuityLoanResult, LoanConfig, LoanEngine, RateSegment, SerialLoanResult};
pub use scenario::{LoanOutcome, LoanScenario, LoanShape, ScenarioRunner};
