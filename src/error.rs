//! Error taxonomy for loan and card calculations
//!
//! Every failure is terminal for the call. The numeric codes are stable and
//! shared with external callers that record failures per input row.

use std::path::PathBuf;

use thiserror::Error;

/// A calculation failure.
///
/// Variants fall in four groups: configuration validation, domain policy
/// rejections, numerical poles and convergence failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("Request for longer interest-only period than the bank offers")]
    InterestPeriodTooLong,

    #[error("First loan segment not defined")]
    FirstSegmentNotDefined,

    #[error("Balloon smaller than smallest loan offered")]
    BalloonTooSmall,

    #[error("Balloon bigger than biggest loan offered")]
    BalloonTooBig,

    #[error("No segment found (normally because the requested loan amount is too small or too big)")]
    NoSegmentFound,

    #[error("Failing convergence at zero periods or -100% nominal interest rate")]
    FailingConvergence,

    #[error("Freeloan does not support the combination of separate, concurrent interest rate segments and annuities in advance")]
    UnsupportedCombinationAdvance,

    #[error("The chosen periodic payment is too small to cover the interest on the loan")]
    PaymentTooSmall,

    #[error("The combination of separate, concurrent interest rate segments and user chosen periodic payment is not supported")]
    UnsupportedCombinationPeriodic,

    #[error("After the calculations effective interest rate was NaN")]
    EffectiveRateWasNan,

    #[error("With the chosen payback time, the annuity will fall below the required minimum payment")]
    AnnuityBelowMinPayment,

    #[error("Parameter missing: {}", .fields.join(", "))]
    ParameterMissing { fields: Vec<String> },
}

impl CalcError {
    /// Stable interop code for this error
    pub fn code(&self) -> i32 {
        match self {
            CalcError::InterestPeriodTooLong => -1,
            CalcError::FirstSegmentNotDefined => -2,
            CalcError::BalloonTooSmall => -3,
            CalcError::BalloonTooBig => -4,
            CalcError::NoSegmentFound => -5,
            CalcError::FailingConvergence => -6,
            CalcError::UnsupportedCombinationAdvance => -7,
            CalcError::PaymentTooSmall => -8,
            CalcError::UnsupportedCombinationPeriodic => -9,
            CalcError::EffectiveRateWasNan => -10,
            CalcError::AnnuityBelowMinPayment => -11,
            CalcError::ParameterMissing { .. } => -12,
        }
    }
}

/// Result alias used throughout the engine
pub type CalcResult<T> = Result<T, CalcError>;

/// Failure while reading product catalogues, scenarios or expected results
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
}
