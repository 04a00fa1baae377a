//! Rounding policy, payment timing and serial-loan accuracy

use serde::{Deserialize, Serialize};

/// Direction applied when a payment is rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundDirection {
    /// Half rounds up (away from negative infinity)
    #[default]
    Normal,
    Up,
    Down,
}

/// Smallest payable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPrecision {
    /// Nearest 1/100
    #[default]
    Cent,
    /// Nearest whole currency unit
    Integer,
}

impl RoundPrecision {
    /// Scale factor that moves the payable unit to the integer position
    pub fn factor(self) -> f64 {
        match self {
            RoundPrecision::Cent => 100.0,
            RoundPrecision::Integer => 1.0,
        }
    }
}

/// Rounding rule for payments: direction x precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rounding {
    #[serde(default)]
    pub direction: RoundDirection,
    #[serde(default)]
    pub precision: RoundPrecision,
}

impl Rounding {
    pub fn new(direction: RoundDirection, precision: RoundPrecision) -> Self {
        Self { direction, precision }
    }

    /// Round an amount according to this policy
    pub fn apply(&self, amount: f64) -> f64 {
        let factor = self.precision.factor();
        match self.direction {
            RoundDirection::Up => (amount * factor).ceil() / factor,
            RoundDirection::Down => (amount * factor).floor() / factor,
            RoundDirection::Normal => round_half_up(amount * factor) / factor,
        }
    }

    /// Round to the payable unit, always with normal direction.
    ///
    /// Used for final remainders, which correct earlier rounding errors and
    /// therefore ignore the configured direction.
    pub fn nearest(&self, amount: f64) -> f64 {
        let factor = self.precision.factor();
        round_half_up(amount * factor) / factor
    }
}

/// Round half up: `floor(x + 0.5)`
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// When in each period a payment falls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTiming {
    /// Annuity-immediate: payment at period end
    #[default]
    Arrears,
    /// Annuity-due: payment at period start
    Advance,
}

impl PaymentTiming {
    pub fn is_advance(self) -> bool {
        matches!(self, PaymentTiming::Advance)
    }
}

/// What happens to the whole-loan rounding remainder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Paid or refunded with the last payment
    #[default]
    Compensate,
    /// Dropped
    Ignore,
}

impl RemainderPolicy {
    pub fn is_ignored(self) -> bool {
        matches!(self, RemainderPolicy::Ignore)
    }
}

/// Convergence target for the serial-loan secant iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Fast,
    #[default]
    Normal,
    ExtremelyAccurate,
}

impl Accuracy {
    /// Absolute present-value tolerance, scaled by the principal
    pub fn tolerance(self, principal: f64) -> f64 {
        match self {
            Accuracy::Fast => round_half_up(principal / 5_000.0),
            Accuracy::Normal => principal / 50_000_000.0,
            Accuracy::ExtremelyAccurate => principal / 50_000_000_000_000.0,
        }
    }
}
