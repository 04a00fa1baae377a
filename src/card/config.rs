//! Credit card configuration

use serde::{Deserialize, Serialize};

use crate::common::{RemainderPolicy, Rounding};
use crate::error::{CalcError, CalcResult};

/// Fees charged on the card
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardFees {
    /// Charged on cash withdrawals
    pub cash_transaction: f64,
    /// Charged on purchases
    pub purchase_transaction: f64,
    pub origination: f64,
    pub annual: f64,
    /// Fixed fee with every monthly payment
    pub period: f64,
}

/// A validated card configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    pub received_cash: f64,
    pub received_purchase: f64,
    pub number_of_months: u32,
    pub interest_free_days: u32,
    pub rounding: Rounding,
    pub remainder: RemainderPolicy,
    pub fees: CardFees,
    /// Nominal annual rate on cash withdrawals, percent
    pub rate_cash: f64,
    /// Nominal annual rate on purchases, percent
    pub rate_purchase: f64,
    /// Minimum payment as percent of the initial balance
    pub minpay_percentage: f64,
    /// Minimum payment in currency units
    pub minpay_units: f64,
}

impl CardConfig {
    pub fn builder() -> CardConfigBuilder {
        CardConfigBuilder::default()
    }

    /// Purchases plus their transaction fees
    pub fn purchase_loan(&self) -> f64 {
        self.received_purchase + self.fees.purchase_transaction
    }

    /// Cash plus its transaction fees and the origination fee
    pub fn cash_loan(&self) -> f64 {
        self.received_cash + self.fees.cash_transaction + self.fees.origination
    }

    pub fn received(&self) -> f64 {
        self.received_cash + self.received_purchase
    }
}

/// Collects card settings; every field is optional when deserializing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfigBuilder {
    pub received_cash: f64,
    pub received_purchase: f64,
    pub number_of_months: Option<u32>,
    pub interest_free_days: u32,
    pub rounding: Rounding,
    pub remainder: RemainderPolicy,
    pub fees: CardFees,
    pub rate_cash: Option<f64>,
    pub rate_purchase: Option<f64>,
    pub minpay_percentage: Option<f64>,
    pub minpay_units: Option<f64>,
}

impl CardConfigBuilder {
    pub fn received_cash(mut self, amount: f64) -> Self {
        self.received_cash = amount;
        self
    }

    pub fn received_purchase(mut self, amount: f64) -> Self {
        self.received_purchase = amount;
        self
    }

    pub fn number_of_months(mut self, months: u32) -> Self {
        self.number_of_months = Some(months);
        self
    }

    pub fn interest_free_days(mut self, days: u32) -> Self {
        self.interest_free_days = days;
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

    pub fn fees(mut self, fees: CardFees) -> Self {
        self.fees = fees;
        self
    }

    pub fn rate_cash(mut self, rate: f64) -> Self {
        self.rate_cash = Some(rate);
        self
    }

    pub fn rate_purchase(mut self, rate: f64) -> Self {
        self.rate_purchase = Some(rate);
        self
    }

    pub fn minimum_payment(mut self, percentage: f64, units: f64) -> Self {
        self.minpay_percentage = Some(percentage);
        self.minpay_units = Some(units);
        self
    }

    pub fn build(self) -> CalcResult<CardConfig> {
        let mut missing = Vec::new();
        if self.received_cash == 0.0 && self.received_purchase == 0.0 {
            missing.push("received_cash and/or received_purchase");
        }
        if self.number_of_months.is_none() {
            missing.push("number_of_months");
        }
        if self.rate_cash.is_none() {
            missing.push("rate_cash");
        }
        if self.rate_purchase.is_none() {
            missing.push("rate_purchase");
        }
        if self.minpay_percentage.is_none() {
            missing.push("minpay_percentage");
        }
        if self.minpay_units.is_none() {
            missing.push("minpay_units");
        }

        match (
            self.number_of_months,
            self.rate_cash,
            self.rate_purchase,
            self.minpay_percentage,
            self.minpay_units,
        ) {
            (Some(number_of_months), Some(rate_cash), Some(rate_purchase), Some(perc), Some(units))
                if missing.is_empty() =>
            {
                Ok(CardConfig {
                    received_cash: self.received_cash,
                    received_purchase: self.received_purchase,
                    number_of_months,
                    interest_free_days: self.interest_free_days,
                    rounding: self.rounding,
                    remainder: self.remainder,
                    fees: self.fees,
                    rate_cash,
                    rate_purchase,
                    minpay_percentage: perc,
                    minpay_units: units,
                })
            }
            _ => Err(CalcError::ParameterMissing {
                fields: missing.into_iter().map(String::from).collect(),
            }),
        }
    }
}
