//! Schedule rows: one record per amortization interval or serial period

use serde::{Deserialize, Serialize};

/// One interval of an annuity schedule.
///
/// An interval spans `term_count` equal payments at one rate regime, from
/// `principal_ceiling` down to `principal_floor`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnuityRow {
    /// Rounded periodic payment, fees excluded
    pub payment: f64,

    /// Fee charged with every payment in the interval
    pub periodic_fee: f64,

    /// Number of payments in the interval (fractional in payment mode)
    pub term_count: f64,

    /// Principal left when the interval ends
    pub principal_floor: f64,

    /// Principal when the interval starts
    pub principal_ceiling: f64,

    /// Unrounded minus rounded payment
    pub remainder: f64,
}

impl AnnuityRow {
    /// Payment plus fee, the amount discounted by the rate solver
    pub fn gross_payment(&self) -> f64 {
        self.payment + self.periodic_fee
    }
}

/// One period of a serial (equal-installment) schedule
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SerialRow {
    /// Rounded payment, fee included
    pub payment: f64,

    pub periodic_fee: f64,

    /// Principal reduction in this period after rounding
    pub installment: f64,
}

/// A schedule row, tagged by loan shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ScheduleRow {
    Annuity(AnnuityRow),
    Serial(SerialRow),
}

impl ScheduleRow {
    pub fn payment(&self) -> f64 {
        match self {
            ScheduleRow::Annuity(row) => row.payment,
            ScheduleRow::Serial(row) => row.payment,
        }
    }

    pub fn periodic_fee(&self) -> f64 {
        match self {
            ScheduleRow::Annuity(row) => row.periodic_fee,
            ScheduleRow::Serial(row) => row.periodic_fee,
        }
    }

    /// Number of payments this row stands for
    pub fn term_count(&self) -> f64 {
        match self {
            ScheduleRow::Annuity(row) => row.term_count,
            ScheduleRow::Serial(_) => 1.0,
        }
    }

    pub fn as_annuity(&self) -> Option<&AnnuityRow> {
        match self {
            ScheduleRow::Annuity(row) => Some(row),
            ScheduleRow::Serial(_) => None,
        }
    }

    pub fn as_serial(&self) -> Option<&SerialRow> {
        match self {
            ScheduleRow::Serial(row) => Some(row),
            ScheduleRow::Annuity(_) => None,
        }
    }
}

impl From<AnnuityRow> for ScheduleRow {
    fn from(row: AnnuityRow) -> Self {
        ScheduleRow::Annuity(row)
    }
}

impl From<SerialRow> for ScheduleRow {
    fn from(row: SerialRow) -> Self {
        ScheduleRow::Serial(row)
    }
}
