//! Product catalogues, scenario files and recorded results

mod compare;
mod loader;
mod product;

pub use compare::{
    compare_annuity, compare_outcome, compare_serial, ExpectedPeriod, ExpectedResult, Mismatch,
    ANNUITY_RESIDUE_TOLERANCE, RATE_TOLERANCE, ROW_TOLERANCE, SERIAL_REMAINDER_TOLERANCE,
};
pub use loader::{load_expected, load_products, load_scenarios, read_scenarios};
pub use product::{ProductRecord, RateStep};
