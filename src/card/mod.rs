//! Credit card calculations with separate cash and purchase rates

mod config;
mod engine;
mod result;

pub use config::{CardConfig, CardConfigBuilder, CardFees};
pub use engine::CardEngine;
pub use result::CardResult;
