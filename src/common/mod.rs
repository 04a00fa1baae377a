//! Value types shared by loan and card calculations

mod period;
mod rounding;

pub use period::{AnnuityRow, ScheduleRow, SerialRow};
pub use rounding::{
    round_half_up, Accuracy, PaymentTiming, RemainderPolicy, RoundDirection, RoundPrecision,
    Rounding,
};
