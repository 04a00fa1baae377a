//! Root finding for effective interest rates

mod newton;
mod stream;

pub use newton::{
    checked_effective_rate, effective_annual_rate, Convergence, NewtonSolver, SecantSolver,
    MAX_ROUNDS,
};
pub use stream::{stream_rate, IntervalStream, StreamInterval};
