//! Score calibration math utilities.

pub mod math;

pub use math::grid::linspace;
pub use math::matrix::{MatrixError, ScoreMatrix};
pub use math::minimize::{Minimum, NelderMead, ScalarLossMinimizer};
pub use math::stable::*;
