//! Core math modules.

pub mod grid;
pub mod matrix;
pub mod minimize;
pub mod stable;
