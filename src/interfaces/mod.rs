//! Outer surfaces driving the bank: CSV script input and report output.

pub mod csv;
pub mod script;
