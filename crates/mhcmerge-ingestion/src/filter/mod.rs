//! Record filters applied after parsing.
//!
//! - `length`: drops peptides outside the class's inclusive length bounds
//! - `threshold`: attaches a binder verdict from the tool's cutoff

pub mod length;
pub mod threshold;
