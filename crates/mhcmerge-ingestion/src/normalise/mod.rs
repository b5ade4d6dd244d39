//! Allele nomenclature normalisation.
//!
//! `AlleleNormaliser` maps every predictor's allele spelling onto one
//! canonical form per MHC class so records from different tools join.

pub mod allele;

pub use allele::AlleleNormaliser;
