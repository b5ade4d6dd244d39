//! mhcmerge-ingestion: Turns raw predictor output into normalised prediction records.
//! - Allele nomenclature normalisation
//! - One parser per predictor output dialect
//! - Peptide length and binder threshold filters
//! - Per-tool normalisation pipeline

pub mod affinity;
pub mod filter;
pub mod normalise;
pub mod parsers;
pub mod pipeline;

pub use normalise::AlleleNormaliser;
pub use parsers::parse_output;
pub use pipeline::ToolPipeline;
