//! mhcmerge-common: Shared types, errors, and configuration used across all mhcmerge crates.

pub mod error;
pub mod entities;
pub mod issues;
pub mod config;

// Re-export commonly used types
pub use config::{AggregationConfig, LengthBounds, ThresholdConfig};
pub use entities::{
    Allele, BinderDirection, InputFileType, MergedRow, MhcClass, Peptide, PredictionRecord,
    Predictor, SampleMetadata, ScoreType, ToolCell,
};
pub use error::{ErrorKind, MhcMergeError, Result};
pub use issues::{Issue, IssueLog};
