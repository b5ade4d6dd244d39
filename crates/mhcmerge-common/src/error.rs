use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::entities::{MhcClass, Predictor};

#[derive(Debug, Error)]
pub enum MhcMergeError {
    #[error("Unrecognized class {mhc_class} allele format: '{raw}'")]
    UnrecognizedAlleleFormat { raw: String, mhc_class: MhcClass },

    #[error("{tool} cannot score MHC class {mhc_class} (sample {sample_id})")]
    UnsupportedMhcClass {
        sample_id: String,
        tool: Predictor,
        mhc_class: MhcClass,
    },

    #[error("Malformed {tool} record at line {line}: {reason}")]
    MalformedRecord {
        tool: Predictor,
        line: usize,
        reason: String,
    },

    #[error("Duplicate {tool} prediction for {peptide} / {allele}; keeping first occurrence")]
    DuplicatePrediction {
        tool: Predictor,
        peptide: String,
        allele: String,
    },

    #[error("No predictions produced for sample {sample_id}")]
    NoPredictionsProduced { sample_id: String },

    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid peptide source table {}: {reason}", .path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MhcMergeError>;

/// Flat classification of [`MhcMergeError`] used in summaries and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnrecognizedAlleleFormat,
    UnsupportedMhcClass,
    MalformedRecord,
    DuplicatePrediction,
    NoPredictionsProduced,
    WriteFailure,
    InvalidSource,
    Config,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnrecognizedAlleleFormat => "UnrecognizedAlleleFormat",
            ErrorKind::UnsupportedMhcClass      => "UnsupportedMhcClass",
            ErrorKind::MalformedRecord          => "MalformedRecord",
            ErrorKind::DuplicatePrediction      => "DuplicatePrediction",
            ErrorKind::NoPredictionsProduced    => "NoPredictionsProduced",
            ErrorKind::WriteFailure             => "WriteFailure",
            ErrorKind::InvalidSource            => "InvalidSource",
            ErrorKind::Config                   => "Config",
            ErrorKind::Io                       => "Io",
        }
    }
}

impl MhcMergeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MhcMergeError::UnrecognizedAlleleFormat { .. } => ErrorKind::UnrecognizedAlleleFormat,
            MhcMergeError::UnsupportedMhcClass { .. }      => ErrorKind::UnsupportedMhcClass,
            MhcMergeError::MalformedRecord { .. }          => ErrorKind::MalformedRecord,
            MhcMergeError::DuplicatePrediction { .. }      => ErrorKind::DuplicatePrediction,
            MhcMergeError::NoPredictionsProduced { .. }    => ErrorKind::NoPredictionsProduced,
            MhcMergeError::WriteFailure { .. }             => ErrorKind::WriteFailure,
            MhcMergeError::InvalidSource { .. }            => ErrorKind::InvalidSource,
            MhcMergeError::Config(_)                       => ErrorKind::Config,
            MhcMergeError::Io(_)                           => ErrorKind::Io,
        }
    }

    /// Sample-level fatal conditions; everything else is recovered locally.
    ///
    /// `UnsupportedMhcClass` only ends the sample/tool pairing, so it counts
    /// as recoverable at sample level.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NoPredictionsProduced
                | ErrorKind::WriteFailure
                | ErrorKind::InvalidSource
                | ErrorKind::Config
                | ErrorKind::Io
        )
    }

    /// Tool the condition is attributed to, when there is one.
    pub fn tool(&self) -> Option<Predictor> {
        match self {
            MhcMergeError::UnsupportedMhcClass { tool, .. }
            | MhcMergeError::MalformedRecord { tool, .. }
            | MhcMergeError::DuplicatePrediction { tool, .. } => Some(*tool),
            _ => None,
        }
    }
}
