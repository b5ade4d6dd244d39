//! Peptide length bounds, inclusive at both ends.

use mhcmerge_common::config::LengthBounds;
use mhcmerge_common::entities::PredictionRecord;

/// Keep records whose peptide length lies in `[min_length, max_length]`.
pub fn filter(records: Vec<PredictionRecord>, min_length: usize, max_length: usize) -> Vec<PredictionRecord> {
    records
        .into_iter()
        .filter(|r| min_length <= r.peptide.len() && r.peptide.len() <= max_length)
        .collect()
}

/// Same as [`filter`] with bounds taken from configuration.
pub fn filter_bounds(records: Vec<PredictionRecord>, bounds: LengthBounds) -> Vec<PredictionRecord> {
    filter(records, bounds.min, bounds.max)
}
