//! Binder verdicts from per-tool thresholds.

use mhcmerge_common::entities::PredictionRecord;

/// Attach a binder verdict to `record`.
///
/// The comparison direction comes from the record's score type: affinity and
/// percentile scores bind at or below the threshold, raw scores at or above.
/// With no threshold the verdict is `None`.
pub fn classify(record: PredictionRecord, threshold: Option<f64>) -> PredictionRecord {
    let verdict = threshold.map(|t| record.score_type.binder_direction().is_binder(record.score, t));
    record.with_verdict(verdict)
}

pub fn classify_all(records: Vec<PredictionRecord>, threshold: Option<f64>) -> Vec<PredictionRecord> {
    records.into_iter().map(|r| classify(r, threshold)).collect()
}
