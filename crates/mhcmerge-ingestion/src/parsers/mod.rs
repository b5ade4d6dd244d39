//! Per-predictor output parsers.
//!
//! Each predictor writes its own dialect (wide or long, CSV or TSV, NetMHC
//! `-xls` exports). Every dialect is turned into the same `PredictionRecord`
//! shape here. Row-level problems are recorded in the sample's `IssueLog` and
//! the row is skipped; only header-level problems fail the whole output.

pub mod mhcflurry;
pub mod mhcnuggets;
pub mod netmhc;
pub mod syfpeithi;
mod table;

use std::collections::HashMap;

use tracing::debug;

use mhcmerge_common::entities::{Allele, Peptide, PredictionRecord, Predictor, SampleMetadata};
use mhcmerge_common::error::{MhcMergeError, Result};
use mhcmerge_common::issues::IssueLog;

use crate::normalise::AlleleNormaliser;

pub(crate) use table::Table;

/// Fail with `UnsupportedMhcClass` when `predictor` cannot score the sample's class.
pub fn ensure_supported(predictor: Predictor, meta: &SampleMetadata) -> Result<()> {
    if predictor.supports(meta.mhc_class) {
        Ok(())
    } else {
        Err(MhcMergeError::UnsupportedMhcClass {
            sample_id: meta.sample_id.clone(),
            tool: predictor,
            mhc_class: meta.mhc_class,
        })
    }
}

/// Parse one predictor's raw output for one sample.
///
/// Records come back unfiltered and unclassified. The class check runs
/// before any parsing. Empty output yields no records.
pub fn parse_output(
    predictor: Predictor,
    raw: &str,
    meta: &SampleMetadata,
    normaliser: &AlleleNormaliser,
    issues: &mut IssueLog,
) -> Result<Vec<PredictionRecord>> {
    ensure_supported(predictor, meta)?;

    let mut ctx = ParseContext::new(predictor, meta, normaliser, issues);
    match predictor {
        Predictor::Syfpeithi   => syfpeithi::parse(raw, &mut ctx)?,
        Predictor::Mhcflurry   => mhcflurry::parse(raw, &mut ctx)?,
        Predictor::Mhcnuggets  => mhcnuggets::parse(raw, &mut ctx)?,
        Predictor::Netmhcpan   => netmhc::parse(raw, &netmhc::NETMHCPAN, &mut ctx)?,
        Predictor::Netmhciipan => netmhc::parse(raw, &netmhc::NETMHCIIPAN, &mut ctx)?,
    }

    let records = ctx.into_records();
    debug!(tool = predictor.as_str(), sample = %meta.sample_id, records = records.len(), "Parsed tool output");
    Ok(records)
}

/// Score transform applied to a column's values before they become records.
pub(crate) type ScoreTransform = fn(f64) -> f64;

pub(crate) fn identity(score: f64) -> f64 {
    score
}

// ── Parse context ────────────────────────────────────────────────────────────

/// State shared by all parsers while reading one output file.
pub struct ParseContext<'a> {
    predictor: Predictor,
    meta: &'a SampleMetadata,
    normaliser: &'a AlleleNormaliser,
    issues: &'a mut IssueLog,
    /// Raw allele → normalised allele, `None` once it failed to normalise.
    /// Keeps the unrecognised-allele warning to one per distinct spelling.
    allele_cache: HashMap<String, Option<Allele>>,
    records: Vec<PredictionRecord>,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        predictor: Predictor,
        meta: &'a SampleMetadata,
        normaliser: &'a AlleleNormaliser,
        issues: &'a mut IssueLog,
    ) -> Self {
        Self {
            predictor,
            meta,
            normaliser,
            issues,
            allele_cache: HashMap::new(),
            records: Vec::new(),
        }
    }

    pub fn predictor(&self) -> Predictor {
        self.predictor
    }

    pub fn meta(&self) -> &SampleMetadata {
        self.meta
    }

    /// Normalise a raw allele, warning once per distinct spelling on failure.
    pub fn allele(&mut self, raw: &str) -> Option<Allele> {
        let key = raw.trim();
        if let Some(cached) = self.allele_cache.get(key) {
            return cached.clone();
        }
        let resolved = match self.normaliser.normalise(key, self.meta.mhc_class) {
            Ok(allele) => Some(allele),
            Err(e) => {
                self.issues.record_for(self.predictor, e);
                None
            }
        };
        self.allele_cache.insert(key.to_string(), resolved.clone());
        resolved
    }

    /// Validate a peptide cell; an invalid peptide makes the row malformed.
    pub fn peptide(&mut self, line: usize, raw: &str) -> Option<Peptide> {
        match Peptide::new(raw) {
            Ok(p) => Some(p),
            Err(e) => {
                self.malformed(line, e.to_string());
                None
            }
        }
    }

    /// Parse a required score cell (long layouts). Missing or non-numeric is malformed.
    pub fn score(&mut self, line: usize, raw: &str, column: &str) -> Option<f64> {
        if table::is_missing(raw) {
            self.malformed(line, format!("missing {column} value"));
            return None;
        }
        self.numeric(line, raw, column)
    }

    /// Parse an optional score cell (wide layouts). Missing cells are skipped silently.
    pub fn wide_score(&mut self, line: usize, raw: &str, column: &str) -> Option<f64> {
        if table::is_missing(raw) {
            return None;
        }
        self.numeric(line, raw, column)
    }

    fn numeric(&mut self, line: usize, raw: &str, column: &str) -> Option<f64> {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.malformed(line, format!("non-numeric {column} value '{}'", raw.trim()));
                None
            }
        }
    }

    pub fn malformed(&mut self, line: usize, reason: impl Into<String>) {
        self.issues.record(MhcMergeError::MalformedRecord {
            tool: self.predictor,
            line,
            reason: reason.into(),
        });
    }

    /// Error for a problem that makes the whole output unusable.
    pub fn header_error(&self, line: usize, reason: impl Into<String>) -> MhcMergeError {
        MhcMergeError::MalformedRecord {
            tool: self.predictor,
            line,
            reason: reason.into(),
        }
    }

    pub fn push(&mut self, peptide: Peptide, allele: Allele, score: f64) {
        self.records.push(PredictionRecord::new(peptide, allele, self.predictor, score));
    }

    pub fn into_records(self) -> Vec<PredictionRecord> {
        self.records
    }
}

// ── Shared layouts ───────────────────────────────────────────────────────────

/// Long layout: one row per (peptide, allele) with a single score column.
pub(crate) fn read_long(
    table: &Table,
    peptide_col: usize,
    allele_col: usize,
    score_col: usize,
    transform: ScoreTransform,
    ctx: &mut ParseContext<'_>,
) {
    let score_name = table.header()[score_col].clone();
    for row in table.rows() {
        let Some(peptide) = ctx.peptide(row.line, row.get(peptide_col)) else { continue };
        let Some(score) = ctx.score(row.line, row.get(score_col), &score_name) else { continue };
        let Some(allele) = ctx.allele(row.get(allele_col)) else { continue };
        ctx.push(peptide, allele, transform(score));
    }
}

/// Wide layout: one row per peptide, one score column per allele.
///
/// `columns` pairs a column index with the raw allele it scores.
pub(crate) fn read_wide(
    table: &Table,
    peptide_col: usize,
    columns: &[(usize, String)],
    transform: ScoreTransform,
    ctx: &mut ParseContext<'_>,
) {
    let resolved: Vec<(usize, Allele)> = columns
        .iter()
        .filter_map(|(idx, raw)| ctx.allele(raw).map(|a| (*idx, a)))
        .collect();
    if resolved.is_empty() {
        return;
    }

    for row in table.rows() {
        let Some(peptide) = ctx.peptide(row.line, row.get(peptide_col)) else { continue };
        for (idx, allele) in &resolved {
            let column = &table.header()[*idx];
            if let Some(score) = ctx.wide_score(row.line, row.get(*idx), column) {
                ctx.push(peptide.clone(), allele.clone(), transform(score));
            }
        }
    }
}
