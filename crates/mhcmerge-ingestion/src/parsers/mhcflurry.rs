//! MHCflurry output, long or wide.
//!
//! Long CSV as written by `mhcflurry-predict`:
//! ```text
//! peptide,allele,mhcflurry_affinity,mhcflurry_affinity_percentile,...,mhcflurry_presentation_percentile
//! ```
//! Wide TSV as written by the pipeline wrapper, one column per allele:
//! ```text
//! peptide  presentation_percentile_HLA-A*02:01  presentation_percentile_HLA-B*07:02
//! ```
//! The presentation percentile is preferred; the affinity percentile is the
//! fallback when no presentation column exists.

use mhcmerge_common::error::Result;

use super::{identity, read_long, read_wide, ParseContext, Table};

const PEPTIDE_COLUMNS: [&str; 2] = ["peptide", "sequence"];
const ALLELE_COLUMNS: [&str; 2] = ["allele", "best_allele"];

const LONG_SCORE_COLUMNS: [&str; 4] = [
    "mhcflurry_presentation_percentile",
    "presentation_percentile",
    "mhcflurry_affinity_percentile",
    "affinity_percentile",
];

const WIDE_SCORE_PREFIXES: [&str; 4] = [
    "mhcflurry_presentation_percentile_",
    "presentation_percentile_",
    "mhcflurry_affinity_percentile_",
    "affinity_percentile_",
];

pub fn parse(raw: &str, ctx: &mut ParseContext<'_>) -> Result<()> {
    let Some(table) = Table::read(raw, 0, ctx)? else { return Ok(()) };

    let peptide_col = table
        .column(&PEPTIDE_COLUMNS)
        .ok_or_else(|| ctx.header_error(table.header_line(), "no 'peptide' column"))?;

    if let Some(allele_col) = table.column(&ALLELE_COLUMNS) {
        let score_col = table
            .column(&LONG_SCORE_COLUMNS)
            .ok_or_else(|| ctx.header_error(table.header_line(), "no percentile column"))?;
        read_long(&table, peptide_col, allele_col, score_col, identity, ctx);
        return Ok(());
    }

    let allele_cols = table.prefixed(&WIDE_SCORE_PREFIXES);
    if allele_cols.is_empty() {
        return Err(ctx.header_error(table.header_line(), "no 'allele' column and no per-allele percentile columns"));
    }
    read_wide(&table, peptide_col, &allele_cols, identity, ctx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use mhcmerge_common::entities::{InputFileType, MhcClass, PredictionRecord, Predictor, SampleMetadata};
    use mhcmerge_common::error::{ErrorKind, Result};
    use mhcmerge_common::issues::IssueLog;

    use crate::normalise::AlleleNormaliser;
    use crate::parsers::parse_output;

    fn run(raw: &str) -> (Result<Vec<PredictionRecord>>, IssueLog) {
        let norm = AlleleNormaliser::new();
        let meta = SampleMetadata::new("S1", "", MhcClass::I, InputFileType::Peptide, [Predictor::Mhcflurry]);
        let mut log = IssueLog::new("S1");
        let result = parse_output(Predictor::Mhcflurry, raw, &meta, &norm, &mut log);
        (result, log)
    }

    #[test]
    fn test_long_prefers_presentation_percentile() {
        let raw = "peptide,allele,mhcflurry_affinity,mhcflurry_affinity_percentile,mhcflurry_processing_score,mhcflurry_presentation_score,mhcflurry_presentation_percentile\n\
                   SIINFEKL,HLA-A*02:01,250.3,1.2,0.5,0.7,0.9\n";
        let (records, log) = run(raw);
        let records = records.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, 0.9);
        assert_eq!(records[0].allele.canonical, "HLA-A*02:01");
        assert!(log.is_empty());
    }

    #[test]
    fn test_long_affinity_percentile_fallback() {
        let raw = "peptide,allele,mhcflurry_affinity,mhcflurry_affinity_percentile\nSIINFEKL,A0201,250.3,1.2\n";
        let records = run(raw).0.unwrap();
        assert_eq!(records[0].score, 1.2);
    }

    #[test]
    fn test_wide_layout() {
        let raw = "peptide\tpresentation_percentile_HLA-A*02:01\tpresentation_percentile_HLA-B*07:02\n\
                   SIINFEKL\t0.3\tnan\n";
        let records = run(raw).0.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].allele.canonical, "HLA-A*02:01");
    }

    #[test]
    fn test_non_numeric_long_score_is_malformed() {
        let raw = "peptide,allele,mhcflurry_presentation_percentile\nSIINFEKL,HLA-A*02:01,\nSIINFEKM,HLA-A*02:01,abc\n";
        let (records, log) = run(raw);
        assert!(records.unwrap().is_empty());
        assert_eq!(log.count(ErrorKind::MalformedRecord), 2);
    }

    #[test]
    fn test_no_score_columns_fails_output() {
        let err = run("peptide,allele,other\nSIINFEKL,A0201,1\n").0.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }
}
