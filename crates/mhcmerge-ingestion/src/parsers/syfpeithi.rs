//! SYFPEITHI wide TSV.
//!
//! ```text
//! sequence    HLA-A*02:01  HLA-A*02:01_binder  H2-Kb  H2-Kb_binder
//! SIINFEKL    42.0         False               80.1   True
//! ```
//!
//! Scores are the half-max matrix score in percent. The tool's own `_binder`
//! columns are ignored; verdicts come from the configured threshold.

use mhcmerge_common::error::Result;

use super::{identity, read_wide, ParseContext, Table};

const PEPTIDE_COLUMNS: [&str; 2] = ["sequence", "peptide"];
const BINDER_SUFFIX: &str = "_binder";

pub fn parse(raw: &str, ctx: &mut ParseContext<'_>) -> Result<()> {
    let Some(table) = Table::read(raw, 0, ctx)? else { return Ok(()) };

    let peptide_col = table
        .column(&PEPTIDE_COLUMNS)
        .ok_or_else(|| ctx.header_error(table.header_line(), "no 'sequence' or 'peptide' column"))?;

    let allele_cols: Vec<(usize, String)> = table
        .header()
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != peptide_col && !name.to_lowercase().ends_with(BINDER_SUFFIX))
        .map(|(i, name)| (i, name.clone()))
        .collect();

    read_wide(&table, peptide_col, &allele_cols, identity, ctx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use mhcmerge_common::entities::{InputFileType, MhcClass, Predictor, SampleMetadata};
    use mhcmerge_common::error::ErrorKind;
    use mhcmerge_common::issues::IssueLog;
    use pretty_assertions::assert_eq;

    use crate::normalise::AlleleNormaliser;
    use crate::parsers::parse_output;

    fn run(raw: &str, class: MhcClass) -> (Vec<(String, String, f64)>, IssueLog) {
        let norm = AlleleNormaliser::new();
        let meta = SampleMetadata::new("S1", "", class, InputFileType::Peptide, [Predictor::Syfpeithi]);
        let mut log = IssueLog::new("S1");
        let records = parse_output(Predictor::Syfpeithi, raw, &meta, &norm, &mut log).unwrap();
        let flat = records
            .into_iter()
            .map(|r| (r.peptide.to_string(), r.allele.canonical, r.score))
            .collect();
        (flat, log)
    }

    #[test]
    fn test_wide_layout() {
        let raw = "sequence\tHLA-A*02:01\tHLA-A*02:01_binder\tH2-Kb\tH2-Kb_binder\n\
                   SIINFEKL\t42.0\tFalse\t80.5\tTrue\n\
                   GILGFVFTL\t75\tTrue\tNA\tFalse\n";
        let (records, log) = run(raw, MhcClass::I);
        assert_eq!(
            records,
            vec![
                ("SIINFEKL".to_string(), "HLA-A*02:01".to_string(), 42.0),
                ("SIINFEKL".to_string(), "H2-Kb".to_string(), 80.5),
                ("GILGFVFTL".to_string(), "HLA-A*02:01".to_string(), 75.0),
            ]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_leading_blank_line_keeps_tab_layout() {
        let (records, log) = run("\npeptide\tH2-Kb\nSIINFEKL\t42\n", MhcClass::I);
        assert_eq!(records, vec![("SIINFEKL".to_string(), "H2-Kb".to_string(), 42.0)]);
        assert!(log.is_empty());
    }

    #[test]
    fn test_class_ii_sample() {
        let raw = "sequence\tHLA-DRB1*01:01\nPKYVKQNTLKLAT\t30\n";
        let (records, _) = run(raw, MhcClass::II);
        assert_eq!(records[0].1, "DRB1_0101");
    }

    #[test]
    fn test_bad_rows_are_malformed() {
        let raw = "sequence\tHLA-A*02:01\n\
                   SIINFEKL\thigh\n\
                   SIIN1EKL\t10\n\
                   GILGFVFTL\t12\n";
        let (records, log) = run(raw, MhcClass::I);
        assert_eq!(records.len(), 1);
        assert_eq!(log.count(ErrorKind::MalformedRecord), 2);
    }

    #[test]
    fn test_missing_sequence_column_fails_output() {
        let norm = AlleleNormaliser::new();
        let meta = SampleMetadata::new("S1", "", MhcClass::I, InputFileType::Peptide, [Predictor::Syfpeithi]);
        let mut log = IssueLog::new("S1");
        let err = parse_output(Predictor::Syfpeithi, "id\tHLA-A*02:01\n1\t3\n", &meta, &norm, &mut log).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    }
}
