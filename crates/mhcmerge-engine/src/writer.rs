//! Canonical table output.
//!
//! Columns: `peptide`, `allele`, then `<tool>_score` and `<tool>_is_binder`
//! for every requested tool in canonical order, then any source annotation
//! columns. Nulls are empty cells. Files are written to a temporary file in
//! the destination directory and renamed into place, so a failed write never
//! leaves a partial table behind.

use std::io::{self, Write};
use std::path::Path;

use csv::WriterBuilder;
use tempfile::NamedTempFile;
use tracing::info;

use mhcmerge_common::config::TableFormat;
use mhcmerge_common::entities::{MergedRow, Predictor};
use mhcmerge_common::error::{MhcMergeError, Result};

use crate::annotate::SourceAnnotation;
use crate::merge::MergedTable;

#[derive(Debug, Clone, Copy, Default)]
pub struct TableWriter {
    format: TableFormat,
}

impl TableWriter {
    pub fn new(format: TableFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }

    /// Header for `tools`, without annotation columns.
    pub fn base_header(tools: &[Predictor]) -> Vec<String> {
        let mut header = vec!["peptide".to_string(), "allele".to_string()];
        for tool in tools {
            header.push(format!("{tool}_score"));
            header.push(format!("{tool}_is_binder"));
        }
        header
    }

    pub fn header(table: &MergedTable, annotation: Option<&SourceAnnotation>) -> Vec<String> {
        let mut header = Self::base_header(&table.tools);
        if let Some(ann) = annotation {
            let extra = ann.column_names(&header);
            header.extend(extra);
        }
        header
    }

    /// Serialise the table into memory.
    pub fn render(&self, table: &MergedTable, annotation: Option<&SourceAnnotation>) -> io::Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.format.delimiter())
            .from_writer(Vec::new());

        writer.write_record(Self::header(table, annotation))?;
        for row in &table.rows {
            let mut fields = row_fields(row, &table.tools);
            if let Some(ann) = annotation {
                fields.extend(ann.values(row.peptide.as_str()).into_iter().map(str::to_string));
            }
            writer.write_record(&fields)?;
        }

        writer.into_inner().map_err(|e| e.into_error())
    }

    /// Write the table to `dest` atomically.
    ///
    /// Failing to serialise or to persist the table are both `WriteFailure`.
    pub fn write(&self, table: &MergedTable, annotation: Option<&SourceAnnotation>, dest: &Path) -> Result<()> {
        let bytes = self
            .render(table, annotation)
            .map_err(|source| write_failure(dest, source))?;
        write_atomic(dest, &bytes)?;
        info!(sample = %table.sample_id, path = %dest.display(), rows = table.len(), "Wrote merged table");
        Ok(())
    }
}

fn write_failure(dest: &Path, source: io::Error) -> MhcMergeError {
    MhcMergeError::WriteFailure {
        path: dest.to_path_buf(),
        source,
    }
}

fn row_fields(row: &MergedRow, tools: &[Predictor]) -> Vec<String> {
    let mut fields = Vec::with_capacity(2 + tools.len() * 2);
    fields.push(row.peptide.to_string());
    fields.push(row.allele.clone());
    for tool in tools {
        match row.cell(*tool) {
            Some(cell) => {
                fields.push(cell.score.to_string());
                fields.push(cell.is_binder.map(|b| b.to_string()).unwrap_or_default());
            }
            None => {
                fields.push(String::new());
                fields.push(String::new());
            }
        }
    }
    fields
}

/// Write `bytes` to a temporary file beside `dest`, then rename it over `dest`.
///
/// Any failure is a `WriteFailure` for `dest`; the temporary file is removed.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let fail = |source: io::Error| write_failure(dest, source);

    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(dest).map_err(|e| fail(e.error))?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use mhcmerge_common::entities::{Peptide, ToolCell};
    use mhcmerge_common::error::ErrorKind;
    use mhcmerge_test_utils::{fixtures, temp_dir};
    use pretty_assertions::assert_eq;

    fn table() -> MergedTable {
        let tools = vec![Predictor::Syfpeithi, Predictor::Netmhcpan];
        let mut cells = BTreeMap::new();
        cells.insert(Predictor::Syfpeithi, Some(ToolCell { score: 42.0, is_binder: Some(false) }));
        cells.insert(Predictor::Netmhcpan, Some(ToolCell { score: 120.5, is_binder: None }));
        let mut sparse = BTreeMap::new();
        sparse.insert(Predictor::Syfpeithi, None);
        sparse.insert(Predictor::Netmhcpan, Some(ToolCell { score: 8000.0, is_binder: Some(false) }));
        MergedTable {
            sample_id: "S1".into(),
            tools,
            rows: vec![
                MergedRow { peptide: Peptide::new("SIINFEKL").unwrap(), allele: "H2-Kb".into(), cells },
                MergedRow { peptide: Peptide::new("AAAAAAAA").unwrap(), allele: "H2-Kb".into(), cells: sparse },
            ],
        }
    }

    #[test]
    fn test_render_csv() {
        let bytes = TableWriter::default().render(&table(), None).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "peptide,allele,syfpeithi_score,syfpeithi_is_binder,netmhcpan_score,netmhcpan_is_binder\n\
             SIINFEKL,H2-Kb,42,false,120.5,\n\
             AAAAAAAA,H2-Kb,,,8000,false\n"
        );
    }

    #[test]
    fn test_render_tsv_with_annotation() {
        let ann = SourceAnnotation::parse(fixtures::SOURCE_CLASS_I, Path::new("src.tsv")).unwrap();
        let bytes = TableWriter::new(TableFormat::Tsv).render(&table(), Some(&ann)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "peptide\tallele\tsyfpeithi_score\tsyfpeithi_is_binder\tnetmhcpan_score\tnetmhcpan_is_binder\tprotein\tscore"
        );
        assert!(lines[1].ends_with("\tOVAL_CHICK\t0.9"));
        assert!(lines[2].ends_with("\tfalse\t\t"));
    }

    #[test]
    fn test_write_is_atomic_and_replaces() {
        let dir = temp_dir();
        let dest = dir.path().join("S1_predictions.csv");
        std::fs::write(&dest, "stale").unwrap();

        TableWriter::default().write(&table(), None, &dest).unwrap();
        let written = std::fs::read_to_string(&dest).unwrap();
        assert!(written.starts_with("peptide,allele"));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_serialisation_errors_are_write_failures() {
        let dest = Path::new("/tmp/results/S1_predictions.csv");
        let csv_error: io::Error = csv::Error::from(io::Error::new(io::ErrorKind::Other, "disk full")).into();
        let err = write_failure(dest, csv_error);
        assert_eq!(err.kind(), ErrorKind::WriteFailure);
        assert!(err.to_string().contains("S1_predictions.csv"));
    }

    #[test]
    fn test_write_failure_leaves_nothing() {
        let dir = temp_dir();
        let dest = dir.path().join("missing").join("S1_predictions.csv");
        let err = TableWriter::default().write(&table(), None, &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteFailure);
        assert!(!dest.exists());
    }
}
