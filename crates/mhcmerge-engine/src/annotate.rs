//! Peptide source annotation.
//!
//! The peptide table the predictions were made from (a `sequence` or
//! `peptide` column plus arbitrary metadata such as protein of origin) is
//! left-joined onto the merged rows by peptide. Its extra columns follow the
//! tool columns in source order.

use std::collections::HashMap;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use mhcmerge_common::error::{MhcMergeError, Result};

const PEPTIDE_COLUMNS: [&str; 2] = ["sequence", "peptide"];
const COLLISION_SUFFIX: &str = "_metadata";

#[derive(Debug, Clone, Default)]
pub struct SourceAnnotation {
    /// Extra column names as they appear in the source
    columns: Vec<String>,
    /// Peptide → extra column values
    by_peptide: HashMap<String, Vec<String>>,
}

impl SourceAnnotation {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parse a delimited source table. `origin` is only used in messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let invalid = |reason: String| MhcMergeError::InvalidSource {
            path: origin.to_path_buf(),
            reason,
        };

        let first = text.lines().next().unwrap_or("");
        let delimiter = if first.contains('\t') { b'\t' } else { b',' };
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| invalid(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        let peptide_col = PEPTIDE_COLUMNS
            .iter()
            .find_map(|name| header.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| invalid("no 'sequence' or 'peptide' column".to_string()))?;

        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != peptide_col)
            .map(|(_, h)| h.clone())
            .collect();

        let mut by_peptide = HashMap::new();
        for (n, result) in reader.records().enumerate() {
            let record = match result {
                Ok(r) if r.len() == header.len() => r,
                Ok(r) => {
                    warn!(source = %origin.display(), row = n + 1, fields = r.len(), "Skipping source row with wrong field count");
                    continue;
                }
                Err(e) => {
                    warn!(source = %origin.display(), row = n + 1, error = %e, "Skipping unreadable source row");
                    continue;
                }
            };
            let peptide = record.get(peptide_col).unwrap_or("").to_string();
            let values: Vec<String> = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != peptide_col)
                .map(|(_, v)| v.to_string())
                .collect();
            if by_peptide.contains_key(&peptide) {
                debug!(source = %origin.display(), peptide = %peptide, "Repeated source peptide, keeping first");
                continue;
            }
            by_peptide.insert(peptide, values);
        }

        Ok(Self { columns, by_peptide })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn peptide_count(&self) -> usize {
        self.by_peptide.len()
    }

    /// Extra column names, with `_metadata` appended to any name in `taken`.
    pub fn column_names(&self, taken: &[String]) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| {
                if taken.iter().any(|t| t == c) {
                    format!("{c}{COLLISION_SUFFIX}")
                } else {
                    c.clone()
                }
            })
            .collect()
    }

    /// Values for `peptide`, or empty cells when the source lacks it.
    pub fn values(&self, peptide: &str) -> Vec<&str> {
        match self.by_peptide.get(peptide) {
            Some(values) => values.iter().map(String::as_str).collect(),
            None => vec![""; self.columns.len()],
        }
    }
}

/// Load the source table when a path is given.
pub fn load_optional(path: Option<&Path>) -> Result<Option<SourceAnnotation>> {
    path.map(SourceAnnotation::from_path).transpose()
}
