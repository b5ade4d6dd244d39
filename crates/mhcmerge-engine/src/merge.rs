//! Outer join of per-tool record sets into one wide table per sample.
//!
//! Key space is the union of (peptide, canonical allele) across every
//! requested tool. Each row carries a cell for every requested tool, in
//! canonical tool order; a tool with nothing for the pair, or that did not
//! produce output at all, holds an explicit `None`.
//!
//! The result depends only on the record sets, never on the order the tools
//! finished in: record sets are visited in tool order and rows are kept
//! sorted by (allele, peptide).

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use mhcmerge_common::entities::{MergedRow, Peptide, PredictionRecord, Predictor, SampleMetadata, ToolCell};
use mhcmerge_common::error::{MhcMergeError, Result};
use mhcmerge_common::issues::IssueLog;

/// A sample's merged predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTable {
    pub sample_id: String,
    /// Requested tools in canonical order; every row has a cell for each.
    pub tools: Vec<Predictor>,
    /// Sorted by (allele, peptide), unique per key.
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, peptide: &str, allele: &str) -> Option<&MergedRow> {
        self.rows
            .iter()
            .find(|r| r.peptide.as_str() == peptide && r.allele == allele)
    }

    /// Number of rows holding a value for `tool`.
    pub fn coverage(&self, tool: Predictor) -> usize {
        self.rows.iter().filter(|r| r.cell(tool).is_some()).count()
    }
}

pub struct MergeEngine;

impl MergeEngine {
    /// Merge the record sets of one sample.
    ///
    /// Record sets of tools the sample did not request are ignored with a
    /// warning. A second record for the same key from the same tool is a
    /// `DuplicatePrediction`; the first one is kept. Zero records across all
    /// requested tools is `NoPredictionsProduced`.
    pub fn merge(
        per_tool: &BTreeMap<Predictor, Vec<PredictionRecord>>,
        meta: &SampleMetadata,
        issues: &mut IssueLog,
    ) -> Result<MergedTable> {
        let tools: Vec<Predictor> = meta.tools.iter().copied().collect();
        let empty_cells: BTreeMap<Predictor, Option<ToolCell>> = tools.iter().map(|t| (*t, None)).collect();

        // (allele, peptide) orders rows the way the table is written
        let mut rows: BTreeMap<(String, Peptide), BTreeMap<Predictor, Option<ToolCell>>> = BTreeMap::new();
        let mut merged = 0usize;

        for (predictor, records) in per_tool {
            if !meta.requests(*predictor) {
                warn!(
                    sample = %meta.sample_id,
                    tool = predictor.as_str(),
                    records = records.len(),
                    "Ignoring records from a tool the sample did not request"
                );
                continue;
            }

            for record in records {
                let key = (record.allele.canonical.clone(), record.peptide.clone());
                let cells = rows.entry(key).or_insert_with(|| empty_cells.clone());
                let slot = cells.entry(*predictor).or_insert(None);
                if slot.is_some() {
                    issues.record(MhcMergeError::DuplicatePrediction {
                        tool: *predictor,
                        peptide: record.peptide.to_string(),
                        allele: record.allele.canonical.clone(),
                    });
                    continue;
                }
                *slot = Some(ToolCell {
                    score: record.score,
                    is_binder: record.is_binder,
                });
                merged += 1;
            }
            debug!(sample = %meta.sample_id, tool = predictor.as_str(), records = records.len(), "Merged tool records");
        }

        if merged == 0 {
            return Err(MhcMergeError::NoPredictionsProduced {
                sample_id: meta.sample_id.clone(),
            });
        }

        let rows: Vec<MergedRow> = rows
            .into_iter()
            .map(|((allele, peptide), cells)| MergedRow { peptide, allele, cells })
            .collect();

        info!(sample = %meta.sample_id, rows = rows.len(), records = merged, "Merged predictions");
        Ok(MergedTable {
            sample_id: meta.sample_id.clone(),
            tools,
            rows,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mhcmerge_common::entities::{Allele, MhcClass};
    use mhcmerge_common::error::ErrorKind;
    use mhcmerge_test_utils::class_i_metadata;

    use crate::writer::TableWriter;

    fn rec(predictor: Predictor, peptide: &str, allele: &str, score: f64) -> PredictionRecord {
        let allele = Allele {
            raw: allele.into(),
            canonical: allele.into(),
            mhc_class: MhcClass::I,
        };
        PredictionRecord::new(Peptide::new(peptide).unwrap(), allele, predictor, score)
    }

    #[test]
    fn test_outer_join_fills_nulls() {
        let meta = class_i_metadata("S1", [Predictor::Syfpeithi, Predictor::Netmhcpan]);
        let mut per_tool = BTreeMap::new();
        per_tool.insert(Predictor::Syfpeithi, vec![rec(Predictor::Syfpeithi, "SIINFEKL", "HLA-A*02:01", 42.0)]);
        per_tool.insert(Predictor::Netmhcpan, vec![rec(Predictor::Netmhcpan, "GILGFVFTL", "HLA-A*02:01", 12.0)]);

        let mut log = IssueLog::new("S1");
        let table = MergeEngine::merge(&per_tool, &meta, &mut log).unwrap();
        assert_eq!(table.len(), 2);
        for row in &table.rows {
            assert_eq!(row.cells.len(), 2);
        }
        let row = table.row("SIINFEKL", "HLA-A*02:01").unwrap();
        assert_eq!(row.cell(Predictor::Syfpeithi).map(|c| c.score), Some(42.0));
        assert!(row.cell(Predictor::Netmhcpan).is_none());
    }

    #[test]
    fn test_missing_tool_still_gets_column() {
        let meta = class_i_metadata("S1", [Predictor::Syfpeithi, Predictor::Mhcflurry]);
        let mut per_tool = BTreeMap::new();
        per_tool.insert(Predictor::Syfpeithi, vec![rec(Predictor::Syfpeithi, "SIINFEKL", "HLA-A*02:01", 42.0)]);

        let mut log = IssueLog::new("S1");
        let table = MergeEngine::merge(&per_tool, &meta, &mut log).unwrap();
        assert_eq!(table.tools, vec![Predictor::Syfpeithi, Predictor::Mhcflurry]);
        assert!(table.rows[0].cells.contains_key(&Predictor::Mhcflurry));
        assert_eq!(table.coverage(Predictor::Mhcflurry), 0);
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let meta = class_i_metadata("S1", [Predictor::Netmhcpan]);
        let mut per_tool = BTreeMap::new();
        per_tool.insert(
            Predictor::Netmhcpan,
            vec![
                rec(Predictor::Netmhcpan, "SIINFEKL", "HLA-A*02:01", 100.0),
                rec(Predictor::Netmhcpan, "SIINFEKL", "HLA-A*02:01", 900.0),
            ],
        );
        let mut log = IssueLog::new("S1");
        let table = MergeEngine::merge(&per_tool, &meta, &mut log).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].cell(Predictor::Netmhcpan).map(|c| c.score), Some(100.0));
        assert_eq!(log.count(ErrorKind::DuplicatePrediction), 1);
    }

    #[test]
    fn test_unrequested_tool_ignored() {
        let meta = class_i_metadata("S1", [Predictor::Netmhcpan]);
        let mut per_tool = BTreeMap::new();
        per_tool.insert(Predictor::Netmhcpan, vec![rec(Predictor::Netmhcpan, "SIINFEKL", "HLA-A*02:01", 100.0)]);
        per_tool.insert(Predictor::Mhcflurry, vec![rec(Predictor::Mhcflurry, "GILGFVFTL", "HLA-A*02:01", 0.1)]);

        let mut log = IssueLog::new("S1");
        let table = MergeEngine::merge(&per_tool, &meta, &mut log).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.tools, vec![Predictor::Netmhcpan]);
        assert!(!table.rows[0].cells.contains_key(&Predictor::Mhcflurry));
    }

    #[test]
    fn test_all_empty_is_fatal() {
        let meta = class_i_metadata("S9", [Predictor::Syfpeithi, Predictor::Netmhcpan]);
        let mut per_tool = BTreeMap::new();
        per_tool.insert(Predictor::Syfpeithi, Vec::new());
        per_tool.insert(Predictor::Netmhcpan, Vec::new());

        let mut log = IssueLog::new("S9");
        let err = MergeEngine::merge(&per_tool, &meta, &mut log).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoPredictionsProduced);
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn test_rows_sorted_by_allele_then_peptide() {
        let meta = class_i_metadata("S1", [Predictor::Netmhcpan]);
        let mut per_tool = BTreeMap::new();
        per_tool.insert(
            Predictor::Netmhcpan,
            vec![
                rec(Predictor::Netmhcpan, "YLLPAIVHI", "HLA-B*07:02", 1.0),
                rec(Predictor::Netmhcpan, "SIINFEKL", "HLA-A*02:01", 2.0),
                rec(Predictor::Netmhcpan, "GILGFVFTL", "HLA-B*07:02", 3.0),
            ],
        );
        let mut log = IssueLog::new("S1");
        let table = MergeEngine::merge(&per_tool, &meta, &mut log).unwrap();
        let keys: Vec<(String, String)> = table
            .rows
            .iter()
            .map(|r| (r.allele.clone(), r.peptide.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("HLA-A*02:01".to_string(), "SIINFEKL".to_string()),
                ("HLA-B*07:02".to_string(), "GILGFVFTL".to_string()),
                ("HLA-B*07:02".to_string(), "YLLPAIVHI".to_string()),
            ]
        );
    }

    /// Every ordering of `items`.
    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_record_order_never_changes_output() {
        let meta = class_i_metadata("S1", [Predictor::Syfpeithi, Predictor::Mhcflurry, Predictor::Netmhcpan]);
        let syfpeithi = vec![
            rec(Predictor::Syfpeithi, "SIINFEKL", "HLA-A*02:01", 42.0),
            rec(Predictor::Syfpeithi, "GILGFVFTL", "HLA-A*02:01", 80.0),
            rec(Predictor::Syfpeithi, "NLVPMVATV", "HLA-B*07:02", 20.0),
            rec(Predictor::Syfpeithi, "GILGFVFTL", "HLA-B*07:02", 12.0),
        ];
        let mhcflurry = vec![
            rec(Predictor::Mhcflurry, "GILGFVFTL", "HLA-A*02:01", 0.01),
            rec(Predictor::Mhcflurry, "KLVALGINAV", "HLA-A*02:01", 0.3),
            rec(Predictor::Mhcflurry, "SIINFEKL", "HLA-B*07:02", 55.0),
        ];
        let netmhcpan = vec![
            rec(Predictor::Netmhcpan, "NLVPMVATV", "HLA-B*07:02", 150.0),
            rec(Predictor::Netmhcpan, "SIINFEKL", "HLA-A*02:01", 4100.5),
        ];

        let render = |per_tool: &BTreeMap<Predictor, Vec<PredictionRecord>>| {
            let mut log = IssueLog::new("S1");
            let table = MergeEngine::merge(per_tool, &meta, &mut log).unwrap();
            let bytes = TableWriter::default().render(&table, None).unwrap();
            (table, bytes)
        };

        let mut baseline = BTreeMap::new();
        baseline.insert(Predictor::Syfpeithi, syfpeithi.clone());
        baseline.insert(Predictor::Mhcflurry, mhcflurry.clone());
        baseline.insert(Predictor::Netmhcpan, netmhcpan.clone());
        let (expected_table, expected_bytes) = render(&baseline);
        assert_eq!(expected_table.len(), 6);

        let mut checked = 0;
        for s in permutations(&syfpeithi) {
            for m in permutations(&mhcflurry) {
                for n in permutations(&netmhcpan) {
                    // insertion order of the tools themselves is varied too
                    let mut per_tool = BTreeMap::new();
                    per_tool.insert(Predictor::Netmhcpan, n.clone());
                    per_tool.insert(Predictor::Mhcflurry, m.clone());
                    per_tool.insert(Predictor::Syfpeithi, s.clone());

                    let (table, bytes) = render(&per_tool);
                    assert_eq!(table.rows, expected_table.rows);
                    assert_eq!(bytes, expected_bytes);
                    checked += 1;
                }
            }
        }
        assert_eq!(checked, 24 * 6 * 2);
    }
}
