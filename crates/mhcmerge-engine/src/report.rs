//! Per-sample warning report (`<sample>_warnings.json`).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use mhcmerge_common::entities::Predictor;
use mhcmerge_common::error::{ErrorKind, MhcMergeError, Result};
use mhcmerge_common::issues::{Issue, IssueLog};

use crate::aggregator::ToolStatus;
use crate::writer::write_atomic;

#[derive(Debug, Serialize)]
pub struct WarningReport<'a> {
    pub sample_id: &'a str,
    pub generated_at: DateTime<Utc>,
    /// Rows in the merged table; absent when the sample failed
    pub rows: Option<usize>,
    pub tools: &'a BTreeMap<Predictor, ToolStatus>,
    pub counts_by_kind: BTreeMap<ErrorKind, usize>,
    pub counts_by_tool: BTreeMap<String, usize>,
    pub issues: &'a [Issue],
}

impl<'a> WarningReport<'a> {
    pub fn new(issues: &'a IssueLog, tools: &'a BTreeMap<Predictor, ToolStatus>, rows: Option<usize>) -> Self {
        Self {
            sample_id: issues.sample_id(),
            generated_at: Utc::now(),
            rows,
            tools,
            counts_by_kind: issues.counts_by_kind(),
            counts_by_tool: issues.counts_by_tool(),
            issues: issues.issues(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| MhcMergeError::Io(e.into()))
    }

    pub fn write(&self, dest: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(dest, json.as_bytes())
    }
}
