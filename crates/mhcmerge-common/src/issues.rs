//! Per-sample collection of recoverable issues.
//!
//! Parsing-level problems (bad alleles, malformed rows, duplicates, tools that
//! cannot score the sample's class) never abort a sample. They are recorded
//! here and summarised once the sample is merged.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::entities::Predictor;
use crate::error::{ErrorKind, MhcMergeError};

/// Flattened, serialisable view of one recovered condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: ErrorKind,
    pub tool: Option<Predictor>,
    pub message: String,
}

impl From<&MhcMergeError> for Issue {
    fn from(err: &MhcMergeError) -> Self {
        Self {
            kind: err.kind(),
            tool: err.tool(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueLog {
    sample_id: String,
    issues: Vec<Issue>,
}

impl IssueLog {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            issues: Vec::new(),
        }
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    /// Record a recovered condition.
    pub fn record(&mut self, err: MhcMergeError) {
        debug!(sample = %self.sample_id, kind = err.kind().as_str(), "{}", err);
        self.issues.push(Issue::from(&err));
    }

    /// Record a condition raised while handling `tool`'s output.
    ///
    /// Errors that carry no tool of their own (e.g. an unrecognised allele)
    /// are attributed to `tool`.
    pub fn record_for(&mut self, tool: Predictor, err: MhcMergeError) {
        debug!(sample = %self.sample_id, tool = tool.as_str(), kind = err.kind().as_str(), "{}", err);
        let mut issue = Issue::from(&err);
        issue.tool.get_or_insert(tool);
        self.issues.push(issue);
    }

    /// Move every issue of `other` into this log.
    pub fn absorb(&mut self, other: IssueLog) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Counts keyed by tool name; issues without a tool are filed under "-".
    pub fn counts_by_tool(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            let key = issue.tool.map(|t| t.as_str().to_string()).unwrap_or_else(|| "-".to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Emit the sample-level warning summary.
    ///
    /// Malformed rows are reported as counts per tool; every other issue is
    /// reported individually.
    pub fn log_summary(&self) {
        if self.issues.is_empty() {
            return;
        }

        let mut malformed: BTreeMap<Option<Predictor>, usize> = BTreeMap::new();
        for issue in &self.issues {
            if issue.kind == ErrorKind::MalformedRecord {
                *malformed.entry(issue.tool).or_insert(0) += 1;
            } else {
                warn!(sample = %self.sample_id, kind = issue.kind.as_str(), "{}", issue.message);
            }
        }
        for (tool, n) in malformed {
            let tool = tool.map(|t| t.as_str()).unwrap_or("-");
            warn!(sample = %self.sample_id, tool, dropped = n, "Dropped malformed records");
        }
    }
}
