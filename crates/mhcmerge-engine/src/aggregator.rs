//! Per-sample aggregation.
//!
//! Flow for a single sample:
//!   1. Set aside requested tools that cannot score the sample's class
//!   2. Load and normalise every other requested tool's output concurrently,
//!      each under the configured timeout
//!   3. Wait for all of them (barrier), folding failures into "no records"
//!   4. Merge the record sets into one table
//!   5. Annotate from the peptide source table, if any, and write atomically
//!   6. Write the warning report
//!
//! Samples share nothing; a batch runs up to `parallel_samples` of them at once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use mhcmerge_common::config::AggregationConfig;
use mhcmerge_common::entities::{PredictionRecord, Predictor, SampleMetadata};
use mhcmerge_common::error::{ErrorKind, MhcMergeError, Result};
use mhcmerge_common::issues::IssueLog;
use mhcmerge_ingestion::pipeline::{ensure_supported, ToolPipeline};

use crate::annotate;
use crate::job::SampleJob;
use crate::merge::{MergeEngine, MergedTable};
use crate::report::WarningReport;
use crate::writer::TableWriter;

// ── Tool outputs and statuses ────────────────────────────────────────────────

/// What a requested tool left behind for a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Raw output text
    Raw(String),
    /// The tool (or loading its output) failed
    Failed(String),
    /// The tool did not finish in time
    TimedOut,
}

/// How a requested tool ended up contributing to the merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    Merged { records: usize },
    Unsupported,
    /// Output present but unusable as a whole (e.g. missing score column)
    Rejected { reason: String },
    Failed { reason: String },
    TimedOut,
    Missing,
}

impl ToolStatus {
    pub fn contributed(&self) -> bool {
        matches!(self, ToolStatus::Merged { records } if *records > 0)
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Merged { records } => write!(f, "{records} records"),
            ToolStatus::Unsupported        => f.write_str("unsupported MHC class"),
            ToolStatus::Rejected { reason } => write!(f, "rejected: {reason}"),
            ToolStatus::Failed { reason }  => write!(f, "failed: {reason}"),
            ToolStatus::TimedOut           => f.write_str("timed out"),
            ToolStatus::Missing            => f.write_str("no output"),
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SampleOutcome {
    pub sample_id: String,
    pub table: MergedTable,
    pub tools: BTreeMap<Predictor, ToolStatus>,
    pub issues: IssueLog,
    /// Set once the table has been written
    pub table_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

/// A sample that ended in a fatal condition.
#[derive(Debug, Error)]
#[error("sample {sample_id} failed: {error}")]
pub struct SampleFailure {
    pub sample_id: String,
    #[source]
    pub error: MhcMergeError,
    pub tools: BTreeMap<Predictor, ToolStatus>,
    pub issues: IssueLog,
}

impl SampleFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

// ── Aggregator ───────────────────────────────────────────────────────────────

pub struct SampleAggregator {
    pipeline: Arc<ToolPipeline>,
    writer: TableWriter,
}

impl SampleAggregator {
    /// Validates `config` once; every sample then runs against it unchanged.
    pub fn new(config: AggregationConfig) -> Result<Self> {
        config.validate()?;
        let writer = TableWriter::new(config.output.format);
        Ok(Self {
            pipeline: Arc::new(ToolPipeline::new(config)),
            writer,
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        self.pipeline.config()
    }

    pub fn writer(&self) -> &TableWriter {
        &self.writer
    }

    /// Merge already-loaded tool outputs for one sample. Nothing is written.
    ///
    /// Outputs of tools the sample did not request are ignored with a
    /// warning; requested tools without an entry count as missing.
    pub fn aggregate(
        &self,
        meta: &SampleMetadata,
        mut outputs: BTreeMap<Predictor, ToolOutput>,
    ) -> std::result::Result<SampleOutcome, SampleFailure> {
        let mut issues = IssueLog::new(meta.sample_id.clone());
        let mut per_tool = BTreeMap::new();
        let mut statuses = BTreeMap::new();

        for tool in runnable_tools(meta, &mut statuses, &mut issues) {
            let output = outputs.remove(&tool);
            let (records, status) = normalise_tool(&self.pipeline, tool, output, meta, &mut issues);
            if let Some(records) = records {
                per_tool.insert(tool, records);
            }
            statuses.insert(tool, status);
        }
        for tool in outputs.keys().filter(|tool| !meta.requests(**tool)) {
            warn!(sample = %meta.sample_id, tool = tool.as_str(), "Ignoring output of a tool the sample did not request");
        }

        finish(meta, per_tool, statuses, issues)
    }

    /// Load, merge and write one sample.
    ///
    /// Every requested tool is handled in its own task; the merge waits for
    /// all of them. The table goes to the job's output path or
    /// `<output_dir>/<sample>_predictions.<ext>`.
    #[instrument(skip(self, job, output_dir), fields(sample = %job.meta.sample_id))]
    pub async fn run(&self, job: &SampleJob, output_dir: &Path) -> std::result::Result<SampleOutcome, SampleFailure> {
        let meta = Arc::new(job.meta.clone());
        let timeout = self.config().execution.tool_timeout_secs.map(Duration::from_secs);

        let mut issues = IssueLog::new(meta.sample_id.clone());
        let mut statuses = BTreeMap::new();
        let runnable = runnable_tools(&meta, &mut statuses, &mut issues);

        let tasks = runnable.into_iter().map(|tool| {
            let pipeline = Arc::clone(&self.pipeline);
            let meta = Arc::clone(&meta);
            let failed = job.failed.get(&tool).cloned();
            let path = job.outputs.get(&tool).cloned();

            async move {
                let work = async move {
                    let output = load_output(failed, path).await;
                    tokio::task::spawn_blocking(move || {
                        let mut issues = IssueLog::new(meta.sample_id.clone());
                        let (records, status) = normalise_tool(&pipeline, tool, output, &meta, &mut issues);
                        (records, status, issues)
                    })
                    .await
                };
                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, work).await.ok(),
                    None => Some(work.await),
                };
                (tool, result)
            }
        });

        // Barrier: results come back in canonical tool order whatever order they finished in.
        let mut per_tool = BTreeMap::new();
        for (tool, result) in join_all(tasks).await {
            match result {
                Some(Ok((records, status, tool_issues))) => {
                    issues.absorb(tool_issues);
                    if let Some(records) = records {
                        per_tool.insert(tool, records);
                    }
                    statuses.insert(tool, status);
                }
                Some(Err(join_error)) => {
                    warn!(tool = tool.as_str(), error = %join_error, "Tool normalisation task failed");
                    statuses.insert(tool, ToolStatus::Failed { reason: join_error.to_string() });
                }
                None => {
                    // spawn_blocking work cannot be cancelled; it finishes in the background and is dropped
                    warn!(tool = tool.as_str(), "Tool output timed out");
                    debug!(tool = tool.as_str(), "Abandoned the timed-out normalisation task");
                    statuses.insert(tool, ToolStatus::TimedOut);
                }
            }
        }

        let format = self.config().output.format;
        let report_path = job.report_path(output_dir, format);
        let outcome = match finish(&meta, per_tool, statuses, issues) {
            Ok(outcome) => outcome,
            Err(failure) => {
                self.write_report(&failure.issues, &failure.tools, None, &report_path);
                return Err(failure);
            }
        };

        let table_path = job.table_path(output_dir, format);
        let written = annotate::load_optional(job.source.as_deref())
            .and_then(|ann| self.writer.write(&outcome.table, ann.as_ref(), &table_path));
        if let Err(error) = written {
            let failure = SampleFailure {
                sample_id: outcome.sample_id,
                error,
                tools: outcome.tools,
                issues: outcome.issues,
            };
            self.write_report(&failure.issues, &failure.tools, None, &report_path);
            return Err(failure);
        }

        let report_path = self
            .write_report(&outcome.issues, &outcome.tools, Some(outcome.table.len()), &report_path)
            .then_some(report_path);

        Ok(SampleOutcome {
            table_path: Some(table_path),
            report_path,
            ..outcome
        })
    }

    /// Run every job, at most `parallel_samples` at a time. Results follow job order.
    pub async fn run_batch(
        &self,
        jobs: &[SampleJob],
        output_dir: &Path,
    ) -> Vec<std::result::Result<SampleOutcome, SampleFailure>> {
        let limit = self.config().execution.parallel_samples.max(1);
        info!(samples = jobs.len(), parallel = limit, "Starting batch");
        stream::iter(jobs)
            .map(|job| self.run(job, output_dir))
            .buffered(limit)
            .collect()
            .await
    }

    /// Returns whether a report was written. Report problems never fail a sample.
    fn write_report(
        &self,
        issues: &IssueLog,
        tools: &BTreeMap<Predictor, ToolStatus>,
        rows: Option<usize>,
        dest: &Path,
    ) -> bool {
        if !self.config().output.write_warning_report {
            return false;
        }
        match WarningReport::new(issues, tools, rows).write(dest) {
            Ok(()) => true,
            Err(e) => {
                warn!(sample = issues.sample_id(), path = %dest.display(), error = %e, "Could not write warning report");
                false
            }
        }
    }
}

async fn load_output(failed: Option<String>, path: Option<PathBuf>) -> Option<ToolOutput> {
    if let Some(reason) = failed {
        return Some(ToolOutput::Failed(reason));
    }
    let path = path?;
    Some(match tokio::fs::read_to_string(&path).await {
        Ok(text) => ToolOutput::Raw(text),
        Err(e) => ToolOutput::Failed(format!("{}: {e}", path.display())),
    })
}

/// Requested tools able to score the sample's class, in canonical order.
///
/// The others are marked `Unsupported` and never loaded or parsed.
fn runnable_tools(
    meta: &SampleMetadata,
    statuses: &mut BTreeMap<Predictor, ToolStatus>,
    issues: &mut IssueLog,
) -> Vec<Predictor> {
    let mut runnable = Vec::new();
    for &tool in &meta.tools {
        match ensure_supported(tool, meta) {
            Ok(()) => runnable.push(tool),
            Err(e) => {
                issues.record(e);
                statuses.insert(tool, ToolStatus::Unsupported);
            }
        }
    }
    runnable
}

/// Turn one supported tool's output into records, or into the reason it has none.
fn normalise_tool(
    pipeline: &ToolPipeline,
    tool: Predictor,
    output: Option<ToolOutput>,
    meta: &SampleMetadata,
    issues: &mut IssueLog,
) -> (Option<Vec<PredictionRecord>>, ToolStatus) {
    match output {
        None => {
            warn!(sample = %meta.sample_id, tool = tool.as_str(), "No output for requested tool");
            (None, ToolStatus::Missing)
        }
        Some(ToolOutput::Failed(reason)) => {
            warn!(sample = %meta.sample_id, tool = tool.as_str(), reason = %reason, "Tool failed");
            (None, ToolStatus::Failed { reason })
        }
        Some(ToolOutput::TimedOut) => {
            warn!(sample = %meta.sample_id, tool = tool.as_str(), "Tool timed out");
            (None, ToolStatus::TimedOut)
        }
        Some(ToolOutput::Raw(text)) => match pipeline.run(tool, &text, meta, issues) {
            Ok(records) => {
                let status = ToolStatus::Merged { records: records.len() };
                (Some(records), status)
            }
            Err(e) => {
                let status = ToolStatus::Rejected { reason: e.to_string() };
                issues.record_for(tool, e);
                (None, status)
            }
        },
    }
}

fn finish(
    meta: &SampleMetadata,
    per_tool: BTreeMap<Predictor, Vec<PredictionRecord>>,
    tools: BTreeMap<Predictor, ToolStatus>,
    mut issues: IssueLog,
) -> std::result::Result<SampleOutcome, SampleFailure> {
    let merged = MergeEngine::merge(&per_tool, meta, &mut issues);
    issues.log_summary();

    match merged {
        Ok(table) => Ok(SampleOutcome {
            sample_id: meta.sample_id.clone(),
            table,
            tools,
            issues,
            table_path: None,
            report_path: None,
        }),
        Err(error) => Err(SampleFailure {
            sample_id: meta.sample_id.clone(),
            error,
            tools,
            issues,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
