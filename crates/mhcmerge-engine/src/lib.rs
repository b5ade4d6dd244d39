//! mhcmerge-engine: Per-sample aggregation of normalised predictions.
//! - Outer join of every requested tool's records on (peptide, allele)
//! - Canonical table output with atomic writes
//! - Peptide source annotation
//! - Per-sample warning reports
//! - Concurrent per-tool loading and batch processing

pub mod aggregator;
pub mod annotate;
pub mod job;
pub mod merge;
pub mod report;
pub mod writer;

pub use aggregator::{SampleAggregator, SampleFailure, SampleOutcome, ToolOutput, ToolStatus};
pub use job::{BatchManifest, SampleJob};
pub use merge::{MergeEngine, MergedTable};
pub use writer::TableWriter;
