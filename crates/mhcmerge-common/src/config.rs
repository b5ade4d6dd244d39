//! Aggregation configuration.
//!
//! Length bounds and per-tool thresholds used to live in process-wide
//! pipeline parameters. Here they form one structure that is loaded from
//! TOML, YAML or JSON and validated once before any sample is processed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entities::{MhcClass, Predictor};
use crate::error::{MhcMergeError, Result};

/// Environment variable naming the default configuration file.
pub const CONFIG_ENV_VAR: &str = "MHCMERGE_CONFIG";

/// Complete aggregation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Peptide length bounds per MHC class
    #[serde(default)]
    pub lengths: LengthConfig,

    /// Binder thresholds per tool
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Output options
    #[serde(default)]
    pub output: OutputConfig,

    /// Execution options
    #[serde(default)]
    pub execution: ExecutionConfig,
}

// ── Length bounds ────────────────────────────────────────────────────────────

/// Inclusive peptide length range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthBounds {
    pub min: usize,
    pub max: usize,
}

impl LengthBounds {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, length: usize) -> bool {
        self.min <= length && length <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthConfig {
    #[serde(default = "default_class_i_lengths")]
    pub class_i: LengthBounds,

    #[serde(default = "default_class_ii_lengths")]
    pub class_ii: LengthBounds,
}

fn default_class_i_lengths()  -> LengthBounds { LengthBounds::new(8, 14) }
fn default_class_ii_lengths() -> LengthBounds { LengthBounds::new(12, 25) }

impl Default for LengthConfig {
    fn default() -> Self {
        Self {
            class_i: default_class_i_lengths(),
            class_ii: default_class_ii_lengths(),
        }
    }
}

impl LengthConfig {
    pub fn for_class(&self, class: MhcClass) -> LengthBounds {
        match class {
            MhcClass::I  => self.class_i,
            MhcClass::II => self.class_ii,
        }
    }
}

// ── Thresholds ───────────────────────────────────────────────────────────────

/// Per-tool binder thresholds. An unset threshold yields no verdict.
///
/// Units follow each tool's score type: syfpeithi half-max score,
/// mhcflurry percentile, mhcnuggets nM, netmhcpan nM, netmhciipan percentile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub syfpeithi: Option<f64>,
    #[serde(default)]
    pub mhcflurry: Option<f64>,
    #[serde(default)]
    pub mhcnuggets: Option<f64>,
    #[serde(default)]
    pub netmhcpan: Option<f64>,
    #[serde(default)]
    pub netmhciipan: Option<f64>,
}

impl ThresholdConfig {
    /// Cutoffs commonly used with each tool.
    pub fn recommended() -> Self {
        Self {
            syfpeithi: Some(50.0),
            mhcflurry: Some(2.0),
            mhcnuggets: Some(500.0),
            netmhcpan: Some(500.0),
            netmhciipan: Some(5.0),
        }
    }

    pub fn for_tool(&self, predictor: Predictor) -> Option<f64> {
        match predictor {
            Predictor::Syfpeithi   => self.syfpeithi,
            Predictor::Mhcflurry   => self.mhcflurry,
            Predictor::Mhcnuggets  => self.mhcnuggets,
            Predictor::Netmhcpan   => self.netmhcpan,
            Predictor::Netmhciipan => self.netmhciipan,
        }
    }

    pub fn set(&mut self, predictor: Predictor, threshold: Option<f64>) {
        let slot = match predictor {
            Predictor::Syfpeithi   => &mut self.syfpeithi,
            Predictor::Mhcflurry   => &mut self.mhcflurry,
            Predictor::Mhcnuggets  => &mut self.mhcnuggets,
            Predictor::Netmhcpan   => &mut self.netmhcpan,
            Predictor::Netmhciipan => &mut self.netmhciipan,
        };
        *slot = threshold;
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Csv,
    Tsv,
}

impl TableFormat {
    pub fn delimiter(&self) -> u8 {
        match self {
            TableFormat::Csv => b',',
            TableFormat::Tsv => b'\t',
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Tsv => "tsv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: TableFormat,

    /// Write `<sample>_warnings.json` next to each table
    #[serde(default = "default_true")]
    pub write_warning_report: bool,
}

fn default_true() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: TableFormat::default(),
            write_warning_report: true,
        }
    }
}

// ── Execution ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Samples aggregated concurrently in batch mode
    #[serde(default = "default_parallel_samples")]
    pub parallel_samples: usize,

    /// Give up on a tool's output after this many seconds
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

fn default_parallel_samples() -> usize { 4 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel_samples: default_parallel_samples(),
            tool_timeout_secs: None,
        }
    }
}

// ── Loading and validation ───────────────────────────────────────────────────

impl AggregationConfig {
    /// Load from a file, choosing the format by extension (toml, yaml/yml, json).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let config: Self = match ext.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| MhcMergeError::Config(e.to_string()))?,
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| MhcMergeError::Config(e.to_string()))?,
            "json" => serde_json::from_str(&content).map_err(|e| MhcMergeError::Config(e.to_string()))?,
            other => {
                return Err(MhcMergeError::Config(format!(
                    "unsupported config extension '{other}' for {}",
                    path.display()
                )))
            }
        };
        tracing::debug!(path = %path.display(), "Loaded aggregation config");
        Ok(config)
    }

    /// Load from `MHCMERGE_CONFIG` if set, else fall back to defaults.
    pub fn from_env_or_default() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Check bounds and thresholds. Called once at engine construction.
    pub fn validate(&self) -> Result<()> {
        for (class, bounds) in [(MhcClass::I, self.lengths.class_i), (MhcClass::II, self.lengths.class_ii)] {
            if bounds.min == 0 {
                return Err(MhcMergeError::Config(format!(
                    "class {class} minimum peptide length must be at least 1"
                )));
            }
            if bounds.min > bounds.max {
                return Err(MhcMergeError::Config(format!(
                    "class {class} peptide length bounds are inverted ({} > {})",
                    bounds.min, bounds.max
                )));
            }
        }

        for predictor in Predictor::ALL {
            if let Some(t) = self.thresholds.for_tool(predictor) {
                if !t.is_finite() || t < 0.0 {
                    return Err(MhcMergeError::Config(format!(
                        "{predictor} threshold must be a non-negative number, got {t}"
                    )));
                }
            }
        }

        if self.execution.parallel_samples == 0 {
            return Err(MhcMergeError::Config("execution.parallel_samples must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
