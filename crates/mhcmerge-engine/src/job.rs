//! Sample jobs and batch manifests.
//!
//! A manifest lists samples together with where each requested tool left
//! its output, or why it produced none:
//!
//! ```yaml
//! output_dir: results
//! samples:
//!   - sample_id: S1
//!     alleles: [H2-Kb]
//!     mhc_class: I
//!     tools: [syfpeithi, netmhcpan, mhcflurry]
//!     outputs:
//!       syfpeithi: s1/syfpeithi.tsv
//!       netmhcpan: s1/netmhcpan.xls
//!     failed:
//!       mhcflurry: "container exited with status 137"
//!     source: s1/peptides.tsv
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mhcmerge_common::config::TableFormat;
use mhcmerge_common::entities::{Predictor, SampleMetadata};
use mhcmerge_common::error::{MhcMergeError, Result};

/// Everything needed to aggregate one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleJob {
    #[serde(flatten)]
    pub meta: SampleMetadata,

    /// Raw output file per tool
    #[serde(default)]
    pub outputs: BTreeMap<Predictor, PathBuf>,

    /// Tools known to have failed upstream, with the reason
    #[serde(default)]
    pub failed: BTreeMap<Predictor, String>,

    /// Peptide source table for annotation
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Explicit output path; defaults to `<output_dir>/<sample_id>_predictions.<ext>`
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl SampleJob {
    pub fn new(meta: SampleMetadata) -> Self {
        Self {
            meta,
            outputs: BTreeMap::new(),
            failed: BTreeMap::new(),
            source: None,
            output: None,
        }
    }

    pub fn with_output(mut self, tool: Predictor, path: impl Into<PathBuf>) -> Self {
        self.outputs.insert(tool, path.into());
        self
    }

    pub fn with_failure(mut self, tool: Predictor, reason: impl Into<String>) -> Self {
        self.failed.insert(tool, reason.into());
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn with_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn sample_id(&self) -> &str {
        &self.meta.sample_id
    }

    /// Path of the merged table.
    pub fn table_path(&self, output_dir: &Path, format: TableFormat) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            output_dir.join(format!("{}_predictions.{}", self.meta.sample_id, format.extension()))
        })
    }

    /// Path of the warning report, next to the table.
    pub fn report_path(&self, output_dir: &Path, format: TableFormat) -> PathBuf {
        let table = self.table_path(output_dir, format);
        let dir = table.parent().map(Path::to_path_buf).unwrap_or_default();
        dir.join(format!("{}_warnings.json", self.meta.sample_id))
    }

    fn resolve_against(&mut self, base: &Path) {
        for path in self.outputs.values_mut() {
            *path = resolve(base, path);
        }
        if let Some(p) = self.source.as_mut() {
            *p = resolve(base, p);
        }
        if let Some(p) = self.output.as_mut() {
            *p = resolve(base, p);
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub samples: Vec<SampleJob>,
}

impl BatchManifest {
    /// Load a YAML or JSON manifest and resolve its relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut manifest: Self = match ext.as_str() {
            "json" => serde_json::from_str(&content).map_err(|e| MhcMergeError::Config(e.to_string()))?,
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| MhcMergeError::Config(e.to_string()))?,
            other => {
                return Err(MhcMergeError::Config(format!(
                    "unsupported manifest extension '{other}' for {}",
                    path.display()
                )))
            }
        };

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for job in &mut manifest.samples {
            job.resolve_against(&base);
        }
        if let Some(dir) = manifest.output_dir.as_mut() {
            *dir = resolve(&base, dir);
        }

        let mut seen = std::collections::BTreeSet::new();
        for job in &manifest.samples {
            if !seen.insert(job.sample_id()) {
                return Err(MhcMergeError::Config(format!(
                    "sample '{}' appears more than once in {}",
                    job.sample_id(),
                    path.display()
                )));
            }
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhcmerge_common::entities::MhcClass;
    use mhcmerge_test_utils::{temp_dir, write_fixture};

    const MANIFEST: &str = "output_dir: out\n\
                            samples:\n\
                            \x20 - sample_id: S1\n\
                            \x20   alleles: [H2-Kb]\n\
                            \x20   mhc_class: I\n\
                            \x20   tools: [syfpeithi, netmhcpan]\n\
                            \x20   outputs:\n\
                            \x20     syfpeithi: s1/syfpeithi.tsv\n\
                            \x20   failed:\n\
                            \x20     netmhcpan: license expired\n";

    #[test]
    fn test_load_yaml_manifest() {
        let dir = temp_dir();
        let path = write_fixture(dir.path(), "batch.yaml", MANIFEST);
        let manifest = BatchManifest::load(&path).unwrap();

        assert_eq!(manifest.output_dir, Some(dir.path().join("out")));
        let job = &manifest.samples[0];
        assert_eq!(job.meta.mhc_class, MhcClass::I);
        assert_eq!(job.meta.tools.len(), 2);
        assert_eq!(job.outputs[&Predictor::Syfpeithi], dir.path().join("s1/syfpeithi.tsv"));
        assert_eq!(job.failed[&Predictor::Netmhcpan], "license expired");
    }

    #[test]
    fn test_manifest_with_samplesheet_allele_string() {
        let dir = temp_dir();
        let yaml = "samples:\n\
                    \x20 - sample_id: S1\n\
                    \x20   alleles: \"H2-Kb;H2-Db\"\n\
                    \x20   mhc_class: I\n\
                    \x20   tools: [syfpeithi]\n";
        let path = write_fixture(dir.path(), "batch.yml", yaml);
        let manifest = BatchManifest::load(&path).unwrap();
        assert_eq!(manifest.samples[0].meta.alleles, vec!["H2-Kb".to_string(), "H2-Db".to_string()]);
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let dir = temp_dir();
        let json = r#"{"samples": [
            {"sample_id": "S1", "alleles": [], "mhc_class": "I", "tools": []},
            {"sample_id": "S1", "alleles": [], "mhc_class": "I", "tools": []}
        ]}"#;
        let path = write_fixture(dir.path(), "batch.json", json);
        assert!(matches!(BatchManifest::load(&path), Err(MhcMergeError::Config(_))));
    }

    #[test]
    fn test_default_paths() {
        let meta = mhcmerge_test_utils::s1_metadata();
        let job = SampleJob::new(meta);
        let out = Path::new("/tmp/results");
        assert_eq!(job.table_path(out, TableFormat::Tsv), out.join("S1_predictions.tsv"));
        assert_eq!(job.report_path(out, TableFormat::Csv), out.join("S1_warnings.json"));
    }
}
