//! Shared fixtures for mhcmerge tests.
//!
//! Raw tool outputs mirror what each predictor actually writes, trimmed to
//! a handful of rows.

use std::path::{Path, PathBuf};

use mhcmerge_common::config::{AggregationConfig, ThresholdConfig};
use mhcmerge_common::entities::{InputFileType, MhcClass, Predictor, SampleMetadata};

pub use pretty_assertions;

pub mod fixtures {
    /// SIINFEKL / H2-Kb scored 42 (half-max %), tool verdict column present.
    pub const SYFPEITHI_S1: &str = "sequence\tH2-Kb\tH2-Kb_binder\n\
                                    SIINFEKL\t42.0\tFalse\n";

    /// SIINFEKL / H-2-Kb at 120 nM in NetMHCpan `-xls` layout.
    pub const NETMHCPAN_S1: &str = "\t\tH-2-Kb\t\t\n\
                                    Pos\tPeptide\tnM\tRank\tNB\n\
                                    0\tSIINFEKL\t120\t0.4\t1\n";

    /// Two alleles, three peptides, one empty cell.
    pub const SYFPEITHI_CLASS_I: &str = "sequence\tHLA-A*02:01\tHLA-A*02:01_binder\tHLA-B*07:02\tHLA-B*07:02_binder\n\
                                         SIINFEKL\t42\tFalse\t12\tFalse\n\
                                         GILGFVFTL\t80\tTrue\t\tFalse\n\
                                         NLVPMVATV\t64\tTrue\t20\tFalse\n";

    /// MHCflurry long CSV matching `SYFPEITHI_CLASS_I` plus one extra peptide.
    pub const MHCFLURRY_CLASS_I: &str = "peptide,allele,mhcflurry_affinity,mhcflurry_affinity_percentile,mhcflurry_processing_score,mhcflurry_presentation_score,mhcflurry_presentation_percentile\n\
                                         SIINFEKL,HLA-A*02:01,5400.1,8.1,0.2,0.1,12.5\n\
                                         GILGFVFTL,HLA-A*02:01,12.2,0.05,0.9,0.98,0.01\n\
                                         GILGFVFTL,HLA-B*07:02,20000.0,40.2,0.9,0.01,55.0\n\
                                         KLVALGINAV,HLA-A*02:01,30.4,0.2,0.6,0.9,0.3\n";

    /// MHCnuggets long CSV for class I.
    pub const MHCNUGGETS_CLASS_I: &str = "peptide,ic50,human_proteome_rank,allele\n\
                                          SIINFEKL,4100.2,0.5,HLA-A02:01\n\
                                          NLVPMVATV,150.0,0.02,HLA-A02:01\n";

    /// NetMHCIIpan `-xls` with one class II allele.
    pub const NETMHCIIPAN_CLASS_II: &str = "\t\t\t\t\tDRB1_0101\t\t\t\t\t\n\
                                            Pos\tPeptide\tID\tTarget\tCore\tInverted\tScore\tRank\tScore_BA\tnM\tRank_BA\n\
                                            1\tPKYVKQNTLKLAT\tSeq\tNA\tYVKQNTLKL\t0\t0.6\t3.5\t0.5\t200\t8.0\n\
                                            2\tAAAGAEAGKATTEEQ\tSeq\tNA\tAGAEAGKAT\t0\t0.1\t45.0\t0.1\t9000\t60.0\n";

    /// Peptide source table used for annotation.
    pub const SOURCE_CLASS_I: &str = "sequence\tprotein\tscore\n\
                                      SIINFEKL\tOVAL_CHICK\t0.9\n\
                                      GILGFVFTL\tMATRX_I34A1\t0.7\n\
                                      NLVPMVATV\tPP65_HCMVA\t0.5\n";
}

/// Scenario S1: class I mouse sample run through SYFPEITHI and NetMHCpan.
pub fn s1_metadata() -> SampleMetadata {
    SampleMetadata::new(
        "S1",
        "H2-Kb",
        MhcClass::I,
        InputFileType::Peptide,
        [Predictor::Syfpeithi, Predictor::Netmhcpan],
    )
}

/// Thresholds for S1: SYFPEITHI 50, NetMHCpan 500 nM.
pub fn s1_config() -> AggregationConfig {
    let mut config = AggregationConfig::default();
    config.thresholds.set(Predictor::Syfpeithi, Some(50.0));
    config.thresholds.set(Predictor::Netmhcpan, Some(500.0));
    config
}

/// Class I human sample with the given tools.
pub fn class_i_metadata(sample_id: &str, tools: impl IntoIterator<Item = Predictor>) -> SampleMetadata {
    SampleMetadata::new(
        sample_id,
        "HLA-A*02:01;HLA-B*07:02",
        MhcClass::I,
        InputFileType::Peptide,
        tools,
    )
}

/// Class II human sample with the given tools.
pub fn class_ii_metadata(sample_id: &str, tools: impl IntoIterator<Item = Predictor>) -> SampleMetadata {
    SampleMetadata::new(
        sample_id,
        "HLA-DRB1*01:01",
        MhcClass::II,
        InputFileType::Peptide,
        tools,
    )
}

/// Default configuration with the commonly used cutoffs.
pub fn recommended_config() -> AggregationConfig {
    AggregationConfig {
        thresholds: ThresholdConfig::recommended(),
        ..AggregationConfig::default()
    }
}

/// Write `content` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

/// Fresh temporary directory for filesystem tests.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp dir")
}
