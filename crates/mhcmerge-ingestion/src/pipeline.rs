//! Per-tool normalisation pipeline.
//!
//! Turns one tool's raw output for one sample into classified records:
//!   1. Check the tool can score the sample's MHC class
//!   2. Parse the tool's dialect, normalising alleles
//!   3. Drop peptides outside the class's length bounds
//!   4. Attach binder verdicts from the tool's threshold
//!   5. Log records for alleles the sample did not request

use std::collections::{BTreeSet, HashSet};

use tracing::{info, instrument, warn};

use mhcmerge_common::config::AggregationConfig;
use mhcmerge_common::entities::{PredictionRecord, Predictor, SampleMetadata};
use mhcmerge_common::error::Result;
use mhcmerge_common::issues::IssueLog;

use crate::filter::{length, threshold};
use crate::normalise::AlleleNormaliser;
use crate::parsers::parse_output;

pub use crate::parsers::ensure_supported;

pub struct ToolPipeline {
    config: AggregationConfig,
    normaliser: AlleleNormaliser,
}

impl ToolPipeline {
    /// The configuration is expected to be validated already.
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            config,
            normaliser: AlleleNormaliser::new(),
        }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn normaliser(&self) -> &AlleleNormaliser {
        &self.normaliser
    }

    /// Normalise one tool's raw output for one sample.
    ///
    /// Fails with `UnsupportedMhcClass` before parsing, or with
    /// `MalformedRecord` when the output's header is unusable. Row-level
    /// problems land in `issues`.
    #[instrument(skip(self, raw, meta, issues), fields(sample = %meta.sample_id, tool = %predictor))]
    pub fn run(
        &self,
        predictor: Predictor,
        raw: &str,
        meta: &SampleMetadata,
        issues: &mut IssueLog,
    ) -> Result<Vec<PredictionRecord>> {
        let parsed = parse_output(predictor, raw, meta, &self.normaliser, issues)?;
        let parsed_count = parsed.len();

        let bounds = self.config.lengths.for_class(meta.mhc_class);
        let kept = length::filter_bounds(parsed, bounds);
        let records = threshold::classify_all(kept, self.config.thresholds.for_tool(predictor));

        self.log_unrequested_alleles(predictor, &records, meta);

        info!(
            parsed = parsed_count,
            kept = records.len(),
            min_length = bounds.min,
            max_length = bounds.max,
            "Normalised tool output"
        );
        Ok(records)
    }

    /// Records for alleles outside the sample's list are kept; they are only logged.
    fn log_unrequested_alleles(&self, predictor: Predictor, records: &[PredictionRecord], meta: &SampleMetadata) {
        let (requested, _) = self.normaliser.normalise_all(&meta.alleles, meta.mhc_class);
        if requested.is_empty() {
            return;
        }
        let requested: HashSet<&str> = requested.iter().map(|a| a.canonical.as_str()).collect();

        let unexpected: BTreeSet<&str> = records
            .iter()
            .map(|r| r.allele.canonical.as_str())
            .filter(|a| !requested.contains(a))
            .collect();
        for allele in unexpected {
            warn!(
                sample = %meta.sample_id,
                tool = predictor.as_str(),
                allele,
                "Tool reported an allele the sample did not request"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhcmerge_common::config::LengthBounds;
    use mhcmerge_common::entities::{InputFileType, MhcClass};
    use mhcmerge_common::error::ErrorKind;
    use mhcmerge_test_utils::{fixtures, s1_config, s1_metadata};

    #[test]
    fn test_s1_verdicts() {
        let pipeline = ToolPipeline::new(s1_config());
        let meta = s1_metadata();
        let mut log = IssueLog::new(&meta.sample_id);

        let syf = pipeline.run(Predictor::Syfpeithi, fixtures::SYFPEITHI_S1, &meta, &mut log).unwrap();
        assert_eq!(syf.len(), 1);
        assert_eq!(syf[0].allele.canonical, "H2-Kb");
        assert_eq!(syf[0].score, 42.0);
        assert_eq!(syf[0].is_binder, Some(false));

        let net = pipeline.run(Predictor::Netmhcpan, fixtures::NETMHCPAN_S1, &meta, &mut log).unwrap();
        assert_eq!(net.len(), 1);
        assert_eq!(net[0].score, 120.0);
        assert_eq!(net[0].is_binder, Some(true));
        assert!(log.is_empty());
    }

    #[test]
    fn test_length_bounds_applied_per_class() {
        let mut config = s1_config();
        config.lengths.class_i = LengthBounds::new(9, 11);
        let pipeline = ToolPipeline::new(config);
        let meta = s1_metadata();
        let mut log = IssueLog::new(&meta.sample_id);

        // SIINFEKL is an 8-mer
        let records = pipeline.run(Predictor::Syfpeithi, fixtures::SYFPEITHI_S1, &meta, &mut log).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_unset_threshold_leaves_verdict_null() {
        let pipeline = ToolPipeline::new(AggregationConfig::default());
        let meta = s1_metadata();
        let mut log = IssueLog::new(&meta.sample_id);
        let records = pipeline.run(Predictor::Netmhcpan, fixtures::NETMHCPAN_S1, &meta, &mut log).unwrap();
        assert_eq!(records[0].is_binder, None);
    }

    #[test]
    fn test_unsupported_class() {
        let pipeline = ToolPipeline::new(AggregationConfig::default());
        let meta = SampleMetadata::new("S2", "DRB1*01:01", MhcClass::II, InputFileType::Peptide, [Predictor::Netmhcpan]);
        let mut log = IssueLog::new("S2");
        let err = pipeline.run(Predictor::Netmhcpan, fixtures::NETMHCPAN_S1, &meta, &mut log).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedMhcClass);
        assert!(ensure_supported(Predictor::Netmhciipan, &meta).is_ok());
    }
}
