#[cfg(test)]
mod tests {
    use super::super::*;
    use mhcmerge_common::config::TableFormat;
    use mhcmerge_common::entities::Predictor;
    use mhcmerge_test_utils::{temp_dir, write_fixture};

    #[test]
    fn test_explicit_file_wins() {
        let dir = temp_dir();
        let path = write_fixture(dir.path(), "mhcmerge.toml", "[thresholds]\nsyfpeithi = 40.0\n");
        let (config, source) = base_config(Some(&path)).unwrap();
        assert_eq!(config.thresholds.syfpeithi, Some(40.0));
        assert!(matches!(source, ConfigSource::Flag(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = temp_dir();
        let err = base_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_explicit_threshold_beats_recommended() {
        let mut config = AggregationConfig::default();
        config.thresholds.mhcflurry = Some(1.0);
        let overrides = OverrideArgs {
            recommended_thresholds: true,
            thresholds: vec![(Predictor::Netmhcpan, 250.0)],
            format: Some(TableFormat::Tsv),
            timeout_secs: Some(30),
            no_report: true,
        };
        apply_overrides(&mut config, &overrides);

        assert_eq!(config.thresholds.netmhcpan, Some(250.0));
        // configured value is kept, unset ones are filled in
        assert_eq!(config.thresholds.mhcflurry, Some(1.0));
        assert_eq!(config.thresholds.netmhciipan, Some(5.0));
        assert_eq!(config.output.format, TableFormat::Tsv);
        assert_eq!(config.execution.tool_timeout_secs, Some(30));
        assert!(!config.output.write_warning_report);
    }

    #[test]
    fn test_negative_override_fails_validation() {
        let dir = temp_dir();
        let path = write_fixture(dir.path(), "mhcmerge.yaml", "output:\n  format: csv\n");
        let overrides = OverrideArgs {
            thresholds: vec![(Predictor::Syfpeithi, -3.0)],
            ..OverrideArgs::default()
        };
        assert!(resolve(Some(&path), &overrides).is_err());
    }
}
