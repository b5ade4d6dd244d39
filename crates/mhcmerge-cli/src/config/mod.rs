//! Configuration resolution for the binary.
//! Reads the file given by `--config`, else the path in MHCMERGE_CONFIG, else
//! built-in defaults, then applies command-line overrides.

use std::path::Path;

use anyhow::{Context, Result};

use mhcmerge_common::config::{AggregationConfig, ThresholdConfig, CONFIG_ENV_VAR};

use crate::cli::OverrideArgs;

/// Where the base configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Flag(String),
    Env(String),
    Defaults,
}

pub fn base_config(explicit: Option<&Path>) -> Result<(AggregationConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = AggregationConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        return Ok((config, ConfigSource::Flag(path.display().to_string())));
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => {
            let config = AggregationConfig::load(&path)
                .with_context(|| format!("Failed to load config from {CONFIG_ENV_VAR}={path}"))?;
            Ok((config, ConfigSource::Env(path)))
        }
        _ => Ok((AggregationConfig::default(), ConfigSource::Defaults)),
    }
}

/// Apply command-line overrides. Explicit thresholds win over the recommended set.
pub fn apply_overrides(config: &mut AggregationConfig, overrides: &OverrideArgs) {
    if overrides.recommended_thresholds {
        let recommended = ThresholdConfig::recommended();
        for predictor in mhcmerge_common::entities::Predictor::ALL {
            if config.thresholds.for_tool(predictor).is_none() {
                config.thresholds.set(predictor, recommended.for_tool(predictor));
            }
        }
    }
    for (predictor, threshold) in &overrides.thresholds {
        config.thresholds.set(*predictor, Some(*threshold));
    }
    if let Some(format) = overrides.format {
        config.output.format = format;
    }
    if let Some(secs) = overrides.timeout_secs {
        config.execution.tool_timeout_secs = Some(secs);
    }
    if overrides.no_report {
        config.output.write_warning_report = false;
    }
}

pub fn resolve(explicit: Option<&Path>, overrides: &OverrideArgs) -> Result<AggregationConfig> {
    let (mut config, source) = base_config(explicit)?;
    tracing::debug!(source = ?source, "Resolved base configuration");
    apply_overrides(&mut config, overrides);
    config.validate().context("Invalid aggregation configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests;
