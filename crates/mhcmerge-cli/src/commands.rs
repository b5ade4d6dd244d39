//! Subcommand handlers. Each returns whether every sample succeeded.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use mhcmerge_common::entities::{split_allele_list, Predictor, SampleMetadata};
use mhcmerge_engine::{BatchManifest, SampleAggregator, SampleFailure, SampleJob, SampleOutcome};
use mhcmerge_ingestion::AlleleNormaliser;

use crate::cli::{AlleleArgs, BatchArgs, MergeArgs};
use crate::config;

pub async fn merge(args: MergeArgs, config_path: Option<&Path>) -> Result<bool> {
    let config = config::resolve(config_path, &args.overrides)?;
    let job = merge_job(&args)?;
    let aggregator = SampleAggregator::new(config).context("Failed to build aggregator")?;

    let result = aggregator.run(&job, &args.out_dir).await;
    Ok(report(&result))
}

pub async fn batch(args: BatchArgs, config_path: Option<&Path>) -> Result<bool> {
    let mut config = config::resolve(config_path, &args.overrides)?;
    if let Some(n) = args.parallel {
        config.execution.parallel_samples = n;
    }
    let manifest = BatchManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let out_dir = args
        .out_dir
        .or(manifest.output_dir.clone())
        .unwrap_or_else(|| Path::new(".").to_path_buf());

    let aggregator = SampleAggregator::new(config).context("Failed to build aggregator")?;
    let results = aggregator.run_batch(&manifest.samples, &out_dir).await;

    let mut failed = 0usize;
    for result in &results {
        if !report(result) {
            failed += 1;
        }
    }
    info!(samples = results.len(), failed, "Batch finished");
    Ok(failed == 0)
}

pub fn alleles(args: AlleleArgs) -> Result<bool> {
    let normaliser = AlleleNormaliser::new();
    let raws: Vec<String> = args.alleles.iter().flat_map(|a| split_allele_list(a)).collect();

    let mut all_ok = true;
    for raw in &raws {
        match normaliser.canonical(raw, args.mhc_class) {
            Ok(canonical) => println!("{raw}\t{canonical}"),
            Err(e) => {
                all_ok = false;
                eprintln!("{raw}\t{e}");
            }
        }
    }
    Ok(all_ok)
}

/// Build the single-sample job from command-line arguments.
fn merge_job(args: &MergeArgs) -> Result<SampleJob> {
    let mut tools: BTreeSet<Predictor> = args.tools.iter().copied().collect();
    if tools.is_empty() {
        tools.extend(args.outputs.iter().map(|(tool, _)| *tool));
        tools.extend(args.failed.iter().map(|(tool, _)| *tool));
    }
    if tools.is_empty() {
        bail!("no tools requested: pass --tools, --output or --failed");
    }

    let meta = SampleMetadata::new(&args.sample_id, &args.alleles, args.mhc_class, args.file_type, tools);
    let mut job = SampleJob::new(meta);
    for (tool, path) in &args.outputs {
        job = job.with_output(*tool, path);
    }
    for (tool, reason) in &args.failed {
        job = job.with_failure(*tool, reason.clone());
    }
    if let Some(source) = &args.source {
        job = job.with_source(source);
    }
    if let Some(table) = &args.table {
        job = job.with_table_path(table);
    }
    Ok(job)
}

/// Log one sample's result; returns whether it succeeded.
fn report(result: &std::result::Result<SampleOutcome, SampleFailure>) -> bool {
    match result {
        Ok(outcome) => {
            let path = outcome
                .table_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            info!(
                sample = %outcome.sample_id,
                rows = outcome.table.len(),
                warnings = outcome.issues.len(),
                table = %path,
                "Sample merged"
            );
            for (tool, status) in &outcome.tools {
                info!(sample = %outcome.sample_id, tool = %tool, status = %status, "Tool status");
            }
            true
        }
        Err(failure) => {
            error!(
                sample = %failure.sample_id,
                kind = failure.kind().as_str(),
                error = %failure.error,
                "Sample failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mhcmerge_common::entities::MhcClass;
    use mhcmerge_test_utils::{fixtures, temp_dir, write_fixture};
    use pretty_assertions::assert_eq;

    use crate::cli::{Args, SubArgs};

    fn merge_args(argv: &[&str]) -> MergeArgs {
        let mut full = vec!["mhcmerge", "merge"];
        full.extend_from_slice(argv);
        match Args::try_parse_from(full).unwrap().command {
            SubArgs::Merge { args } => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tools_default_to_given_outputs() {
        let args = merge_args(&[
            "-s", "S1", "-a", "H2-Kb",
            "-o", "netmhcpan=net.xls",
            "--failed", "syfpeithi=crashed",
        ]);
        let job = merge_job(&args).unwrap();
        assert_eq!(
            job.meta.tools.iter().copied().collect::<Vec<_>>(),
            vec![Predictor::Syfpeithi, Predictor::Netmhcpan]
        );
        assert_eq!(job.meta.alleles, vec!["H2-Kb".to_string()]);
        assert_eq!(job.meta.mhc_class, MhcClass::I);
    }

    #[test]
    fn test_no_tools_is_an_error() {
        let args = merge_args(&["-s", "S1", "-a", "H2-Kb"]);
        assert!(merge_job(&args).is_err());
    }

    #[tokio::test]
    async fn test_merge_command_writes_table() {
        let dir = temp_dir();
        let syf = write_fixture(dir.path(), "syf.tsv", fixtures::SYFPEITHI_S1);
        let net = write_fixture(dir.path(), "net.xls", fixtures::NETMHCPAN_S1);
        let out = dir.path().to_str().unwrap().to_string();
        let syf_arg = format!("syfpeithi={}", syf.display());
        let net_arg = format!("netmhcpan={}", net.display());

        let args = merge_args(&[
            "-s", "S1", "-a", "H-2-Kb",
            "-o", &syf_arg,
            "-o", &net_arg,
            "--threshold", "syfpeithi=50",
            "--threshold", "netmhcpan=500",
            "-d", &out,
        ]);
        assert!(merge(args, None).await.unwrap());

        let table = std::fs::read_to_string(dir.path().join("S1_predictions.csv")).unwrap();
        assert_eq!(table.lines().nth(1), Some("SIINFEKL,H2-Kb,42,false,120,true"));
    }
}
