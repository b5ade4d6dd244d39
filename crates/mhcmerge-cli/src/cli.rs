use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use mhcmerge_common::config::TableFormat;
use mhcmerge_common::entities::{InputFileType, MhcClass, Predictor};

#[derive(Parser, Debug)]
#[command(name = "mhcmerge", version, about = "Merge MHC binding predictions into one table per sample", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubArgs,

    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "PATH",
        help = "Aggregation config (toml, yaml or json); falls back to MHCMERGE_CONFIG"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        help = "Log at debug level unless RUST_LOG is set"
    )]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum SubArgs {
    /// Aggregate the outputs of one sample
    #[command(name = "merge")]
    Merge {
        #[command(flatten)]
        args: MergeArgs,
    },
    /// Aggregate every sample listed in a manifest
    #[command(name = "batch")]
    Batch {
        #[command(flatten)]
        args: BatchArgs,
    },
    /// Print canonical forms of allele names
    #[command(name = "alleles")]
    Alleles {
        #[command(flatten)]
        args: AlleleArgs,
    },
}

/// Overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct OverrideArgs {
    #[arg(
        short = 'f',
        long = "format",
        value_name = "FORMAT",
        value_parser = parse_format,
        help = "Output table format: csv or tsv"
    )]
    pub format: Option<TableFormat>,

    #[arg(
        long = "threshold",
        value_name = "TOOL=VALUE",
        value_parser = parse_threshold,
        help = "Binder threshold for one tool, repeatable"
    )]
    pub thresholds: Vec<(Predictor, f64)>,

    #[arg(
        long = "recommended-thresholds",
        help = "Start from the recommended per-tool thresholds"
    )]
    pub recommended_thresholds: bool,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help = "Give up on a tool's output after this many seconds"
    )]
    pub timeout_secs: Option<u64>,

    #[arg(
        long = "no-report",
        help = "Do not write <sample>_warnings.json"
    )]
    pub no_report: bool,
}

#[derive(Debug, ClapArgs)]
pub struct MergeArgs {
    #[arg(
        short = 's',
        long = "sample-id",
        required = true,
        value_name = "ID",
        help = "Sample identifier"
    )]
    pub sample_id: String,

    #[arg(
        short = 'a',
        long = "alleles",
        required = true,
        value_name = "ALLELES",
        help = "Requested alleles, delimited by ';'"
    )]
    pub alleles: String,

    #[arg(
        short = 'm',
        long = "mhc-class",
        value_name = "CLASS",
        default_value = "I",
        value_parser = parse_class,
        help = "MHC class: I or II"
    )]
    pub mhc_class: MhcClass,

    #[arg(
        long = "file-type",
        value_name = "TYPE",
        default_value = "peptide",
        value_parser = parse_file_type,
        help = "Upstream input type: variant, peptide or protein"
    )]
    pub file_type: InputFileType,

    #[arg(
        short = 't',
        long = "tools",
        value_name = "TOOLS",
        value_delimiter = ',',
        num_args = 1..,
        value_parser = parse_predictor,
        help = "Requested tools delimited by comma; defaults to every tool given an output or failure"
    )]
    pub tools: Vec<Predictor>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "TOOL=PATH",
        value_parser = parse_output,
        help = "Raw output file of one tool, repeatable"
    )]
    pub outputs: Vec<(Predictor, PathBuf)>,

    #[arg(
        long = "failed",
        value_name = "TOOL=REASON",
        value_parser = parse_failure,
        help = "Tool that failed upstream, with the reason, repeatable"
    )]
    pub failed: Vec<(Predictor, String)>,

    #[arg(
        long = "source",
        value_name = "PATH",
        help = "Peptide source table whose columns are joined onto each row"
    )]
    pub source: Option<PathBuf>,

    #[arg(
        short = 'd',
        long = "out-dir",
        value_name = "DIR",
        default_value = ".",
        help = "Directory for the merged table and warning report"
    )]
    pub out_dir: PathBuf,

    #[arg(
        long = "table",
        value_name = "PATH",
        help = "Explicit path of the merged table"
    )]
    pub table: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Debug, ClapArgs)]
pub struct BatchArgs {
    #[arg(
        value_name = "MANIFEST",
        help = "Batch manifest (yaml or json)"
    )]
    pub manifest: PathBuf,

    #[arg(
        short = 'd',
        long = "out-dir",
        value_name = "DIR",
        help = "Output directory; overrides the manifest's output_dir"
    )]
    pub out_dir: Option<PathBuf>,

    #[arg(
        short = 'p',
        long = "parallel",
        value_name = "N",
        help = "Samples aggregated concurrently"
    )]
    pub parallel: Option<usize>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Debug, ClapArgs)]
pub struct AlleleArgs {
    #[arg(
        value_name = "ALLELE",
        required = true,
        num_args = 1..,
        help = "Allele names; ';'-delimited lists are split"
    )]
    pub alleles: Vec<String>,

    #[arg(
        short = 'm',
        long = "mhc-class",
        value_name = "CLASS",
        default_value = "I",
        value_parser = parse_class,
        help = "MHC class: I or II"
    )]
    pub mhc_class: MhcClass,
}

// ── Value parsers ────────────────────────────────────────────────────────────

fn parse_class(s: &str) -> Result<MhcClass, String> {
    s.parse()
}

fn parse_file_type(s: &str) -> Result<InputFileType, String> {
    s.parse()
}

fn parse_predictor(s: &str) -> Result<Predictor, String> {
    s.parse()
}

fn parse_format(s: &str) -> Result<TableFormat, String> {
    match s.trim().to_lowercase().as_str() {
        "csv" => Ok(TableFormat::Csv),
        "tsv" => Ok(TableFormat::Tsv),
        other => Err(format!("unknown table format '{other}' (expected csv or tsv)")),
    }
}

fn split_pair(s: &str) -> Result<(Predictor, &str), String> {
    let (tool, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TOOL=VALUE, got '{s}'"))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("missing value after '=' in '{s}'"));
    }
    Ok((tool.parse()?, value))
}

fn parse_output(s: &str) -> Result<(Predictor, PathBuf), String> {
    split_pair(s).map(|(tool, path)| (tool, PathBuf::from(path)))
}

fn parse_failure(s: &str) -> Result<(Predictor, String), String> {
    split_pair(s).map(|(tool, reason)| (tool, reason.to_string()))
}

fn parse_threshold(s: &str) -> Result<(Predictor, f64), String> {
    let (tool, value) = split_pair(s)?;
    let value: f64 = value
        .parse()
        .map_err(|_| format!("threshold for {tool} is not a number: '{value}'"))?;
    Ok((tool, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_merge_invocation() {
        let args = Args::try_parse_from([
            "mhcmerge",
            "merge",
            "--sample-id", "S1",
            "--alleles", "H2-Kb;H2-Db",
            "--output", "syfpeithi=s1/syf.tsv",
            "--output", "NetMHCpan=s1/net.xls",
            "--failed", "mhcflurry=exit status 137",
            "--threshold", "netmhcpan=500",
            "--format", "tsv",
        ])
        .unwrap();

        let SubArgs::Merge { args } = args.command else {
            panic!("expected merge");
        };
        assert_eq!(args.sample_id, "S1");
        assert_eq!(args.mhc_class, MhcClass::I);
        assert_eq!(args.outputs[1], (Predictor::Netmhcpan, PathBuf::from("s1/net.xls")));
        assert_eq!(args.failed[0], (Predictor::Mhcflurry, "exit status 137".to_string()));
        assert_eq!(args.overrides.thresholds, vec![(Predictor::Netmhcpan, 500.0)]);
        assert_eq!(args.overrides.format, Some(TableFormat::Tsv));
    }

    #[test]
    fn test_bad_pairs_rejected() {
        assert!(parse_output("syfpeithi").is_err());
        assert!(parse_output("syfpeithi=").is_err());
        assert!(parse_output("iedb=x.tsv").is_err());
        assert!(parse_threshold("netmhcpan=lots").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["mhcmerge", "alleles", "HLA-A0201", "-m", "I", "--verbose"]).unwrap();
        assert!(args.verbose);
    }
}
