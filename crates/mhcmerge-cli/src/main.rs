//! mhcmerge: merges MHC binding predictions from several tools into one
//! canonical table per sample.
//! Entry point for the command-line binary.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Args, SubArgs};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let default_level = if args.verbose { "mhcmerge=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.as_deref();
    let all_ok = match args.command {
        SubArgs::Merge { args } => commands::merge(args, config_path).await?,
        SubArgs::Batch { args } => commands::batch(args, config_path).await?,
        SubArgs::Alleles { args } => commands::alleles(args)?,
    };

    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
