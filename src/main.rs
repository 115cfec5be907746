//! Registry Analytics - batch analysis of enrolment and update CSV exports.

use anyhow::{Context, Result};
use clap::Parser;
use registry_analytics::config::{load_config, PipelineConfig};
use registry_analytics::pipeline;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "registry-analytics", version, about)]
struct Args {
    /// Directory holding one sub-directory of CSV files per category
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory receiving charts and JSON reports
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    let summary = pipeline::run(&config)?;

    println!("{}", summary.cleaning);
    if let Some(gini) = summary.state_gini {
        println!("Gini coefficient across states: {:.4}", gini);
    }
    info!(
        "Outputs written to {} ({} charts)",
        config.output_dir.display(),
        summary.charts.len()
    );
    Ok(())
}
