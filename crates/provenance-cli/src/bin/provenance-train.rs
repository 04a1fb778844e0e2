//! provenance-train - Offline training from two labeled directories
//!
//! Usage: provenance-train --ai-dir <dir> --human-dir <dir> [--variant human|ai]

use anyhow::{Context, Result};
use clap::Parser;
use provenance_cli::output::print_json_training;
use provenance_core::{
    DatasetBuilder, FeatureExtractor, Label, ModelRegistry, ProvenanceConfig, Trainer, Variant,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "provenance-train")]
#[command(about = "Train a provenance classifier from AI and human audio directories", long_about = None)]
struct Args {
    /// Directory of AI-generated recordings (labeled synthetic)
    #[arg(long)]
    ai_dir: PathBuf,

    /// Directory of human-composed recordings
    #[arg(long)]
    human_dir: PathBuf,

    /// Classifier variant to train and overwrite
    #[arg(long, default_value = "human")]
    variant: Variant,

    /// TOML configuration file (built-in defaults when absent)
    #[arg(short, long, default_value = "provenance.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default: no logs (clean JSON output for parsing)
    let level = if args.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = ProvenanceConfig::load_or_default(&args.config)?;
    run_training(&config, &args.ai_dir, &args.human_dir, args.variant)
}

fn run_training(config: &ProvenanceConfig, ai_dir: &Path, human_dir: &Path, variant: Variant) -> Result<()> {
    for dir in [ai_dir, human_dir] {
        if !dir.is_dir() {
            anyhow::bail!("Directory not found: {}", dir.display());
        }
    }

    let builder = DatasetBuilder::new(FeatureExtractor::new(config.features.clone()));

    let start = std::time::Instant::now();
    let ai = builder
        .build(ai_dir, Label::Synthetic)
        .with_context(|| format!("Failed to scan {}", ai_dir.display()))?;
    let human = builder
        .build(human_dir, Label::Human)
        .with_context(|| format!("Failed to scan {}", human_dir.display()))?;

    log::info!(
        "Extracted {} AI and {} human examples in {:.2}s",
        ai.dataset.len(),
        human.dataset.len(),
        start.elapsed().as_secs_f64()
    );

    // AI examples first, then human
    let mut dataset = ai.dataset.clone();
    dataset.extend(human.dataset.clone())?;

    let registry = Arc::new(ModelRegistry::new(&config.storage.model_dir));
    let trainer = Trainer::new(config.training.clone(), registry);
    let report = trainer.train(&dataset, variant)?;

    log::info!(
        "Saved {} model to {} in {:.2}s",
        variant,
        report.model_path.display(),
        start.elapsed().as_secs_f64()
    );

    print_json_training(&report, &[ai, human]);
    Ok(())
}
