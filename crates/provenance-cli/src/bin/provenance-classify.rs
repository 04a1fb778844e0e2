//! provenance-classify - Classify one local recording
//!
//! Usage: provenance-classify <input_audio_path> [--variant human|ai]

use anyhow::Result;
use clap::Parser;
use provenance_cli::output::print_json_classification;
use provenance_core::{FeatureExtractor, InferenceService, ModelRegistry, ProvenanceConfig, Variant};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "provenance-classify")]
#[command(about = "Classify an audio file as AI-generated or human-composed", long_about = None)]
struct Args {
    /// Input audio file path
    input_audio_path: PathBuf,

    /// Classifier variant to consult
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

    let level = if args.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if !args.input_audio_path.is_file() {
        anyhow::bail!("Input file not found: {}", args.input_audio_path.display());
    }

    let config = ProvenanceConfig::load_or_default(&args.config)?;
    let service = InferenceService::new(
        FeatureExtractor::new(config.features.clone()),
        Arc::new(ModelRegistry::new(&config.storage.model_dir)),
    );

    let classification = service.classify_file(&args.input_audio_path, args.variant)?;
    log::info!(
        "{}: score {:.4} -> {}",
        args.input_audio_path.display(),
        classification.score,
        classification.verdict.display_label()
    );

    print_json_classification(&args.input_audio_path, args.variant, &classification);
    Ok(())
}
