//! JSON output formatting

use provenance_core::{Classification, DatasetScan, SkippedFile, TrainingReport, Variant};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ClassifyOutput {
    input_file: String,
    variant: Variant,
    result: &'static str,
    label: &'static str,
    score: f32,
}

#[derive(Serialize)]
struct TrainOutput<'a> {
    status: &'static str,
    report: &'a TrainingReport,
    samples: usize,
    skipped: Vec<&'a SkippedFile>,
}

fn print_pretty<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Print a single classification as JSON
pub fn print_json_classification(input: &Path, variant: Variant, classification: &Classification) {
    print_pretty(&ClassifyOutput {
        input_file: input.display().to_string(),
        variant,
        result: classification.verdict.as_str(),
        label: classification.verdict.display_label(),
        score: classification.score,
    });
}

/// Print a training run, listing every file the scans had to skip
pub fn print_json_training(report: &TrainingReport, scans: &[DatasetScan]) {
    let skipped = scans
        .iter()
        .flat_map(|scan| scan.skipped.iter())
        .collect();

    print_pretty(&TrainOutput {
        status: "success",
        report,
        samples: scans.iter().map(|scan| scan.dataset.len()).sum(),
        skipped,
    });
}
