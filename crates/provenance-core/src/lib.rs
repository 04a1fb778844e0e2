//! Provenance Core - audio provenance classification
//!
//! Turns labeled audio into fixed-length acoustic feature vectors, trains a
//! binary classifier separating synthetic from human-composed recordings,
//! and classifies unseen clips against a persisted model variant.

pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod inference;
pub mod model;
pub mod registry;
pub mod training;

pub use config::{FeatureConfig, ProvenanceConfig, TrainingConfig};
pub use dataset::{Dataset, DatasetBuilder, DatasetScan, Label, SkippedFile};
pub use error::{Error, Result};
pub use features::{FeatureExtractor, FeatureVector};
pub use inference::{verdict_for_score, Classification, InferenceService, Verdict, DECISION_THRESHOLD};
pub use model::{ArchitectureConfig, AudioClassifier, Variant};
pub use registry::{ModelMetadata, ModelRegistry};
pub use training::{split_indices, EpochMetrics, Trainer, TrainingReport};

use std::path::Path;

/// Extract the feature vector of one audio file with the default layout
pub fn extract_features(path: &Path) -> Result<FeatureVector> {
    FeatureExtractor::default().extract_file(path)
}
