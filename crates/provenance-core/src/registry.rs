//! Per-variant model artifacts on disk and the locks guarding them
//!
//! Each variant owns two guards. The training mutex serializes whole
//! training runs for that variant. The artifact lock is held exclusively
//! while a freshly staged model is renamed into place and shared while a
//! model is loaded, so a reader never observes a half-written artifact.

use crate::error::{Error, Result};
use crate::model::{ArchitectureConfig, AudioClassifier, InferenceBackend, Variant};
use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MODEL_EXTENSION: &str = "mpk";
const METADATA_EXTENSION: &str = "json";
const STAGING_SUFFIX: &str = "-partial";

/// Sidecar describing how to rebuild a persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub variant: Variant,
    pub input_dim: usize,
    pub architecture: ArchitectureConfig,
    pub train_samples: usize,
    pub test_samples: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Default)]
struct VariantSlot {
    training: Mutex<()>,
    artifact: RwLock<()>,
}

/// Well-known artifact locations plus per-variant locking
pub struct ModelRegistry {
    model_dir: PathBuf,
    human: VariantSlot,
    ai: VariantSlot,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            human: VariantSlot::default(),
            ai: VariantSlot::default(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    fn slot(&self, variant: Variant) -> &VariantSlot {
        match variant {
            Variant::Human => &self.human,
            Variant::Ai => &self.ai,
        }
    }

    /// Path of the persisted model for `variant`
    pub fn artifact_path(&self, variant: Variant) -> PathBuf {
        self.model_dir
            .join(variant.artifact_stem())
            .with_extension(MODEL_EXTENSION)
    }

    fn metadata_path(&self, variant: Variant) -> PathBuf {
        self.model_dir
            .join(variant.artifact_stem())
            .with_extension(METADATA_EXTENSION)
    }

    fn staging_stem(&self, variant: Variant) -> PathBuf {
        self.model_dir
            .join(format!("{}{}", variant.artifact_stem(), STAGING_SUFFIX))
    }

    pub fn exists(&self, variant: Variant) -> bool {
        let _shared = self.slot(variant).artifact.read();
        self.artifact_path(variant).is_file() && self.metadata_path(variant).is_file()
    }

    /// Serialize training runs of one variant; other variants are unaffected
    pub fn lock_training(&self, variant: Variant) -> MutexGuard<'_, ()> {
        self.slot(variant).training.lock()
    }

    /// Persist `model`, replacing any previous artifact for the variant.
    ///
    /// The model is written to a staging file first and renamed into place
    /// under the exclusive artifact lock. Callers must hold the variant's
    /// training lock so staging files are never shared.
    pub fn save<B: Backend>(
        &self,
        model: AudioClassifier<B>,
        metadata: &ModelMetadata,
    ) -> Result<PathBuf> {
        let variant = metadata.variant;
        std::fs::create_dir_all(&self.model_dir)?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let staging = self.staging_stem(variant);
        model
            .save_file(staging.clone(), &recorder)
            .map_err(|e| Error::Model(format!("failed to save {} model: {}", variant, e)))?;
        let staged_model = staging.with_extension(MODEL_EXTENSION);

        let staged_metadata = staging.with_extension(METADATA_EXTENSION);
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| Error::Model(format!("failed to encode metadata: {}", e)))?;
        std::fs::write(&staged_metadata, json)?;

        let target = self.artifact_path(variant);
        {
            let _exclusive = self.slot(variant).artifact.write();
            std::fs::rename(&staged_model, &target)?;
            std::fs::rename(&staged_metadata, self.metadata_path(variant))?;
        }

        log::info!("Saved {} model to {}", variant, target.display());
        Ok(target)
    }

    /// Load the persisted model for `variant` onto the inference backend
    pub fn load(
        &self,
        variant: Variant,
    ) -> Result<(AudioClassifier<InferenceBackend>, ModelMetadata)> {
        let _shared = self.slot(variant).artifact.read();

        let model_path = self.artifact_path(variant);
        let metadata_path = self.metadata_path(variant);
        if !model_path.is_file() || !metadata_path.is_file() {
            return Err(Error::ModelNotFound(variant));
        }

        let metadata: ModelMetadata = serde_json::from_slice(&std::fs::read(&metadata_path)?)
            .map_err(|e| Error::Model(format!("corrupt metadata {}: {}", metadata_path.display(), e)))?;

        let device = Default::default();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let model = metadata
            .architecture
            .init::<InferenceBackend>(metadata.input_dim, &device)
            .load_file(model_path.clone(), &recorder, &device)
            .map_err(|e| Error::Model(format!("failed to load {}: {}", model_path.display(), e)))?;

        log::debug!("Loaded {} model from {}", variant, model_path.display());
        Ok((model, metadata))
    }
}
