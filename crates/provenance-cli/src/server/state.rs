use anyhow::{Context, Result};
use axum::http::HeaderName;
use provenance_core::{
    DatasetBuilder, FeatureExtractor, InferenceService, ModelRegistry, ProvenanceConfig, Trainer,
};
use provenance_store::{KeyStore, ScratchManager};
use std::sync::Arc;

/// Services shared by every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<KeyStore>,
    pub scratch: Arc<ScratchManager>,
    pub builder: Arc<DatasetBuilder>,
    pub trainer: Arc<Trainer>,
    pub inference: Arc<InferenceService>,
    admin_key: Arc<str>,
    api_key_header: HeaderName,
    max_upload_bytes: usize,
}

impl AppState {
    /// Wire the services described by `config`
    pub fn from_config(config: &ProvenanceConfig, admin_key: String) -> Result<Self> {
        if admin_key.trim().is_empty() {
            anyhow::bail!("Admin key must not be empty");
        }

        let api_key_header = HeaderName::from_bytes(config.server.api_key_header.as_bytes())
            .with_context(|| format!("Invalid API key header '{}'", config.server.api_key_header))?;

        let scratch = ScratchManager::new(&config.storage.scratch_dir).with_context(|| {
            format!(
                "Failed to create scratch directory {}",
                config.storage.scratch_dir.display()
            )
        })?;

        let registry = Arc::new(ModelRegistry::new(&config.storage.model_dir));
        let extractor = FeatureExtractor::new(config.features.clone());

        Ok(Self {
            keys: Arc::new(KeyStore::open(&config.storage.key_file)),
            scratch: Arc::new(scratch),
            builder: Arc::new(DatasetBuilder::new(extractor.clone())),
            trainer: Arc::new(Trainer::new(config.training.clone(), registry.clone())),
            inference: Arc::new(InferenceService::new(extractor, registry)),
            admin_key: Arc::from(admin_key.trim()),
            api_key_header,
            max_upload_bytes: config.server.max_upload_bytes,
        })
    }

    pub fn api_key_header(&self) -> &HeaderName {
        &self.api_key_header
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub(crate) fn is_admin_key(&self, presented: &str) -> bool {
        presented == &*self.admin_key
    }
}
