//! Single-clip classification against a persisted variant

use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::model::{AudioClassifier, InferenceBackend, Variant};
use crate::registry::ModelRegistry;
use burn::backend::ndarray::NdArrayDevice;
use burn::tensor::{Tensor, TensorData};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Scores strictly above this are synthetic; a tie is human
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Categorical outcome of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Synthetic,
    Human,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Synthetic => "synthetic",
            Verdict::Human => "human",
        }
    }

    /// Human-readable label shown to end users
    pub fn display_label(self) -> &'static str {
        match self {
            Verdict::Synthetic => "AI-generated",
            Verdict::Human => "Human-composed",
        }
    }
}

pub fn verdict_for_score(score: f32) -> Verdict {
    if score > DECISION_THRESHOLD {
        Verdict::Synthetic
    } else {
        Verdict::Human
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub verdict: Verdict,
    /// Model output in [0, 1]
    pub score: f32,
}

/// Loads the variant's model on every call, so a retrain is visible to the
/// very next request.
pub struct InferenceService {
    extractor: FeatureExtractor,
    registry: Arc<ModelRegistry>,
}

impl InferenceService {
    pub fn new(extractor: FeatureExtractor, registry: Arc<ModelRegistry>) -> Self {
        Self {
            extractor,
            registry,
        }
    }

    pub fn classify_file(&self, path: &Path, variant: Variant) -> Result<Classification> {
        let model = self.load(variant)?;
        let features = self.extractor.extract_file(path)?;
        score_features(&model, &features)
    }

    /// Classify in-memory audio; `hint` is the original file extension
    pub fn classify_bytes(
        &self,
        bytes: &[u8],
        hint: Option<&str>,
        variant: Variant,
    ) -> Result<Classification> {
        let model = self.load(variant)?;
        let features = self.extractor.extract_bytes(bytes, hint)?;
        score_features(&model, &features)
    }

    fn load(&self, variant: Variant) -> Result<AudioClassifier<InferenceBackend>> {
        let (model, metadata) = self.registry.load(variant)?;
        if metadata.input_dim != self.extractor.dimension() {
            return Err(Error::Model(format!(
                "{} model expects {} features but the extractor produces {}; retrain it",
                variant,
                metadata.input_dim,
                self.extractor.dimension()
            )));
        }
        Ok(model)
    }
}

fn score_features(
    model: &AudioClassifier<InferenceBackend>,
    features: &FeatureVector,
) -> Result<Classification> {
    let device = NdArrayDevice::default();
    let input = Tensor::<InferenceBackend, 2>::from_data(
        TensorData::new(features.as_slice().to_vec(), [1, features.len()]),
        &device,
    );

    let score = model
        .forward(input)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::Model(format!("failed to read model output: {:?}", e)))?
        .first()
        .copied()
        .ok_or_else(|| Error::Model("model produced no output".into()))?;

    let verdict = verdict_for_score(score);
    log::debug!("score {:.4} -> {}", score, verdict.as_str());
    Ok(Classification { verdict, score })
}
