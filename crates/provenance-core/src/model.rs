//! Classifier variants and the feed-forward architecture they share

use crate::dataset::Label;
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CPU backend used for loading and classification
pub type InferenceBackend = NdArray<f32>;

/// Autodiff wrapper used while fitting
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Named classifier artifact, trained and persisted independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Human,
    Ai,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Human, Variant::Ai];

    /// `"ai"` selects the ai variant; every other flag value selects human
    pub fn from_label_type(label_type: &str) -> Self {
        if label_type == "ai" {
            Variant::Ai
        } else {
            Variant::Human
        }
    }

    /// Label attached to a directory uploaded for this variant
    pub fn label(self) -> Label {
        match self {
            Variant::Human => Label::Human,
            Variant::Ai => Label::Synthetic,
        }
    }

    /// File stem of the persisted artifact
    pub fn artifact_stem(self) -> &'static str {
        match self {
            Variant::Human => "ai_music_classifier",
            Variant::Ai => "ai_music_classifier_ai",
        }
    }

    pub fn architecture(self) -> ArchitectureConfig {
        match self {
            Variant::Human => ArchitectureConfig::human(),
            Variant::Ai => ArchitectureConfig::ai(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Human => "human",
            Variant::Ai => "ai",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(Variant::Human),
            "ai" => Ok(Variant::Ai),
            other => Err(format!("unknown variant '{}' (expected human or ai)", other)),
        }
    }
}

/// Hidden layer widths and the dropout applied after each
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    pub hidden_sizes: Vec<usize>,
    pub dropout_rates: Vec<f64>,
}

impl ArchitectureConfig {
    /// Lighter regularization on the second hidden layer
    pub fn human() -> Self {
        Self {
            hidden_sizes: vec![256, 128],
            dropout_rates: vec![0.3, 0.3],
        }
    }

    /// Heavier regularization on the second hidden layer
    pub fn ai() -> Self {
        Self {
            hidden_sizes: vec![256, 128],
            dropout_rates: vec![0.3, 0.5],
        }
    }

    /// Build an untrained classifier for `input_dim` features
    pub fn init<B: Backend>(&self, input_dim: usize, device: &B::Device) -> AudioClassifier<B> {
        let mut hidden = Vec::with_capacity(self.hidden_sizes.len());
        let mut dropouts = Vec::with_capacity(self.hidden_sizes.len());
        let mut width = input_dim;

        for (i, &size) in self.hidden_sizes.iter().enumerate() {
            hidden.push(LinearConfig::new(width, size).init(device));
            let rate = self.dropout_rates.get(i).copied().unwrap_or(0.0);
            dropouts.push(DropoutConfig::new(rate).init());
            width = size;
        }

        AudioClassifier {
            hidden,
            dropouts,
            output: LinearConfig::new(width, 1).init(device),
        }
    }
}

/// Dense ReLU layers with dropout, one sigmoid output unit
#[derive(Module, Debug)]
pub struct AudioClassifier<B: Backend> {
    hidden: Vec<Linear<B>>,
    dropouts: Vec<Dropout>,
    output: Linear<B>,
}

impl<B: Backend> AudioClassifier<B> {
    /// `[batch, features]` → `[batch, 1]` probabilities of the synthetic class
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for (linear, dropout) in self.hidden.iter().zip(&self.dropouts) {
            x = dropout.forward(relu(linear.forward(x)));
        }
        sigmoid(self.output.forward(x))
    }
}
