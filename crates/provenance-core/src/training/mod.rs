//! Training orchestration: split, fit, evaluate, persist
//!
//! A run for one variant holds that variant's training lock from the first
//! epoch until the artifact is renamed into place. Held-out metrics are
//! diagnostic only; every run uses the full epoch budget.

use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::model::{AudioClassifier, InferenceBackend, TrainingBackend, Variant};
use crate::registry::{ModelMetadata, ModelRegistry};
use burn::backend::ndarray::NdArrayDevice;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;


/// Probabilities are clamped away from 0 and 1 before taking logs
const PROBABILITY_EPSILON: f64 = 1e-7;

/// Decision boundary used for held-out accuracy
const ACCURACY_THRESHOLD: f32 = 0.5;

/// Diagnostics recorded after each epoch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochMetrics {
    /// 1-based
    pub epoch: usize,
    pub train_loss: f32,
    /// `None` when the held-out partition is empty
    pub test_loss: Option<f32>,
    pub test_accuracy: Option<f32>,
}

/// Outcome of one successful training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub variant: Variant,
    pub model_path: PathBuf,
    pub train_samples: usize,
    pub test_samples: usize,
    pub history: Vec<EpochMetrics>,
}

impl TrainingReport {
    pub fn final_metrics(&self) -> Option<&EpochMetrics> {
        self.history.last()
    }
}

/// Shuffle `0..len` with `seed` and split off the held-out share.
///
/// Returns `(train, test)`. The held-out size is `ceil(len * test_fraction)`,
/// capped so the training partition is never empty.
pub fn split_indices(len: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let test_len = ((len as f64 * test_fraction).ceil() as usize).min(len.saturating_sub(1));
    let train = indices.split_off(test_len);
    (train, indices)
}

/// Fits classifier variants and persists them through a [`ModelRegistry`]
pub struct Trainer {
    config: TrainingConfig,
    registry: Arc<ModelRegistry>,
}

impl Trainer {
    pub fn new(config: TrainingConfig, registry: Arc<ModelRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train `variant` on `dataset` and overwrite its persisted artifact.
    ///
    /// Fails with [`Error::InsufficientData`] on an empty dataset before any
    /// lock is taken or file touched.
    pub fn train(&self, dataset: &Dataset, variant: Variant) -> Result<TrainingReport> {
        let input_dim = match dataset.dimension() {
            Some(dim) if dim > 0 => dim,
            _ => {
                return Err(Error::InsufficientData(
                    "dataset contains no usable samples".into(),
                ))
            }
        };

        let (mut train_idx, test_idx) =
            split_indices(dataset.len(), self.config.test_fraction, self.config.seed);

        let _training = self.registry.lock_training(variant);
        log::info!(
            "Training {} model: {} train / {} held-out samples, {} features",
            variant,
            train_idx.len(),
            test_idx.len(),
            input_dim
        );

        let device = NdArrayDevice::default();
        let architecture = variant.architecture();
        let mut model: AudioClassifier<TrainingBackend> = architecture.init(input_dim, &device);
        let mut optim = AdamConfig::new().init::<TrainingBackend, AudioClassifier<TrainingBackend>>();

        let mut history = Vec::with_capacity(self.config.epochs);
        for epoch in 1..=self.config.epochs {
            train_idx.shuffle(&mut StdRng::seed_from_u64(
                self.config.seed.wrapping_add(epoch as u64),
            ));

            let mut loss_sum = 0.0f64;
            for batch in train_idx.chunks(self.config.batch_size) {
                let (inputs, targets) = batch_tensors::<TrainingBackend>(dataset, batch, &device);
                let loss = binary_cross_entropy(model.forward(inputs), targets);
                loss_sum += scalar(loss.clone())? as f64 * batch.len() as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(self.config.learning_rate, model, grads);
            }
            let train_loss = (loss_sum / train_idx.len() as f64) as f32;

            let (test_loss, test_accuracy) = if test_idx.is_empty() {
                (None, None)
            } else {
                let (loss, accuracy) = evaluate(&model.valid(), dataset, &test_idx)?;
                (Some(loss), Some(accuracy))
            };

            log::info!(
                "[{}] epoch {}/{}: loss {:.4}, val_loss {}, val_accuracy {}",
                variant,
                epoch,
                self.config.epochs,
                train_loss,
                fmt_metric(test_loss),
                fmt_metric(test_accuracy)
            );

            history.push(EpochMetrics {
                epoch,
                train_loss,
                test_loss,
                test_accuracy,
            });
        }

        let metadata = ModelMetadata {
            variant,
            input_dim,
            architecture,
            train_samples: train_idx.len(),
            test_samples: test_idx.len(),
            trained_at: chrono::Utc::now(),
        };
        let model_path = self.registry.save(model.valid(), &metadata)?;

        Ok(TrainingReport {
            variant,
            model_path,
            train_samples: metadata.train_samples,
            test_samples: metadata.test_samples,
            history,
        })
    }
}

fn fmt_metric(value: Option<f32>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

/// Gather rows `indices` into `[batch, dim]` inputs and `[batch, 1]` targets
fn batch_tensors<B: Backend>(
    dataset: &Dataset,
    indices: &[usize],
    device: &B::Device,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let dim = dataset.dimension().unwrap_or(0);
    let mut inputs = Vec::with_capacity(indices.len() * dim);
    let mut targets = Vec::with_capacity(indices.len());
    for &i in indices {
        inputs.extend_from_slice(dataset.features()[i].as_slice());
        targets.push(dataset.labels()[i].target());
    }

    (
        Tensor::from_data(TensorData::new(inputs, [indices.len(), dim]), device),
        Tensor::from_data(TensorData::new(targets, [indices.len(), 1]), device),
    )
}

/// Mean binary cross-entropy of probabilities against 0/1 targets
fn binary_cross_entropy<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let p = predictions.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
    let positive = targets.clone() * p.clone().log();
    let negative = targets.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log();
    (positive + negative).neg().mean()
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> Result<f32> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::Model(format!("failed to read tensor: {:?}", e)))?
        .first()
        .copied()
        .ok_or_else(|| Error::Model("empty loss tensor".into()))
}

/// Held-out loss and accuracy, dropout disabled
fn evaluate(
    model: &AudioClassifier<InferenceBackend>,
    dataset: &Dataset,
    indices: &[usize],
) -> Result<(f32, f32)> {
    let device = NdArrayDevice::default();
    let (inputs, targets) = batch_tensors::<InferenceBackend>(dataset, indices, &device);
    let predictions = model.forward(inputs);
    let loss = scalar(binary_cross_entropy(predictions.clone(), targets))?;

    let probabilities = predictions
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::Model(format!("failed to read predictions: {:?}", e)))?;
    let correct = probabilities
        .iter()
        .zip(indices)
        .filter(|&(p, &i)| (*p > ACCURACY_THRESHOLD) == (dataset.labels()[i].target() > 0.5))
        .count();

    Ok((loss, correct as f32 / indices.len() as f32))
}
