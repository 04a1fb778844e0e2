//! Error taxonomy for the classification pipeline

use crate::model::Variant;
use thiserror::Error;

/// Errors surfaced by extraction, training and inference
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be decoded as audio (unsupported or corrupt)
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// Dataset is empty or malformed; raised before any model is touched
    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    /// Classification requested before the variant was ever trained
    #[error("no trained model for variant '{0}'")]
    ModelNotFound(Variant),

    /// Model construction, persistence or loading failed
    #[error("model error: {0}")]
    Model(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn decode(context: impl std::fmt::Display, cause: impl std::fmt::Display) -> Self {
        Error::Decode(format!("{}: {}", context, cause))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
