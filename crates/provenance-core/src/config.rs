//! Configuration for the provenance pipeline and service
//!
//! Loaded from TOML. Every section carries defaults, so an empty file (or no
//! file at all) yields the reference configuration.

use crate::error::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the out-of-band admin secret
pub const ADMIN_KEY_ENV: &str = "PROVENANCE_ADMIN_KEY";

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvenanceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    /// Fallback admin secret; the environment variable takes precedence
    #[serde(default, skip_serializing)]
    pub admin_key: Option<String>,
}

/// HTTP service parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key_header: default_api_key_header(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}
fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}
fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024
}

/// On-disk locations of persisted and scratch state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            model_dir: default_model_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

fn default_key_file() -> PathBuf {
    PathBuf::from("./api_keys.json")
}
fn default_model_dir() -> PathBuf {
    PathBuf::from("./models")
}
fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./scratch")
}

/// Short-time spectral analysis parameters.
///
/// Changing any value that affects [`FeatureConfig::dimension`] invalidates
/// every persisted model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub fft_size: usize,
    pub hop_size: usize,
    /// Timbral coefficients kept after the DCT
    pub n_mfcc: usize,
    pub n_mels: usize,
    /// Pitch classes in the chroma profile
    pub n_chroma: usize,
    /// Octave bands above `contrast_fmin`; one extra band covers the range below it
    pub contrast_bands: usize,
    pub contrast_fmin: f32,
    /// Fraction of each band averaged for peak and valley estimates
    pub contrast_quantile: f32,
    /// Dynamic range kept by the log-mel compression
    pub top_db: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_size: 512,
            n_mfcc: 13,
            n_mels: 128,
            n_chroma: 12,
            contrast_bands: 6,
            contrast_fmin: 200.0,
            contrast_quantile: 0.02,
            top_db: 80.0,
        }
    }
}

impl FeatureConfig {
    /// Length of the feature vector: timbral + harmonic + contrast
    pub fn dimension(&self) -> usize {
        self.n_mfcc + self.n_chroma + self.contrast_bands + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 {
            return Err(Error::Config("fft_size must be >= 2".into()));
        }
        if self.hop_size == 0 || self.hop_size > self.fft_size {
            return Err(Error::Config("hop_size must be in 1..=fft_size".into()));
        }
        if self.n_mels == 0 || self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return Err(Error::Config("n_mfcc must be in 1..=n_mels".into()));
        }
        if self.n_chroma == 0 {
            return Err(Error::Config("n_chroma must be > 0".into()));
        }
        if self.contrast_fmin <= 0.0 {
            return Err(Error::Config("contrast_fmin must be > 0".into()));
        }
        if !(self.contrast_quantile > 0.0 && self.contrast_quantile < 1.0) {
            return Err(Error::Config("contrast_quantile must be in (0, 1)".into()));
        }
        Ok(())
    }
}

/// Fit parameters shared by both classifier variants
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Held-out share of the shuffled dataset
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be > 0".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::Config("learning_rate must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(Error::Config("test_fraction must be in [0, 1)".into()));
        }
        Ok(())
    }
}

impl ProvenanceConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ProvenanceConfig =
            toml::from_str(&content).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.training.validate()?;
        if self.server.api_key_header.trim().is_empty() {
            return Err(Error::Config("api_key_header must not be empty".into()));
        }
        Ok(())
    }

    /// Admin secret from the environment, falling back to the config file
    pub fn resolve_admin_key(&self) -> Option<String> {
        std::env::var(ADMIN_KEY_ENV)
            .ok()
            .or_else(|| self.admin_key.clone())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dimension() {
        let config = FeatureConfig::default();
        assert_eq!(config.dimension(), 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: ProvenanceConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.storage.model_dir, PathBuf::from("./models"));
        assert_eq!(config.training.epochs, 50);
        assert_eq!(config.training.batch_size, 32);
        assert!(config.admin_key.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
            admin_key = "s3cret"

            [storage]
            model_dir = "/var/lib/provenance/models"

            [training]
            epochs = 5
        "#;

        let config: ProvenanceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.model_dir, PathBuf::from("/var/lib/provenance/models"));
        assert_eq!(config.storage.key_file, PathBuf::from("./api_keys.json"));
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.admin_key.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut features = FeatureConfig::default();
        features.hop_size = features.fft_size + 1;
        assert!(features.validate().is_err());

        let mut training = TrainingConfig::default();
        training.test_fraction = 1.0;
        assert!(training.validate().is_err());
        training.test_fraction = 0.2;
        training.batch_size = 0;
        assert!(training.validate().is_err());
    }
}
