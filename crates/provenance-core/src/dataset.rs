//! Labeled datasets built from directories of audio files

use crate::audio::is_audio_file;
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Class of a training example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Human,
    Synthetic,
}

impl Label {
    /// Regression target: 1.0 for the synthetic class
    pub fn target(self) -> f32 {
        match self {
            Label::Human => 0.0,
            Label::Synthetic => 1.0,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Human => write!(f, "human"),
            Label::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Parallel collections of feature vectors and labels
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    features: Vec<FeatureVector>,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parts, rejecting length or dimension mismatches
    pub fn from_parts(features: Vec<FeatureVector>, labels: Vec<Label>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(Error::InsufficientData(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let mut dataset = Self::new();
        for (vector, label) in features.into_iter().zip(labels) {
            dataset.push(vector, label)?;
        }
        Ok(dataset)
    }

    pub fn push(&mut self, vector: FeatureVector, label: Label) -> Result<()> {
        if let Some(dim) = self.dimension() {
            if vector.len() != dim {
                return Err(Error::InsufficientData(format!(
                    "feature vector of length {} in a dataset of dimension {}",
                    vector.len(),
                    dim
                )));
            }
        }
        self.features.push(vector);
        self.labels.push(label);
        Ok(())
    }

    /// Append another dataset, preserving both orders
    pub fn extend(&mut self, other: Dataset) -> Result<()> {
        for (vector, label) in other.features.into_iter().zip(other.labels) {
            self.push(vector, label)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Feature dimensionality, `None` while empty
    pub fn dimension(&self) -> Option<usize> {
        self.features.first().map(FeatureVector::len)
    }
}

/// A file the builder could not turn into a feature vector
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning one directory
#[derive(Debug, Default)]
pub struct DatasetScan {
    pub dataset: Dataset,
    pub skipped: Vec<SkippedFile>,
}

/// Walks a directory and extracts one labeled vector per audio file
pub struct DatasetBuilder {
    extractor: FeatureExtractor,
}

impl DatasetBuilder {
    pub fn new(extractor: FeatureExtractor) -> Self {
        Self { extractor }
    }

    /// Extract every recognized audio file below `dir`, all tagged `label`.
    ///
    /// Per-file failures are logged and skipped; an empty directory yields
    /// an empty dataset, not an error. Only a missing or unreadable `dir`
    /// fails the call.
    pub fn build(&self, dir: &Path, label: Label) -> Result<DatasetScan> {
        let files = collect_audio_files(dir)?;
        log::info!("Found {} audio files in {}", files.len(), dir.display());

        let results: Vec<(PathBuf, Result<FeatureVector>)> = files
            .into_par_iter()
            .map(|path| {
                let result = self.extractor.extract_file(&path);
                (path, result)
            })
            .collect();

        let mut scan = DatasetScan::default();
        for (path, result) in results {
            if let Err(e) = result.and_then(|vector| scan.dataset.push(vector, label)) {
                skip(&mut scan, path, e);
            }
        }

        log::info!(
            "Extracted {} {} samples ({} skipped)",
            scan.dataset.len(),
            label,
            scan.skipped.len()
        );
        Ok(scan)
    }
}

fn skip(scan: &mut DatasetScan, path: PathBuf, error: Error) {
    log::warn!("Skipping {}: {}", path.display(), error);
    scan.skipped.push(SkippedFile {
        path,
        reason: error.to_string(),
    });
}

/// Recursively list audio files, sorted so enumeration order is stable
fn collect_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_audio_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn write_tone(path: &Path, freq: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..8000 {
            let s = (2.0 * PI * freq * i as f32 / 16000.0).sin();
            writer.write_sample((s * 12000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        for (i, freq) in [220.0, 330.0, 440.0].iter().enumerate() {
            write_tone(&dir.path().join(format!("tone{}.wav", i)), *freq);
        }
        std::fs::write(dir.path().join("broken.wav"), b"not audio at all").unwrap();
        std::fs::write(dir.path().join("empty.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let builder = DatasetBuilder::new(FeatureExtractor::default());
        let scan = builder.build(dir.path(), Label::Synthetic).unwrap();

        assert_eq!(scan.dataset.len(), 3);
        assert_eq!(scan.dataset.labels().len(), 3);
        assert!(scan.dataset.labels().iter().all(|l| *l == Label::Synthetic));
        assert_eq!(scan.dataset.dimension(), Some(32));
        assert_eq!(scan.skipped.len(), 2);
    }

    /// Collects warnings so tests can count them
    struct WarningCapture;

    static WARNINGS: parking_lot::Mutex<Vec<String>> = parking_lot::const_mutex(Vec::new());

    impl log::Log for WarningCapture {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.lock().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    fn capture_warnings() {
        static INSTALL: std::sync::Once = std::sync::Once::new();
        INSTALL.call_once(|| {
            log::set_logger(&WarningCapture).unwrap();
            log::set_max_level(log::LevelFilter::Warn);
        });
    }

    #[test]
    fn test_each_corrupt_file_is_logged_once() {
        capture_warnings();
        let dir = tempfile::tempdir().unwrap();
        write_tone(&dir.path().join("good.wav"), 440.0);
        let broken = dir.path().join("broken.wav");
        std::fs::write(&broken, b"not audio at all").unwrap();

        let builder = DatasetBuilder::new(FeatureExtractor::default());
        let scan = builder.build(dir.path(), Label::Human).unwrap();
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].path, broken);

        let needle = broken.display().to_string();
        let mentions = WARNINGS.lock().iter().filter(|w| w.contains(&needle)).count();
        assert_eq!(mentions, 1);

        let good = dir.path().join("good.wav").display().to_string();
        assert!(!WARNINGS.lock().iter().any(|w| w.contains(&good)));
    }

    #[test]
    fn test_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("album");
        std::fs::create_dir(&nested).unwrap();
        write_tone(&nested.join("b.wav"), 300.0);
        write_tone(&dir.path().join("a.WAV"), 600.0);

        let files = collect_audio_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0] < files[1]);
    }

    #[test]
    fn test_empty_directory_is_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(FeatureExtractor::default());
        let scan = builder.build(dir.path(), Label::Human).unwrap();
        assert!(scan.dataset.is_empty());
        assert!(scan.skipped.is_empty());
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = DatasetBuilder::new(FeatureExtractor::default());
        assert!(builder.build(&dir.path().join("nope"), Label::Human).is_err());
    }

    #[test]
    fn test_push_rejects_dimension_mismatch() {
        let mut dataset = Dataset::new();
        dataset
            .push(FeatureVector::from(vec![0.0; 4]), Label::Human)
            .unwrap();
        assert!(dataset
            .push(FeatureVector::from(vec![0.0; 5]), Label::Human)
            .is_err());
        assert!(Dataset::from_parts(vec![FeatureVector::from(vec![1.0])], vec![]).is_err());
    }
}
