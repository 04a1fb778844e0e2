//! Scratch lifecycle for uploaded archives and per-request temp files
//!
//! Every staged directory and temp file is removed either by an explicit
//! `release` or, failing that, when its handle is dropped. Removal is
//! retried once before the error is surfaced.

use crate::error::{Result, StoreError};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Longest archive-derived prefix kept in a directory id
const MAX_STEM_LEN: usize = 64;
/// Upper bound on ids accepted from callers
const MAX_ID_LEN: usize = 128;

/// Owner of the scratch root under which uploads are staged
pub struct ScratchManager {
    root: PathBuf,
}

impl ScratchManager {
    /// Use `root` for scratch state, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extract an uploaded zip archive into a fresh working directory.
    ///
    /// The directory name is the sanitized archive stem plus a random
    /// suffix, so concurrent uploads of the same file never collide. On any
    /// failure the partially populated directory is removed.
    pub fn stage(&self, archive_bytes: &[u8], archive_name: &str) -> Result<ScratchDirectory> {
        if archive_bytes.is_empty() {
            return Err(StoreError::Validation("Uploaded archive is empty".into()));
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", sanitize_stem(archive_name), suffix);
        let path = self.root.join(&id);
        std::fs::create_dir(&path)?;

        let directory = ScratchDirectory {
            id,
            path,
            released: false,
        };

        match populate(&directory.path, archive_bytes, &suffix) {
            Ok(entries) => {
                log::info!(
                    "Staged {} ({} entries) into {}",
                    archive_name,
                    entries,
                    directory.path.display()
                );
                Ok(directory)
            }
            Err(e) => {
                log::warn!("Staging {} failed: {}", archive_name, e);
                if let Err(cleanup) = directory.release() {
                    log::error!("Could not remove failed staging directory: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Reopen a previously staged directory by id
    pub fn open(&self, id: &str) -> Result<ScratchDirectory> {
        validate_id(id)?;
        let path = self.root.join(id);
        if !path.is_dir() {
            return Err(StoreError::Validation(format!(
                "Working directory '{}' does not exist",
                id
            )));
        }
        Ok(ScratchDirectory {
            id: id.to_string(),
            path,
            released: false,
        })
    }

    /// Write one request's input to a uniquely named temp file.
    ///
    /// The extension of `original_name` is kept (sanitized) so decoders can
    /// pick the container from it.
    pub fn temp_file(&self, bytes: &[u8], original_name: &str) -> Result<TempInput> {
        let extension: String = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(8)
            .collect();

        let mut name = Uuid::new_v4().simple().to_string();
        if !extension.is_empty() {
            name = format!("{}.{}", name, extension);
        }
        let path = self.root.join(name);
        let input = TempInput {
            path,
            released: false,
        };
        std::fs::write(&input.path, bytes)?;
        Ok(input)
    }
}

/// Working directory holding the contents of one uploaded archive
#[derive(Debug)]
pub struct ScratchDirectory {
    id: String,
    path: PathBuf,
    released: bool,
}

impl ScratchDirectory {
    /// Identifier returned to clients and accepted by [`ScratchManager::open`]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the directory over to a later request; returns its id.
    ///
    /// The directory is no longer removed on drop and must be reopened with
    /// [`ScratchManager::open`] and released by that consumer.
    pub fn keep(mut self) -> String {
        self.released = true;
        std::mem::take(&mut self.id)
    }

    /// Recursively delete the directory
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_with_retry(&self.path, |p| std::fs::remove_dir_all(p))
    }
}

impl Drop for ScratchDirectory {
    fn drop(&mut self) {
        if !self.released {
            let _ = remove_with_retry(&self.path, |p| std::fs::remove_dir_all(p));
        }
    }
}

/// Temp file holding a single request's upload
#[derive(Debug)]
pub struct TempInput {
    path: PathBuf,
    released: bool,
}

impl TempInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_with_retry(&self.path, |p| std::fs::remove_file(p))
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        if !self.released {
            let _ = remove_with_retry(&self.path, |p| std::fs::remove_file(p));
        }
    }
}

/// Accept only single path components made of `[A-Za-z0-9_-]`
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "Invalid working directory identifier '{}'",
            id
        )))
    }
}

/// Archive base name without extension, reduced to id-safe characters
fn sanitize_stem(archive_name: &str) -> String {
    // uploads may carry client paths with either separator
    let base = archive_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("");
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Write the archive into `dir`, extract it in place, delete the archive
fn populate(dir: &Path, archive_bytes: &[u8], suffix: &str) -> Result<usize> {
    let archive_path = dir.join(format!(".{}.zip", suffix));
    std::fs::write(&archive_path, archive_bytes)?;

    let extracted = extract_zip(dir, &std::fs::read(&archive_path)?);
    std::fs::remove_file(&archive_path)?;
    extracted
}

fn extract_zip(dir: &Path, bytes: &[u8]) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| StoreError::Archive(e.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| StoreError::Archive(e.to_string()))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            StoreError::Archive(format!("entry '{}' escapes the working directory", entry.name()))
        })?;
        let target = dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }

    Ok(archive.len())
}

fn remove_with_retry(path: &Path, remove: impl Fn(&Path) -> std::io::Result<()>) -> Result<()> {
    let attempt = |path: &Path| match remove(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    };

    match attempt(path) {
        Ok(()) => Ok(()),
        Err(first) => {
            log::warn!("Failed to remove {}: {}; retrying", path.display(), first);
            attempt(path).map_err(|e| {
                log::error!("Failed to remove {}: {}", path.display(), e);
                StoreError::Io(e)
            })
        }
    }
}
