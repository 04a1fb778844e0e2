//! On-disk API key store
//!
//! The file is a JSON object mapping each issued key to its status. Every
//! mutation reads the whole file and rewrites it through a sibling temp file.
//! Writers inside this process are serialized by a mutex; separate processes
//! sharing one file are not coordinated.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Random bytes per issued key (hex-encoded to twice as many characters)
const KEY_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub status: KeyStatus,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

type KeyMap = BTreeMap<String, KeyRecord>;

pub struct KeyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl KeyStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All currently active keys
    pub fn load(&self) -> Result<HashSet<String>> {
        Ok(active_keys(&self.read_map()?).collect())
    }

    /// Persist `keys` as the active set; any other stored key becomes revoked
    pub fn save(&self, keys: &HashSet<String>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut map = self.read_map()?;
        let now = Utc::now();

        for (key, record) in map.iter_mut() {
            if !keys.contains(key) && record.status == KeyStatus::Active {
                record.status = KeyStatus::Revoked;
                record.revoked_at = Some(now);
            }
        }
        for key in keys {
            let record = map.entry(key.clone()).or_insert(KeyRecord {
                status: KeyStatus::Active,
                issued_at: now,
                revoked_at: None,
            });
            record.status = KeyStatus::Active;
            record.revoked_at = None;
        }

        self.write_map(&map)
    }

    /// Generate, persist and return a new active key
    pub fn issue(&self) -> Result<String> {
        let _guard = self.write_lock.lock();
        let mut map = self.read_map()?;

        let key = loop {
            let candidate = generate_key();
            if !map.contains_key(&candidate) {
                break candidate;
            }
        };
        map.insert(
            key.clone(),
            KeyRecord {
                status: KeyStatus::Active,
                issued_at: Utc::now(),
                revoked_at: None,
            },
        );
        self.write_map(&map)?;

        log::info!("Issued API key {}", redact(&key));
        Ok(key)
    }

    /// Revoke an active key; unknown or already revoked keys are `NotFound`
    pub fn revoke(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut map = self.read_map()?;

        match map.get_mut(key) {
            Some(record) if record.status == KeyStatus::Active => {
                record.status = KeyStatus::Revoked;
                record.revoked_at = Some(Utc::now());
            }
            _ => return Err(StoreError::NotFound(format!("API key {}", redact(key)))),
        }
        self.write_map(&map)?;

        log::info!("Revoked API key {}", redact(key));
        Ok(())
    }

    /// Active keys in a stable order
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(active_keys(&self.read_map()?).collect())
    }

    pub fn is_active(&self, key: &str) -> Result<bool> {
        Ok(self
            .read_map()?
            .get(key)
            .map_or(false, |record| record.status == KeyStatus::Active))
    }

    fn read_map(&self) -> Result<KeyMap> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(KeyMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KeyMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &KeyMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn active_keys(map: &KeyMap) -> impl Iterator<Item = String> + '_ {
    map.iter()
        .filter(|(_, record)| record.status == KeyStatus::Active)
        .map(|(key, _)| key.clone())
}

fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// First characters of a key, safe for logs
fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{}…", prefix)
}
