//! Engine-private provenance sidecar.
//!
//! Records the identity hash and per-media-type content hashes the engine
//! used at its last successful action for each ROM. A difference between
//! the stored identity hash and a freshly computed one is the sole signal
//! for "ROM changed" under the `changed_only` update policy.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::GamelistError;

pub const PROVENANCE_FILE: &str = "curateur_provenance.json";

/// Provenance for one ROM, keyed by display basename in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Uppercase hex hash of the primary file at last action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hash: Option<String>,
    /// Primary file size at last action; the change signal when the hash
    /// was skipped for oversized files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Media type slug -> content hash of the file on disk.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub media: BTreeMap<String, String>,
    /// RFC 3339 timestamp of the last action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// Per-platform provenance store, persisted as a JSON sidecar next to
/// the catalog.
#[derive(Debug)]
pub struct ProvenanceStore {
    path: PathBuf,
    records: BTreeMap<String, ProvenanceRecord>,
}

impl ProvenanceStore {
    /// Load the sidecar; a missing or corrupt file yields an empty store
    /// (the engine will simply re-scrape).
    pub fn load(path: PathBuf) -> Self {
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    log::warn!(
                        "Corrupt provenance file {}, starting fresh: {e}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, records }
    }

    pub fn get(&self, basename: &str) -> Option<&ProvenanceRecord> {
        self.records.get(basename)
    }

    pub fn upsert(&mut self, basename: &str, record: ProvenanceRecord) {
        self.records.insert(basename.to_string(), record);
    }

    /// Record a media hash for a ROM, creating the record if needed.
    /// Hashes are recorded even when the engine merely verified presence.
    pub fn record_media_hash(&mut self, basename: &str, media_type: &str, hash: &str) {
        self.records
            .entry(basename.to_string())
            .or_default()
            .media
            .insert(media_type.to_string(), hash.to_string());
    }

    pub fn remove(&mut self, basename: &str) {
        self.records.remove(basename);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist atomically (temp file + rename).
    pub fn save(&self) -> Result<(), GamelistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROVENANCE_FILE);

        let mut store = ProvenanceStore::load(path.clone());
        assert!(store.is_empty());

        store.upsert(
            "World Explorer (World)",
            ProvenanceRecord {
                provider_id: Some("4242".into()),
                identity_hash: Some("CBF43926".into()),
                identity_size: Some(9),
                algorithm: Some("crc32".into()),
                ..Default::default()
            },
        );
        store.record_media_hash("World Explorer (World)", "covers", "DEADBEEF");
        store.save().unwrap();

        let reloaded = ProvenanceStore::load(path);
        let record = reloaded.get("World Explorer (World)").unwrap();
        assert_eq!(record.identity_hash.as_deref(), Some("CBF43926"));
        assert_eq!(record.media.get("covers").map(String::as_str), Some("DEADBEEF"));
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROVENANCE_FILE);
        std::fs::write(&path, "{not json").unwrap();
        let store = ProvenanceStore::load(path);
        assert!(store.is_empty());
    }
}
