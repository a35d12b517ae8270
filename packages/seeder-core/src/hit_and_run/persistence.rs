//! The persistent elapsed-seed-time store.
//!
//! One JSON object, hex info-hash to total seeded milliseconds, pretty
//! printed and rewritten in full on every save. Last writer wins; nothing
//! stronger is needed for a single-process accounting file.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ghostseed_primitives::info_hash::InfoHash;

/// Reads and rewrites `elapsed-times.json`.
pub struct ElapsedTimeStore {
    file_path: PathBuf,
    entries: Mutex<HashMap<String, u64>>,
}

impl ElapsedTimeStore {
    /// Loads the store, starting empty when the file is missing or corrupt.
    #[must_use]
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            entries: Mutex::new(Self::load(file_path)),
        }
    }

    /// The persisted total for one torrent, zero when unknown.
    #[must_use]
    pub fn get(&self, info_hash: &InfoHash) -> u64 {
        self.entries
            .lock()
            .expect("the elapsed time store lock is poisoned")
            .get(&info_hash.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Records a total and rewrites the file.
    pub fn save(&self, info_hash: &InfoHash, elapsed_ms: u64) {
        let mut entries = self.entries.lock().expect("the elapsed time store lock is poisoned");
        entries.insert(info_hash.to_string(), elapsed_ms);
        self.persist(&entries);
    }

    /// A snapshot of every persisted total.
    #[must_use]
    pub fn all(&self) -> HashMap<String, u64> {
        self.entries
            .lock()
            .expect("the elapsed time store lock is poisoned")
            .clone()
    }

    fn persist(&self, entries: &HashMap<String, u64>) {
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::error!("Failed to persist elapsed times to {}: {e}", self.file_path.display());
                }
            }
            Err(e) => tracing::error!("Failed to serialize elapsed times: {e}"),
        }
    }

    fn load(file_path: &Path) -> HashMap<String, u64> {
        if !file_path.exists() {
            return HashMap::new();
        }

        match std::fs::read_to_string(file_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!("Failed to parse elapsed times from {}, starting empty: {e}", file_path.display());
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::error!("Failed to read elapsed times from {}, starting empty: {e}", file_path.display());
                HashMap::new()
            }
        }
    }
}
