//! # Checkpoint Store
//!
//! Per-device scan state kept in a single JSON file. Reads never fail: a
//! missing or unreadable file is treated as an empty mapping. Writes replace
//! only the entry of the device being saved and leave every other entry as
//! it was found.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state::ScanState;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One stored device entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEntry {
    #[serde(flatten)]
    pub state: ScanState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

type Mapping = BTreeMap<String, Value>;

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last known state for `device`, if any could be read.
    pub fn load(&self, device: &str) -> Option<ScanState> {
        self.load_entry(device).map(|entry| entry.state)
    }

    pub fn load_entry(&self, device: &str) -> Option<CheckpointEntry> {
        let mut mapping = self.read_mapping();
        let raw = mapping.remove(device)?;
        match serde_json::from_value::<CheckpointEntry>(raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(
                    "ignoring unreadable checkpoint entry for {device} in {}: {err}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Persist `state` for `device`. `None` means there is nothing to record.
    pub fn save(&self, device: &str, state: Option<&ScanState>) -> Result<(), CheckpointError> {
        let Some(state) = state else {
            info!("no scan state for {device}, checkpoint left untouched");
            return Ok(());
        };

        let mut mapping = self.read_mapping();
        let entry = CheckpointEntry {
            state: *state,
            saved_at: Some(Utc::now()),
        };
        mapping.insert(device.to_string(), serde_json::to_value(&entry)?);

        let data = serde_json::to_vec_pretty(&mapping)?;
        self.write_atomic(&data)?;
        debug!("checkpoint for {device} written to {}", self.path.display());
        Ok(())
    }

    fn read_mapping(&self) -> Mapping {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) => {
                debug!("no checkpoint read from {}: {err}", self.path.display());
                return Mapping::new();
            }
        };
        match serde_json::from_slice::<Mapping>(&data) {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!(
                    "checkpoint {} is not valid, starting from empty: {err}",
                    self.path.display()
                );
                Mapping::new()
            }
        }
    }

    fn write_atomic(&self, data: &[u8]) -> Result<(), CheckpointError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CheckpointError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let written = (|| {
            let mut file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
            file.write_all(data).map_err(io_err(&tmp_path))?;
            file.sync_all().map_err(io_err(&tmp_path))?;
            drop(file);
            fs::rename(&tmp_path, &self.path).map_err(io_err(&self.path))
        })();
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ErrorCounts;

    fn interrupted(block: u64) -> ScanState {
        let mut state = ScanState::started(0, 99);
        state.interrupt_block = Some(block);
        state.errors = ErrorCounts::new(1, 2, 3);
        state
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path().join("absent.conf"));
        assert_eq!(store.load("sda"), None);
    }

    #[test]
    fn corrupt_file_loads_nothing_and_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkdisk.conf");
        fs::write(&path, b"{ not json").expect("write");
        let store = CheckpointStore::new(&path);
        assert_eq!(store.load("sda"), None);

        store.save("sda", Some(&interrupted(42))).expect("save");
        assert_eq!(store.load("sda"), Some(interrupted(42)));
    }

    #[test]
    fn save_none_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkdisk.conf");
        let store = CheckpointStore::new(&path);
        store.save("sda", None).expect("save");
        assert!(!path.exists());
    }

    #[test]
    fn saving_one_device_preserves_others() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path().join("checkdisk.conf"));
        let sda = interrupted(42);
        let sdb = ScanState::started(0, 500);

        store.save("sda", Some(&sda)).expect("save sda");
        store.save("sdb", Some(&sdb)).expect("save sdb");

        assert_eq!(store.load("sda"), Some(sda));
        assert_eq!(store.load("sdb"), Some(sdb));
    }

    #[test]
    fn foreign_entry_content_survives_update() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkdisk.conf");
        fs::write(
            &path,
            br#"{"nvme0n1": {"from": 0, "to": 10, "note": "kept", "errors": [0, 0, 0]}}"#,
        )
        .expect("write");
        let store = CheckpointStore::new(&path);
        store.save("sda", Some(&interrupted(7))).expect("save");

        let raw: Value = serde_json::from_slice(&fs::read(&path).expect("read")).expect("json");
        assert_eq!(raw["nvme0n1"]["note"], "kept");
        assert_eq!(raw["sda"]["interrupt_block"], 7);
        assert!(raw["sda"]["saved_at"].is_string());
    }

    #[test]
    fn malformed_entry_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkdisk.conf");
        fs::write(&path, br#"{"sda": {"from": "zero"}}"#).expect("write");
        let store = CheckpointStore::new(&path);
        assert_eq!(store.load("sda"), None);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state").join("nested").join("checkdisk.conf");
        let store = CheckpointStore::new(&path);
        store.save("sda", Some(&interrupted(1))).expect("save");
        assert!(path.exists());
        assert!(!dir.path().join("state/nested/checkdisk.conf.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkdisk.conf");
        fs::create_dir(&path).expect("mkdir");
        let store = CheckpointStore::new(&path);

        let err = store.save("sda", Some(&interrupted(3))).expect_err("rename onto a directory");
        assert!(matches!(err, CheckpointError::Io { .. }));
        assert!(!dir.path().join("checkdisk.conf.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn loads_entries_with_capitalised_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkdisk.conf");
        fs::write(
            &path,
            br#"{"sda": {"From": 0, "To": 99, "InterruptBlock": 42, "Errors": [1, 2, 3]}}"#,
        )
        .expect("write");
        let store = CheckpointStore::new(&path);
        assert_eq!(store.load("sda"), Some(interrupted(42)));

        store.save("sdb", Some(&ScanState::started(0, 5))).expect("save");
        assert_eq!(store.load("sda"), Some(interrupted(42)));
    }
}
