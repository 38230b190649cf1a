//! Persistent unit store.
//!
//! Installed units survive restarts through `units.toml` in the storage
//! directory. Each entry records the unit's id, location, activator,
//! lifecycle state and the translation of its current revision. Wiring is
//! never stored: it is recomputed by a fresh resolve once every unit has
//! been reloaded.
//!
//! # Format
//!
//! TOML with `schema_version = 1`, the next unit id to allocate and a flat
//! `[[unit]]` array of [`StoredUnit`] entries.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trellis_core::UnitId;

use crate::error::{RuntimeError, RuntimeResult};
use crate::graph::RevisionGraph;
use crate::unit::{Translation, UnitState};

/// Current store schema version.
const SCHEMA_VERSION: u32 = 1;

/// Store file name inside the storage directory.
pub const STORE_FILE_NAME: &str = "units.toml";

/// On-disk snapshot of installed units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
    schema_version: u32,
    /// Next unit id to allocate.
    pub next_unit_id: u64,
    /// Stored units.
    #[serde(default, rename = "unit")]
    pub units: Vec<StoredUnit>,
}

/// One persisted unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUnit {
    /// Unit id.
    pub id: UnitId,
    /// Install location.
    pub location: String,
    /// Activator name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activator: Option<String>,
    /// Lifecycle state. Transitional states are stored as their target.
    pub state: UnitState,
    /// Install time.
    pub installed_at: DateTime<Utc>,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
    /// Translation of the current revision.
    pub revision: Translation,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            next_unit_id: 1,
            units: Vec::new(),
        }
    }
}

impl StoreFile {
    /// Capture every installed, non-system unit of `graph`.
    #[must_use]
    pub fn snapshot(graph: &RevisionGraph) -> Self {
        let units = graph
            .records()
            .filter(|r| !r.id.is_system() && r.state != UnitState::Uninstalled)
            .filter_map(|record| {
                let current = record.current?;
                let revision = graph.revision(current)?;
                let state = match record.state {
                    UnitState::Starting | UnitState::Active => UnitState::Active,
                    UnitState::Stopping | UnitState::Resolved => UnitState::Resolved,
                    other => other,
                };
                Some(StoredUnit {
                    id: record.id,
                    location: record.location.clone(),
                    activator: record.activator.clone(),
                    state,
                    installed_at: record.installed_at,
                    modified_at: record.modified_at,
                    revision: revision.translation().clone(),
                })
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION,
            next_unit_id: graph.next_unit_id(),
            units,
        }
    }
}

/// Handle to `units.toml` in a storage directory.
#[derive(Debug, Clone)]
pub struct UnitStore {
    path: PathBuf,
}

impl UnitStore {
    /// A store rooted at `dir`.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(STORE_FILE_NAME),
        }
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, message: String) -> RuntimeError {
        RuntimeError::Store {
            path: self.path.clone(),
            message,
        }
    }

    /// Load the store, returning an empty one if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] if the file exists but cannot be read
    /// or parsed.
    pub fn load_or_default(&self) -> RuntimeResult<StoreFile> {
        let _lock_guard = acquire_lock_file(&self.path, LockMode::Shared)?;

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreFile::default()),
            Err(e) => return Err(self.error(format!("failed to read unit store: {e}"))),
        };

        let file: StoreFile = toml::from_str(&content)
            .map_err(|e| self.error(format!("failed to parse unit store: {e}")))?;
        if file.schema_version != SCHEMA_VERSION {
            warn!(
                path = %self.path.display(),
                found = file.schema_version,
                expected = SCHEMA_VERSION,
                "Unit store schema version mismatch, attempting best-effort load"
            );
        }
        debug!(path = %self.path.display(), units = file.units.len(), "Loaded unit store");
        Ok(file)
    }

    /// Write the store atomically.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] if the directory cannot be created or
    /// the file cannot be written and renamed into place.
    pub fn save(&self, file: &StoreFile) -> RuntimeResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| self.error(format!("failed to create storage directory: {e}")))?;
        }
        let _lock_guard = acquire_lock_file(&self.path, LockMode::Exclusive)?;

        let header = "# Written by trellis. Do not edit while the framework is running.\n\n";
        let body = toml::to_string_pretty(file)
            .map_err(|e| self.error(format!("failed to serialize unit store: {e}")))?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| self.error(format!("failed to create temp file for atomic write: {e}")))?;
        tmp.write_all(format!("{header}{body}").as_bytes())
            .map_err(|e| self.error(format!("failed to write temp unit store: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| self.error(format!("failed to sync temp unit store: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| self.error(format!("failed to replace unit store: {e}")))?;

        debug!(path = %self.path.display(), units = file.units.len(), "Saved unit store");
        Ok(())
    }

    /// Delete the store file, if present.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Store`] if the file exists but cannot be
    /// removed.
    pub fn clear(&self) -> RuntimeResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(format!("failed to remove unit store: {e}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Lock the `.lk` sibling of `path`.
///
/// Readers never create the lock file: if it is missing there is no writer
/// to coordinate with.
fn acquire_lock_file(path: &Path, mode: LockMode) -> RuntimeResult<Option<std::fs::File>> {
    let lock_path = path.with_extension("lk");
    let store_err = |message: String| RuntimeError::Store {
        path: path.to_path_buf(),
        message,
    };

    match mode {
        LockMode::Shared => match std::fs::OpenOptions::new().read(true).open(&lock_path) {
            Ok(lock_file) => {
                lock_file
                    .lock_shared()
                    .map_err(|e| store_err(format!("failed to acquire shared file lock: {e}")))?;
                Ok(Some(lock_file))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(format!("failed to open lock file: {e}"))),
        },
        LockMode::Exclusive => {
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .map_err(|e| store_err(format!("failed to create lock file: {e}")))?;
            lock_file
                .lock_exclusive()
                .map_err(|e| store_err(format!("failed to acquire exclusive file lock: {e}")))?;
            Ok(Some(lock_file))
        },
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Version;

    use super::*;
    use crate::unit::RevisionKind;

    fn stored(id: u64, state: UnitState) -> StoredUnit {
        StoredUnit {
            id: UnitId(id),
            location: format!("mem:{id}"),
            activator: Some("demo".into()),
            state,
            installed_at: Utc::now(),
            modified_at: Utc::now(),
            revision: Translation {
                symbolic_name: format!("unit{id}"),
                version: Version::new(1, 0, 0),
                kind: RevisionKind::Normal,
                activator: None,
                capabilities: Vec::new(),
                requirements: Vec::new(),
                required_ee: Vec::new(),
            },
        }
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnitStore::new(dir.path());
        let file = store.load_or_default().unwrap();
        assert!(file.units.is_empty());
        assert_eq!(file.next_unit_id, 1);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnitStore::new(&dir.path().join("nested"));
        let file = StoreFile {
            next_unit_id: 7,
            units: vec![stored(3, UnitState::Active), stored(5, UnitState::Installed)],
            ..StoreFile::default()
        };
        store.save(&file).unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("# Written by trellis"));
        assert!(content.contains("[[unit]]"));

        let loaded = store.load_or_default().unwrap();
        assert_eq!(loaded.next_unit_id, 7);
        assert_eq!(loaded.units.len(), 2);
        assert_eq!(loaded.units[0].state, UnitState::Active);
        assert_eq!(loaded.units[1].revision.symbolic_name, "unit5");
    }

    #[test]
    fn test_corrupt_store_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnitStore::new(dir.path());
        std::fs::write(store.path(), "schema_version = [").unwrap();
        assert!(matches!(
            store.load_or_default(),
            Err(RuntimeError::Store { .. })
        ));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = UnitStore::new(dir.path());
        store.save(&StoreFile::default()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }
}
