//! JSON file backing the registry: `{"alarms": {"<id>": record}}`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alarm::AlarmRecord;

use super::error::{RegistryError, Result};

#[derive(Deserialize)]
struct StoreFile {
    #[serde(default)]
    alarms: IndexMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    alarms: &'a IndexMap<String, AlarmRecord>,
}

/// File-backed alarm store.
#[derive(Debug, Clone)]
pub struct AlarmStore {
    path: PathBuf,
}

impl AlarmStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read raw entries keyed by id. A missing file is an empty store;
    /// unknown top-level keys are ignored. Entries are returned unparsed so
    /// the caller can skip malformed ones individually.
    pub fn read(&self) -> Result<IndexMap<String, serde_json::Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "alarm store does not exist yet");
                return Ok(IndexMap::new());
            }
            Err(e) => return Err(self.load_error(e.to_string())),
        };
        if contents.trim().is_empty() {
            return Ok(IndexMap::new());
        }
        let file: StoreFile =
            serde_json::from_str(&contents).map_err(|e| self.load_error(e.to_string()))?;
        Ok(file.alarms)
    }

    /// Overwrite the store atomically (temp file + rename).
    pub fn write(&self, records: &IndexMap<String, AlarmRecord>) -> Result<()> {
        self.write_inner(records).map_err(|source| RegistryError::Persistence {
            path: self.path.clone(),
            source,
        })
    }

    fn write_inner(&self, records: &IndexMap<String, AlarmRecord>) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&StoreFileRef { alarms: records })?;
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), count = records.len(), "wrote alarm store");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "alarms.json".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn load_error(&self, reason: String) -> RegistryError {
        RegistryError::Load {
            path: self.path.clone(),
            reason,
        }
    }
}
