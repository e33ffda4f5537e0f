//! [`AlarmRegistry`]: lock-guarded alarm map with write-through persistence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::alarm::{Alarm, AlarmConfig, AlarmRecord, AlarmUpdate};

use super::error::{CreateFailure, CreateReport, LoadReport, RegistryError, Result, SkippedEntry};
use super::store::AlarmStore;

struct Inner {
    alarms: IndexMap<String, Alarm>,
    /// Bumped on every structural mutation.
    version: u64,
}

/// The authoritative alarm set for the process lifetime.
///
/// Shared by reference (`Arc<AlarmRegistry>`) between the monitor loop and
/// the HTTP handlers. Every mutation is applied under one mutex and then
/// flushed to the [`AlarmStore`] outside it. A failed flush leaves the
/// registry dirty; the next flush writes the full current snapshot.
pub struct AlarmRegistry {
    store: AlarmStore,
    inner: Mutex<Inner>,
    /// Version most recently written to disk. Held across the file write so
    /// writers are serialized and an older snapshot never overwrites a newer one.
    flushed: Mutex<u64>,
}

impl AlarmRegistry {
    /// Create an empty registry backed by `path`. Call [`load`](Self::load)
    /// to pick up persisted alarms.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: AlarmStore::new(path),
            inner: Mutex::new(Inner {
                alarms: IndexMap::new(),
                version: 0,
            }),
            flushed: Mutex::new(0),
        }
    }

    /// Construct and load in one step.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, LoadReport)> {
        let registry = Self::new(path);
        let report = registry.load()?;
        Ok((registry, report))
    }

    pub fn store(&self) -> &AlarmStore {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("alarm registry lock poisoned")
    }

    // ── Load / persist ──────────────────────────────────────────────

    /// Replace the in-memory map with the persisted store.
    ///
    /// Each entry is reconstructed independently; a malformed entry is
    /// logged and skipped. An unreadable or non-JSON file is an error.
    pub fn load(&self) -> Result<LoadReport> {
        let raw = self.store.read()?;
        let mut report = LoadReport::default();
        let mut alarms = IndexMap::with_capacity(raw.len());

        for (key, value) in raw {
            let alarm = serde_json::from_value::<AlarmConfig>(value)
                .map_err(|e| e.to_string())
                .and_then(|config| Alarm::from_config(&config).map_err(|e| e.to_string()));
            match alarm {
                Ok(alarm) => {
                    if alarm.id() != key {
                        warn!(stored_id = %key, alarm_id = %alarm.id(), "stored id does not match serial_channel, using derived id");
                    }
                    alarms.insert(alarm.id().to_string(), alarm);
                }
                Err(reason) => {
                    warn!(alarm_id = %key, error = %reason, "skipping malformed alarm entry");
                    report.skipped.push(SkippedEntry { id: key, reason });
                }
            }
        }

        report.loaded = alarms.len();
        let version = {
            let mut inner = self.lock();
            inner.alarms = alarms;
            inner.version += 1;
            inner.version
        };
        *self.flushed.lock().expect("flushed version lock poisoned") = version;

        info!(
            path = %self.store.path().display(),
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "loaded alarms"
        );
        Ok(report)
    }

    /// Write the current snapshot to disk, unless a newer one already was.
    pub fn persist(&self) -> Result<()> {
        let (version, records) = {
            let inner = self.lock();
            let records: IndexMap<String, AlarmRecord> = inner
                .alarms
                .iter()
                .map(|(id, alarm)| (id.clone(), alarm.to_record()))
                .collect();
            (inner.version, records)
        };

        let mut flushed = self.flushed.lock().expect("flushed version lock poisoned");
        if *flushed > version {
            return Ok(());
        }
        match self.store.write(&records) {
            Ok(()) => {
                *flushed = version;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "alarm store flush failed, registry is dirty");
                Err(e)
            }
        }
    }

    /// Whether the in-memory map has changes the store does not.
    pub fn is_dirty(&self) -> bool {
        let version = self.lock().version;
        version > *self.flushed.lock().expect("flushed version lock poisoned")
    }

    /// Retry a failed flush. No-op when clean.
    pub fn persist_if_dirty(&self) -> Result<()> {
        if self.is_dirty() {
            self.persist()
        } else {
            Ok(())
        }
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Validate and insert a batch.
    ///
    /// Every record is validated on its own before the lock is taken. Valid
    /// records are inserted together; a record whose id already exists
    /// replaces it (last write wins within the batch). Returns
    /// `Persistence` if the flush fails, in which case the records are in
    /// memory but not on disk.
    pub fn create(&self, configs: &[AlarmConfig]) -> Result<CreateReport> {
        let mut report = CreateReport::default();
        let mut valid = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            match Alarm::from_config(config) {
                Ok(alarm) => valid.push(alarm),
                Err(e) => {
                    warn!(index, error = %e, "rejected alarm definition");
                    report.failed.push(CreateFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }
        if valid.is_empty() {
            return Ok(report);
        }

        let (created, replaced) = self.insert_all(valid);
        report.created = created;
        report.replaced = replaced;
        self.persist()?;
        Ok(report)
    }

    /// Validate and insert one alarm, surfacing the validation error.
    pub fn create_one(&self, config: &AlarmConfig) -> Result<String> {
        let alarm = Alarm::from_config(config)?;
        let (mut created, _) = self.insert_all(vec![alarm]);
        self.persist()?;
        Ok(created.remove(0))
    }

    fn insert_all(&self, alarms: Vec<Alarm>) -> (Vec<String>, Vec<String>) {
        let mut created: Vec<String> = Vec::with_capacity(alarms.len());
        let mut replaced: Vec<String> = Vec::new();
        {
            let mut inner = self.lock();
            for mut alarm in alarms {
                let id = alarm.id().to_string();
                if let Some(previous) = inner.alarms.get(&id) {
                    alarm.set_logger_name(previous.logger_name().map(str::to_string));
                    if !replaced.contains(&id) {
                        replaced.push(id.clone());
                    }
                }
                inner.alarms.insert(id.clone(), alarm);
                if !created.contains(&id) {
                    created.push(id);
                }
            }
            inner.version += 1;
        }
        for id in &replaced {
            info!(alarm_id = %id, "replaced existing alarm");
        }
        info!(count = created.len(), "created alarms");
        (created, replaced)
    }

    /// Merge a partial update into alarm `id` and return the result.
    ///
    /// The merge is computed and swapped in under the lock, so readers see
    /// either the old alarm or the new one. If serial or channel changes,
    /// the alarm moves to its new id; moving onto an existing id is a
    /// `Conflict`.
    pub fn update(&self, id: &str, update: &AlarmUpdate) -> Result<Alarm> {
        let next = {
            let mut inner = self.lock();
            let current = inner
                .alarms
                .get(id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            let next = current.apply_update(update)?;
            if next.id() != id {
                if inner.alarms.contains_key(next.id()) {
                    return Err(RegistryError::Conflict(next.id().to_string()));
                }
                inner.alarms.shift_remove(id);
                inner.alarms.insert(next.id().to_string(), next.clone());
            } else if let Some(slot) = inner.alarms.get_mut(id) {
                *slot = next.clone();
            }
            inner.version += 1;
            next
        };
        info!(alarm_id = %id, new_id = %next.id(), "updated alarm");
        self.persist()?;
        Ok(next)
    }

    pub fn delete(&self, id: &str) -> Result<Alarm> {
        let removed = {
            let mut inner = self.lock();
            let removed = inner
                .alarms
                .shift_remove(id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            inner.version += 1;
            removed
        };
        info!(alarm_id = %id, "deleted alarm");
        self.persist()?;
        Ok(removed)
    }

    /// Attach resolved logger names by serial. Names are display-only and
    /// never persisted, so this does not mark the registry dirty.
    pub fn set_logger_names(&self, names: &HashMap<String, String>) {
        let mut inner = self.lock();
        for alarm in inner.alarms.values_mut() {
            alarm.set_logger_name(names.get(alarm.serial()).cloned());
        }
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Alarm> {
        self.lock().alarms.get(id).cloned()
    }

    /// Copy of the whole map. Not kept current.
    pub fn snapshot(&self) -> IndexMap<String, Alarm> {
        self.lock().alarms.clone()
    }

    pub fn active_alarms(&self) -> Vec<Alarm> {
        self.lock()
            .alarms
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    /// Distinct logger serials referenced by any alarm, in registry order.
    pub fn serials(&self) -> Vec<String> {
        let inner = self.lock();
        let mut serials: Vec<String> = Vec::new();
        for alarm in inner.alarms.values() {
            if !serials.iter().any(|s| s == alarm.serial()) {
                serials.push(alarm.serial().to_string());
            }
        }
        serials
    }

    pub fn len(&self) -> usize {
        self.lock().alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().alarms.is_empty()
    }
}
