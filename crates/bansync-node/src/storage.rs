//! Persistent state using RocksDB.
//!
//! Three JSON documents under a fixed namespace: the global ban table, the
//! synced target list and the schedule config.

use crate::error::Result;
use crate::models::{Registry, ScheduleConfig, TargetRef, TargetSet};
use rocksdb::{Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const GLOBAL_BANS_KEY: &str = "bansync:global_bans";
const SYNCED_TARGETS_KEY: &str = "bansync:synced_targets";
const SCHEDULE_KEY: &str = "bansync:schedule";

/// Storage backend for node state.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    // --- Global bans ---

    pub fn load_registry(&self) -> Result<Option<Registry>> {
        self.get_json(GLOBAL_BANS_KEY)
    }

    pub fn save_registry(&self, registry: &Registry) -> Result<()> {
        self.put_json(GLOBAL_BANS_KEY, registry)
    }

    // --- Synced targets ---

    pub fn load_targets(&self) -> Result<Option<TargetSet>> {
        self.get_json(SYNCED_TARGETS_KEY)
    }

    pub fn save_targets(&self, targets: &TargetSet) -> Result<()> {
        self.put_json(SYNCED_TARGETS_KEY, targets)
    }

    // --- Schedule ---

    pub fn load_schedule(&self) -> Result<Option<ScheduleConfig>> {
        self.get_json(SCHEDULE_KEY)
    }

    pub fn save_schedule(&self, config: &ScheduleConfig) -> Result<()> {
        self.put_json(SCHEDULE_KEY, config)
    }

    /// Write defaults for any record that is absent. Existing records are kept.
    ///
    /// `initial_targets` seeds the synced list on first run.
    pub fn init_defaults(&self, initial_targets: &[TargetRef]) -> Result<()> {
        if self.load_registry()?.is_none() {
            self.save_registry(&Registry::new())?;
        }
        if self.load_targets()?.is_none() {
            self.save_targets(&TargetSet::from(initial_targets.to_vec()))?;
        }
        if self.load_schedule()?.is_none() {
            self.save_schedule(&ScheduleConfig::default())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BanRecord, Cadence, SubjectId};
    use bansync_duration::Lifetime;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn fresh_store_is_empty() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        assert!(storage.load_registry().unwrap().is_none());
        assert!(storage.load_targets().unwrap().is_none());
        assert!(storage.load_schedule().unwrap().is_none());
    }

    #[test]
    fn init_defaults_seeds_targets_once() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.init_defaults(&[TargetRef(1), TargetRef(2)]).unwrap();
        assert_eq!(storage.load_targets().unwrap().unwrap().len(), 2);
        assert_eq!(
            storage.load_schedule().unwrap().unwrap().cadence,
            Cadence::Weekly
        );

        // A second start must not clobber what is there.
        storage.init_defaults(&[TargetRef(3)]).unwrap();
        let targets = storage.load_targets().unwrap().unwrap();
        assert!(targets.contains(TargetRef(1)));
        assert!(!targets.contains(TargetRef(3)));
    }

    #[test]
    fn registry_survives_reopen() {
        let dir = tempdir().unwrap();
        let mut registry = Registry::new();
        registry.insert(
            BanRecord::new(SubjectId(5), "eve".into(), None, &Lifetime::Permanent, Utc::now())
                .unwrap(),
        );

        {
            let storage = Storage::open(dir.path()).unwrap();
            storage.save_registry(&registry).unwrap();
        }

        let storage = Storage::open(dir.path()).unwrap();
        assert_eq!(storage.load_registry().unwrap().unwrap(), registry);
    }
}
