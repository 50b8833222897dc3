//! In-memory record store persisted as a JSON snapshot in the data directory.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::records::{Collection, Otp, Record};
use super::ServiceError;

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "data.json";

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    collections: Vec<Collection>,
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    otps: Vec<Otp>,
}

/// Concurrent maps keyed by id, flushed to disk after every write.
///
/// Writers are serialized through `write_lock` so uniqueness checks and the
/// snapshot they produce stay consistent; readers never block on it.
pub struct Store {
    path: PathBuf,
    collections: DashMap<String, Collection>,
    records: DashMap<String, Record>,
    otps: DashMap<String, Otp>,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SNAPSHOT_FILE),
            collections: DashMap::new(),
            records: DashMap::new(),
            otps: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory state with the snapshot on disk, if any.
    pub fn load(&self) -> Result<(), ServiceError> {
        let _guard = self.lock()?;
        self.clear_maps();

        if !self.path.exists() {
            return Ok(());
        }

        let file = File::open(&self.path).map_err(storage_err)?;
        let snapshot: Snapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(storage_err)?;

        for c in snapshot.collections {
            self.collections.insert(c.id.clone(), c);
        }
        for r in snapshot.records {
            self.records.insert(r.id.clone(), r);
        }
        for o in snapshot.otps {
            self.otps.insert(o.id.clone(), o);
        }

        tracing::debug!(
            path = %self.path.display(),
            collections = self.collections.len(),
            records = self.records.len(),
            "Loaded record snapshot"
        );
        Ok(())
    }

    /// Write the current state to disk and drop it from memory.
    pub fn close(&self) -> Result<(), ServiceError> {
        let _guard = self.lock()?;
        let result = self.flush();
        self.clear_maps();
        result
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.collections.iter().map(|c| c.value().clone()).collect()
    }

    pub fn find_collection(&self, name_or_id: &str) -> Option<Collection> {
        if let Some(c) = self.collections.get(name_or_id) {
            return Some(c.value().clone());
        }
        self.collections
            .iter()
            .find(|c| c.value().matches(name_or_id))
            .map(|c| c.value().clone())
    }

    pub fn upsert_collection(&self, collection: &Collection) -> Result<(), ServiceError> {
        let _guard = self.lock()?;
        let taken = self
            .collections
            .iter()
            .any(|c| c.id != collection.id && c.name.eq_ignore_ascii_case(&collection.name));
        if taken {
            return Err(ServiceError::Conflict(format!(
                "collection name {:?} is already in use",
                collection.name
            )));
        }
        self.collections
            .insert(collection.id.clone(), collection.clone());
        self.flush()
    }

    pub fn find_record(&self, id: &str) -> Option<Record> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn find_record_by_email(&self, collection_id: &str, email: &str) -> Option<Record> {
        self.records
            .iter()
            .find(|r| r.collection_id == collection_id && r.email().eq_ignore_ascii_case(email))
            .map(|r| r.value().clone())
    }

    pub fn count_records(&self, collection_id: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.collection_id == collection_id)
            .count()
    }

    /// Insert or replace `record`, rejecting an email already used by another
    /// record of the same collection.
    pub fn upsert_record(&self, record: &Record) -> Result<(), ServiceError> {
        let _guard = self.lock()?;
        let taken = self.records.iter().any(|r| {
            r.id != record.id
                && r.collection_id == record.collection_id
                && r.email().eq_ignore_ascii_case(record.email())
        });
        if taken {
            return Err(ServiceError::Conflict(format!(
                "email {:?} is already in use",
                record.email()
            )));
        }
        self.records.insert(record.id.clone(), record.clone());
        self.flush()
    }

    /// Remove a record together with the OTPs issued for it.
    pub fn remove_record(&self, id: &str) -> Result<bool, ServiceError> {
        let _guard = self.lock()?;
        if self.records.remove(id).is_none() {
            return Ok(false);
        }
        self.otps.retain(|_, o| o.record_ref != id);
        self.flush()?;
        Ok(true)
    }

    pub fn find_otp(&self, id: &str) -> Option<Otp> {
        self.otps.get(id).map(|o| o.value().clone())
    }

    pub fn otps_for_record(&self, record_id: &str) -> Vec<Otp> {
        self.otps
            .iter()
            .filter(|o| o.record_ref == record_id)
            .map(|o| o.value().clone())
            .collect()
    }

    pub fn upsert_otp(&self, otp: &Otp) -> Result<(), ServiceError> {
        let _guard = self.lock()?;
        self.otps.insert(otp.id.clone(), otp.clone());
        self.flush()
    }

    pub fn remove_otp(&self, id: &str) -> Result<bool, ServiceError> {
        let _guard = self.lock()?;
        let removed = self.otps.remove(id).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, ServiceError> {
        self.write_lock
            .lock()
            .map_err(|_| ServiceError::Storage("store lock poisoned".into()))
    }

    fn clear_maps(&self) {
        self.collections.clear();
        self.records.clear();
        self.otps.clear();
    }

    /// Atomic write: temp file next to the snapshot, then rename.
    fn flush(&self) -> Result<(), ServiceError> {
        let snapshot = Snapshot {
            collections: self.collections(),
            records: self.records.iter().map(|r| r.value().clone()).collect(),
            otps: self.otps.iter().map(|o| o.value().clone()).collect(),
        };

        let tmp = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).map_err(storage_err)?;
            serde_json::to_writer(BufWriter::new(file), &snapshot).map_err(storage_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::records::SUPERUSERS;

    fn record_with_email(collection: &Collection, email: &str) -> Record {
        let mut record = Record::new(collection);
        record.set_email(email);
        record
    }

    #[test]
    fn test_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let collection = Collection::new_auth(SUPERUSERS);
        store.upsert_collection(&collection).unwrap();
        store
            .upsert_record(&record_with_email(&collection, "a@b.com"))
            .unwrap();
        store.close().unwrap();
        assert!(store.find_collection(SUPERUSERS).is_none());

        let reopened = Store::new(dir.path());
        reopened.load().unwrap();
        let found = reopened.find_record_by_email(&collection.id, "A@B.com");
        assert!(found.is_some());
        assert_eq!(reopened.count_records(&collection.id), 1);
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let collection = Collection::new_auth(SUPERUSERS);
        store.upsert_collection(&collection).unwrap();

        store
            .upsert_record(&record_with_email(&collection, "a@b.com"))
            .unwrap();
        let err = store
            .upsert_record(&record_with_email(&collection, "a@b.com"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_remove_record_drops_its_otps() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let collection = Collection::new_auth(SUPERUSERS);
        let record = record_with_email(&collection, "a@b.com");
        store.upsert_collection(&collection).unwrap();
        store.upsert_record(&record).unwrap();

        let otp = Otp::new(&record);
        store.upsert_otp(&otp).unwrap();
        assert_eq!(store.otps_for_record(&record.id).len(), 1);

        assert!(store.remove_record(&record.id).unwrap());
        assert!(store.find_otp(&otp.id).is_none());
        assert!(!store.remove_record(&record.id).unwrap());
    }
}
