//! Embedded record service.
//!
//! # Data Flow
//! ```text
//! Service::new(settings)
//!     → bootstrap()          (load data_dir/data.json, ensure _superusers)
//!     → server::serve()      (serve hooks → publish handler → accept)
//!     → terminate()          (terminate hooks → reset_bootstrap_state)
//! ```
//!
//! The lifecycle adapter and the admin API only use the operations exposed
//! here: collection lookup, auth record lookup by email, record creation,
//! save and delete, OTP persistence, and the serve/terminate hooks.

pub mod hooks;
pub mod records;
pub mod server;
pub mod store;
pub mod validate;

use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

pub use hooks::{ServeEvent, ServeHook, ServeSlot, TerminateHook};
pub use records::{Collection, CollectionKind, Otp, OtpConfig, Record, SUPERUSERS};
pub use server::{serve, ServeConfig};
use store::Store;

/// Errors returned by record operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("service is not bootstrapped")]
    NotBootstrapped,
}

/// Construction settings for the embedded service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
}

/// The embedded backend: a record store plus its lifecycle hooks.
pub struct Service {
    settings: ServiceSettings,
    store: Store,
    bootstrapped: AtomicBool,
    serve_slot: ServeSlot,
    serve_hooks: Mutex<Vec<ServeHook>>,
    terminate_hooks: Mutex<Vec<TerminateHook>>,
}

impl Service {
    pub fn new(settings: ServiceSettings) -> Self {
        let store = Store::new(&settings.data_dir);
        Self {
            settings,
            store,
            bootstrapped: AtomicBool::new(false),
            serve_slot: ServeSlot::new(),
            serve_hooks: Mutex::new(Vec::new()),
            terminate_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.settings.data_dir
    }

    /// Load persisted state and make sure the system collections exist.
    /// Calling it on a bootstrapped service is a no-op.
    pub fn bootstrap(&self) -> Result<(), ServiceError> {
        if self.is_bootstrapped() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.settings.data_dir)
            .map_err(|e| ServiceError::Storage(format!("data dir: {}", e)))?;
        self.store.load()?;

        if self.store.find_collection(SUPERUSERS).is_none() {
            let mut superusers = Collection::new_auth(SUPERUSERS);
            superusers.system = true;
            self.store.upsert_collection(&superusers)?;
            tracing::info!(collection = SUPERUSERS, "Created system collection");
        }

        self.bootstrapped.store(true, Ordering::SeqCst);
        tracing::info!(
            data_dir = %self.data_dir().display(),
            snapshot = %self.store.path().display(),
            "Embedded service bootstrapped"
        );
        Ok(())
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::SeqCst)
    }

    /// Flush and release the store so a later `bootstrap` starts clean.
    pub fn reset_bootstrap_state(&self) -> Result<(), ServiceError> {
        if !self.bootstrapped.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.store.close()
    }

    pub fn find_collection(&self, name_or_id: &str) -> Result<Collection, ServiceError> {
        self.ensure_bootstrapped()?;
        self.store
            .find_collection(name_or_id)
            .ok_or_else(|| ServiceError::NotFound(format!("collection {:?}", name_or_id)))
    }

    pub fn save_collection(&self, collection: &Collection) -> Result<(), ServiceError> {
        self.ensure_bootstrapped()?;
        if collection.name.trim().is_empty() {
            return Err(ServiceError::Validation("collection name cannot be blank".into()));
        }
        if collection.otp.enabled && !(4..=32).contains(&collection.otp.length) {
            return Err(ServiceError::Validation(
                "otp length must be between 4 and 32".into(),
            ));
        }
        self.store.upsert_collection(collection)
    }

    /// Find an auth record by email (case-insensitive) within `collection`,
    /// given by name or id.
    pub fn find_auth_record_by_email(
        &self,
        collection: &str,
        email: &str,
    ) -> Result<Record, ServiceError> {
        let collection = self.find_collection(collection)?;
        if !collection.is_auth() {
            return Err(ServiceError::Validation(format!(
                "{:?} is not an auth collection",
                collection.name
            )));
        }
        self.store
            .find_record_by_email(&collection.id, email)
            .ok_or_else(|| ServiceError::NotFound(format!("record with email {:?}", email)))
    }

    pub fn find_record(&self, id: &str) -> Result<Record, ServiceError> {
        self.ensure_bootstrapped()?;
        self.store
            .find_record(id)
            .ok_or_else(|| ServiceError::NotFound(format!("record {:?}", id)))
    }

    /// Fresh, unsaved record belonging to `collection`.
    pub fn new_record(&self, collection: &Collection) -> Record {
        Record::new(collection)
    }

    pub fn count_records(&self, collection: &str) -> Result<usize, ServiceError> {
        let collection = self.find_collection(collection)?;
        Ok(self.store.count_records(&collection.id))
    }

    /// Validate and persist `record`.
    pub fn save(&self, record: &Record) -> Result<(), ServiceError> {
        let collection = self.find_collection(&record.collection_id)?;
        if collection.is_auth() {
            if !validate::is_email(record.email()) {
                return Err(ServiceError::Validation("invalid email address".into()));
            }
            if !record.has_password() {
                return Err(ServiceError::Validation("password cannot be blank".into()));
            }
        }

        let mut record = record.clone();
        record.touch();
        self.store.upsert_record(&record)
    }

    pub fn delete(&self, record: &Record) -> Result<(), ServiceError> {
        self.ensure_bootstrapped()?;
        if self.store.remove_record(&record.id)? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("record {:?}", record.id)))
        }
    }

    pub fn save_otp(&self, otp: &Otp) -> Result<(), ServiceError> {
        self.ensure_bootstrapped()?;
        if !otp.has_password() {
            return Err(ServiceError::Validation("otp password cannot be blank".into()));
        }
        self.store
            .find_record(&otp.record_ref)
            .filter(|r| r.collection_id == otp.collection_ref)
            .ok_or_else(|| ServiceError::NotFound(format!("record {:?}", otp.record_ref)))?;
        self.store.upsert_otp(otp)
    }

    /// Generate and store a one-time password for `record`.
    ///
    /// The code has the collection's configured length over
    /// [`records::OTP_ALPHABET`]. Only its hash is stored; the plaintext is
    /// returned to the caller.
    pub fn issue_otp(&self, record: &Record) -> Result<(Otp, String), ServiceError> {
        let collection = self.find_collection(&record.collection_id)?;
        if !collection.otp.enabled {
            return Err(ServiceError::Conflict(format!(
                "OTP is not enabled for the {} collection",
                collection.name
            )));
        }

        let pass = records::random_string_with_alphabet(collection.otp.length, records::OTP_ALPHABET);
        let mut otp = Otp::new(record);
        otp.set_password(&pass)?;
        self.save_otp(&otp)?;
        Ok((otp, pass))
    }

    pub fn find_otp(&self, id: &str) -> Result<Otp, ServiceError> {
        self.ensure_bootstrapped()?;
        self.store
            .find_otp(id)
            .ok_or_else(|| ServiceError::NotFound(format!("otp {:?}", id)))
    }

    pub fn otps_for_record(&self, record: &Record) -> Vec<Otp> {
        self.store.otps_for_record(&record.id)
    }

    pub fn delete_otp(&self, otp: &Otp) -> Result<(), ServiceError> {
        self.ensure_bootstrapped()?;
        self.store.remove_otp(&otp.id).map(|_| ())
    }

    /// Readiness promise resolved with the handler once serving starts.
    pub fn on_serve(&self) -> &ServeSlot {
        &self.serve_slot
    }

    /// Register a hook that can extend the router before serving.
    pub fn bind_serve_hook<F>(&self, hook: F)
    where
        F: Fn(Router, &ServeEvent) -> Router + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.serve_hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }

    pub(crate) fn apply_serve_hooks(&self, mut router: Router, event: &ServeEvent) -> Router {
        if let Ok(hooks) = self.serve_hooks.lock() {
            for hook in hooks.iter() {
                router = hook(router, event);
            }
        }
        router
    }

    /// Register a hook run by [`Service::terminate`].
    pub fn on_terminate<F>(&self, hook: F)
    where
        F: Fn(&Service) -> Result<(), ServiceError> + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.terminate_hooks.lock() {
            hooks.push(Box::new(hook));
        }
    }

    /// Run the terminate hooks in registration order, then reset the
    /// bootstrap state. The reset always runs; every failure is returned, the
    /// reset's last.
    pub fn terminate(&self) -> Result<(), Vec<ServiceError>> {
        let mut failures = Vec::new();
        if let Ok(hooks) = self.terminate_hooks.lock() {
            for hook in hooks.iter() {
                if let Err(e) = hook(self) {
                    tracing::warn!(error = %e, "Terminate hook failed");
                    failures.push(e);
                }
            }
        }

        if let Err(e) = self.reset_bootstrap_state() {
            tracing::warn!(error = %e, "Store flush on terminate failed");
            failures.push(e);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    fn ensure_bootstrapped(&self) -> Result<(), ServiceError> {
        if self.is_bootstrapped() {
            Ok(())
        } else {
            Err(ServiceError::NotBootstrapped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrapped(dir: &Path) -> Service {
        let service = Service::new(ServiceSettings {
            data_dir: dir.to_path_buf(),
        });
        service.bootstrap().unwrap();
        service
    }

    #[test]
    fn test_bootstrap_creates_superusers() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        let superusers = service.find_collection(SUPERUSERS).unwrap();
        assert!(superusers.is_auth());
        assert!(superusers.system);
        assert!(!superusers.otp.enabled);
        assert!(dir.path().join(store::SNAPSHOT_FILE).exists());
    }

    #[test]
    fn test_operations_require_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let service = Service::new(ServiceSettings {
            data_dir: dir.path().to_path_buf(),
        });
        assert!(matches!(
            service.find_collection(SUPERUSERS),
            Err(ServiceError::NotBootstrapped)
        ));
    }

    #[test]
    fn test_save_and_find_by_email() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        let superusers = service.find_collection(SUPERUSERS).unwrap();

        let mut record = service.new_record(&superusers);
        record.set_email("a@b.com");
        record.set_password("secret123").unwrap();
        service.save(&record).unwrap();

        let found = service.find_auth_record_by_email(SUPERUSERS, "a@b.com").unwrap();
        assert_eq!(found.id, record.id);
        assert!(found.validate_password("secret123"));
    }

    #[test]
    fn test_save_rejects_missing_password() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        let superusers = service.find_collection(SUPERUSERS).unwrap();

        let mut record = service.new_record(&superusers);
        record.set_email("a@b.com");
        assert!(matches!(
            service.save(&record),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_terminate_runs_hooks_then_resets() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        service.on_terminate(|_| Err(ServiceError::Storage("hook failed".into())));
        service.on_terminate(|_| Err(ServiceError::Storage("second hook failed".into())));

        let failures = service.terminate().unwrap_err();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].to_string().contains("hook failed"));
        assert!(failures[1].to_string().contains("second hook failed"));
        assert!(!service.is_bootstrapped());

        service.bootstrap().unwrap();
        assert!(service.find_collection(SUPERUSERS).is_ok());
    }

    #[test]
    fn test_terminate_reports_flush_failure_after_hook_failure() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        service.on_terminate(|_| Err(ServiceError::Storage("hook failed".into())));

        // A non-empty directory where the snapshot lives makes the final rename fail.
        let snapshot = dir.path().join(store::SNAPSHOT_FILE);
        std::fs::remove_file(&snapshot).unwrap();
        std::fs::create_dir_all(snapshot.join("blocker")).unwrap();

        let failures = service.terminate().unwrap_err();
        assert_eq!(failures.len(), 2, "{:?}", failures);
        assert!(failures[0].to_string().contains("hook failed"));
        assert!(matches!(failures[1], ServiceError::Storage(_)));
        assert!(!service.is_bootstrapped());
    }

    #[test]
    fn test_issue_otp_uses_collection_length() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        let mut superusers = service.find_collection(SUPERUSERS).unwrap();

        let mut record = service.new_record(&superusers);
        record.set_email("a@b.com");
        record.set_password("secret123").unwrap();
        service.save(&record).unwrap();

        assert!(matches!(
            service.issue_otp(&record),
            Err(ServiceError::Conflict(_))
        ));

        superusers.otp.enabled = true;
        superusers.otp.length = 6;
        service.save_collection(&superusers).unwrap();

        let (otp, pass) = service.issue_otp(&record).unwrap();
        assert_eq!(pass.len(), 6);
        assert!(pass.bytes().all(|b| records::OTP_ALPHABET.contains(&b)), "{}", pass);
        assert!(otp.validate_password(&pass));
        assert_eq!(otp.record_ref, record.id);
        assert_eq!(otp.collection_ref, superusers.id);
        assert!(service.find_otp(&otp.id).unwrap().validate_password(&pass));
    }

    #[test]
    fn test_otp_collection_validation() {
        let dir = tempfile::tempdir().unwrap();
        let service = bootstrapped(dir.path());
        let mut superusers = service.find_collection(SUPERUSERS).unwrap();
        superusers.otp.enabled = true;
        superusers.otp.length = 2;
        assert!(service.save_collection(&superusers).is_err());

        superusers.otp.length = 6;
        service.save_collection(&superusers).unwrap();
        assert_eq!(service.find_collection(SUPERUSERS).unwrap().otp.length, 6);
    }
}
