//! Collections, auth records and one-time passwords.

use argon2::password_hash::{
    rand_core::OsRng, Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier,
    SaltString,
};
use argon2::Argon2;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::ServiceError;

/// Name of the built-in collection holding privileged accounts.
pub const SUPERUSERS: &str = "_superusers";

/// Alphabet used for generated one-time passwords.
pub const OTP_ALPHABET: &[u8] = b"0123456789";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 72;

/// One-time password settings of an auth collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub enabled: bool,
    /// Number of characters in a generated password.
    pub length: usize,
    /// Seconds a password stays valid.
    pub duration_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            length: 8,
            duration_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Base,
    Auth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub kind: CollectionKind,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub system: bool,
}

impl Collection {
    /// Create a new auth collection with default OTP settings.
    pub fn new_auth(name: &str) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            kind: CollectionKind::Auth,
            otp: OtpConfig::default(),
            system: false,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind == CollectionKind::Auth
    }

    /// Match by id, or by name ignoring case.
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.id == name_or_id || self.name.eq_ignore_ascii_case(name_or_id)
    }
}

/// An account belonging to an auth collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub collection_id: String,
    email: String,
    password_hash: String,
    pub created: u64,
    pub updated: u64,
}

impl Record {
    pub(crate) fn new(collection: &Collection) -> Self {
        let now = unix_now();
        Self {
            id: new_id(),
            collection_id: collection.id.clone(),
            email: String::new(),
            password_hash: String::new(),
            created: now,
            updated: now,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: &str) {
        self.email = email.trim().to_string();
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    /// Hash and store a new password.
    pub fn set_password(&mut self, password: &str) -> Result<(), ServiceError> {
        check_password_len(password)?;
        self.password_hash = hash_secret(password)?;
        Ok(())
    }

    /// Whether `candidate` matches the stored password.
    pub fn validate_password(&self, candidate: &str) -> bool {
        verify_secret(&self.password_hash, candidate)
    }

    pub(crate) fn touch(&mut self) {
        self.updated = unix_now();
    }
}

/// A one-time password issued for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Otp {
    pub id: String,
    pub collection_ref: String,
    pub record_ref: String,
    password_hash: String,
    pub created: u64,
}

impl Otp {
    /// New OTP bound to `record` and its collection. The password still needs
    /// to be set.
    pub fn new(record: &Record) -> Self {
        Self {
            id: new_id(),
            collection_ref: record.collection_id.clone(),
            record_ref: record.id.clone(),
            password_hash: String::new(),
            created: unix_now(),
        }
    }

    pub fn set_password(&mut self, password: &str) -> Result<(), ServiceError> {
        if password.is_empty() {
            return Err(ServiceError::Validation("otp password cannot be blank".into()));
        }
        self.password_hash = hash_secret(password)?;
        Ok(())
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    pub fn validate_password(&self, candidate: &str) -> bool {
        verify_secret(&self.password_hash, candidate)
    }

    /// Whether the OTP outlived `duration_secs` at `now`.
    pub fn is_expired(&self, duration_secs: u64, now: u64) -> bool {
        self.created.saturating_add(duration_secs) < now
    }
}

/// Random string of `length` characters drawn from `alphabet`.
pub fn random_string_with_alphabet(length: usize, alphabet: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .filter_map(|_| alphabet.choose(&mut rng).map(|b| *b as char))
        .collect()
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn check_password_len(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ServiceError::Validation(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_secret(input: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| ServiceError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_secret(expected_hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(expected_hash) else {
        return false;
    };
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(PasswordHashError::Password) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}
