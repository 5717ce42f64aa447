//! Storage collaborator.
//!
//! The verifier never talks to a database directly. It writes new hashes
//! through [`CredentialStore`] and drops stale cache entries the same way.

use core::fmt;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use thiserror::Error;

/// Table holding user records.
pub const USERS_TABLE: &str = "users";

/// Cache group user records are stored under.
pub const USERS_CACHE_GROUP: &str = "users";

/// Identifier of a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Columns written when a credential is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialFields<'a> {
    /// New password hash
    pub password_hash: &'a str,
    /// Pending-activation marker; empty clears it
    pub activation_key: &'a str,
}

/// Storage failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write went through but matched no record
    #[error("no user record with id {0}")]
    NotFound(UserId),

    /// The backend refused or failed the write
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence layer holding user credentials.
pub trait CredentialStore {
    /// Write `fields` to the row of `table` identified by `user_id`.
    ///
    /// Returns the number of rows changed.
    fn update(
        &self,
        table: &str,
        fields: &CredentialFields<'_>,
        user_id: UserId,
    ) -> Result<u64, StoreError>;

    /// Drop any cached copy of the user's record.
    fn invalidate_cache(&self, user_id: UserId, group: &str);
}

impl<T: CredentialStore + ?Sized> CredentialStore for &T {
    fn update(
        &self,
        table: &str,
        fields: &CredentialFields<'_>,
        user_id: UserId,
    ) -> Result<u64, StoreError> {
        (**self).update(table, fields, user_id)
    }

    fn invalidate_cache(&self, user_id: UserId, group: &str) {
        (**self).invalidate_cache(user_id, group);
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn update(
        &self,
        table: &str,
        fields: &CredentialFields<'_>,
        user_id: UserId,
    ) -> Result<u64, StoreError> {
        (**self).update(table, fields, user_id)
    }

    fn invalidate_cache(&self, user_id: UserId, group: &str) {
        (**self).invalidate_cache(user_id, group);
    }
}

/// A stored user credential
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    /// Stored password hash
    pub password_hash: String,
    /// Pending-activation marker
    pub activation_key: String,
}

/// In-memory [`CredentialStore`], counting every call it receives.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<UserId, UserRecord>>,
    invalidations: Mutex<Vec<UserId>>,
    updates: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub fn insert(&self, user_id: UserId, record: UserRecord) {
        self.lock_records().insert(user_id, record);
    }

    /// Current record for `user_id`.
    #[must_use]
    pub fn record(&self, user_id: UserId) -> Option<UserRecord> {
        self.lock_records().get(&user_id).cloned()
    }

    /// Number of update calls received, including failed ones.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Users whose cache entries were invalidated, in call order.
    #[must_use]
    pub fn invalidations(&self) -> Vec<UserId> {
        self.invalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every following write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, UserRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryStore {
    fn update(
        &self,
        table: &str,
        fields: &CredentialFields<'_>,
        user_id: UserId,
    ) -> Result<u64, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("writes are disabled".into()));
        }
        if table != USERS_TABLE {
            return Err(StoreError::Backend(format!("unknown table {table:?}")));
        }

        let mut records = self.lock_records();
        let Some(record) = records.get_mut(&user_id) else {
            return Ok(0);
        };
        record.password_hash = fields.password_hash.to_owned();
        record.activation_key = fields.activation_key.to_owned();
        Ok(1)
    }

    fn invalidate_cache(&self, user_id: UserId, _group: &str) {
        self.invalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(user_id);
    }
}
