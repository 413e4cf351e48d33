// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! Provides the durable key/value collection (registration record, rules URL)
//! and the durable hit log. Both are exposed through small traits so that
//! policy and retry logic can run against the in-memory fakes in tests.

mod datastore;
mod error;
mod hits;
mod memory;
pub mod migration;

pub use error::{StorageError, StoredRecord};
pub use memory::{MemoryDataStore, MemoryHitStore};

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// Durable string/long key-value collection.
pub trait DataStore: Send + Sync {
    /// Reads a string value.
    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a string value, replacing any previous value.
    fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Reads a long value.
    fn get_long(&self, key: &str) -> Result<Option<i64>, StorageError>;

    /// Writes a long value, replacing any previous value.
    fn set_long(&self, key: &str, value: i64) -> Result<(), StorageError>;

    /// Removes a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key in the collection.
    fn remove_all(&self) -> Result<(), StorageError>;
}

/// Durable FIFO of opaque hit records.
pub trait HitStore: Send + Sync {
    /// Appends a record and returns its insertion id.
    fn append(&self, data: &str) -> Result<i64, StorageError>;

    /// Returns the oldest record without removing it.
    fn peek(&self) -> Result<Option<StoredRecord>, StorageError>;

    /// Removes a record by id. Returns false if it was already gone.
    fn remove(&self, id: i64) -> Result<bool, StorageError>;

    /// Removes every record.
    fn clear(&self) -> Result<usize, StorageError>;

    /// Number of pending records.
    fn count(&self) -> Result<usize, StorageError>;
}

/// SQLite-based storage implementation.
///
/// One connection guarded by a mutex; every operation is a single statement,
/// so callers on different threads never observe partial writes.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let storage = Storage {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Creates an in-memory storage (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Runs all pending schema migrations.
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        migration::MigrationRunner::run(&conn, &migration::all_migrations())
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        let conn = self.conn.lock();
        migration::MigrationRunner::current_version(&conn)
    }
}
