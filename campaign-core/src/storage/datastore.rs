// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Data store operations.

use rusqlite::{params, OptionalExtension};

use super::{DataStore, Storage, StorageError};

impl DataStore for Storage {
    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock();
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT string_value FROM data_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO data_store (key, string_value, long_value)
             VALUES (?1, ?2, NULL)",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_long(&self, key: &str) -> Result<Option<i64>, StorageError> {
        let conn = self.conn.lock();
        let value: Option<Option<i64>> = conn
            .query_row(
                "SELECT long_value FROM data_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn set_long(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO data_store (key, string_value, long_value)
             VALUES (?1, NULL, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute("DELETE FROM data_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn remove_all(&self) -> Result<(), StorageError> {
        self.conn.lock().execute("DELETE FROM data_store", [])?;
        Ok(())
    }
}
