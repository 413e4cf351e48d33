// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Hit log storage operations.

use rusqlite::{params, OptionalExtension};

use super::{HitStore, Storage, StorageError, StoredRecord};

impl HitStore for Storage {
    fn append(&self, data: &str) -> Result<i64, StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO hits (data, created_at) VALUES (?1, ?2)",
            params![data, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn peek(&self) -> Result<Option<StoredRecord>, StorageError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, data FROM hits ORDER BY id ASC LIMIT 1",
                [],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn remove(&self, id: i64) -> Result<bool, StorageError> {
        let rows_affected = self
            .conn
            .lock()
            .execute("DELETE FROM hits WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let rows_affected = self.conn.lock().execute("DELETE FROM hits", [])?;
        Ok(rows_affected)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM hits", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Converts database row to StoredRecord.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        id: row.get(0)?,
        data: row.get(1)?,
    })
}
