//! SQLite-backed durable preference store.
//!
//! # Responsibility
//! - Persist string/int/float preferences in the `preferences` table.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - One row per key; writes are single-statement upserts.
//! - `value_kind` is the source of truth for which value column is set.

use crate::db::migrations::latest_version;
use crate::store::{KeyValueStore, StoreError, StoreResult, ValueKind};
use rusqlite::{params, Connection, OptionalExtension};

const UPSERT_SQL: &str = "INSERT INTO preferences (key, value_kind, text_value, int_value, real_value)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(key) DO UPDATE SET
        value_kind = excluded.value_kind,
        text_value = excluded.text_value,
        int_value = excluded.int_value,
        real_value = excluded.real_value,
        updated_at = (strftime('%s', 'now') * 1000);";

/// Preference store over a migrated connection.
pub struct SqliteKvStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKvStore<'conn> {
    /// Creates a store from a connection returned by `open_db*`.
    ///
    /// # Errors
    /// - `Unavailable` when the connection was not migrated to the latest
    ///   schema version.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if version != latest_version() {
            return Err(StoreError::Unavailable(format!(
                "preference store requires schema version {}, got {version}",
                latest_version()
            )));
        }
        Ok(Self { conn })
    }

    fn read_kind(&self, key: &str) -> StoreResult<Option<ValueKind>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT value_kind FROM preferences WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        kind.map(|value| {
            ValueKind::parse(&value).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "unknown value kind `{value}` in preferences.value_kind"
                ))
            })
        })
        .transpose()
    }

    fn ensure_kind(&self, key: &str, expected: ValueKind) -> StoreResult<bool> {
        match self.read_kind(key)? {
            None => Ok(false),
            Some(found) if found == expected => Ok(true),
            Some(found) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected,
                found,
            }),
        }
    }

    fn read_column<T>(&self, key: &str, expected: ValueKind, column: &str) -> StoreResult<Option<T>>
    where
        T: rusqlite::types::FromSql,
    {
        if !self.ensure_kind(key, expected)? {
            return Ok(None);
        }
        let value: Option<T> = self.conn.query_row(
            &format!("SELECT {column} FROM preferences WHERE key = ?1;"),
            [key],
            |row| row.get(0),
        )?;
        value.map(Some).ok_or_else(|| {
            StoreError::InvalidData(format!("preferences.{column} is NULL for key `{key}`"))
        })
    }
}

impl KeyValueStore for SqliteKvStore<'_> {
    fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        self.read_column(key, ValueKind::String, "text_value")
    }

    fn set_string(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            UPSERT_SQL,
            params![key, ValueKind::String.as_str(), value, None::<i64>, None::<f64>],
        )?;
        Ok(())
    }

    fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        self.read_column(key, ValueKind::Int, "int_value")
    }

    fn set_int(&mut self, key: &str, value: i64) -> StoreResult<()> {
        self.conn.execute(
            UPSERT_SQL,
            params![key, ValueKind::Int.as_str(), None::<String>, value, None::<f64>],
        )?;
        Ok(())
    }

    fn get_float(&self, key: &str) -> StoreResult<Option<f64>> {
        self.read_column(key, ValueKind::Float, "real_value")
    }

    fn set_float(&mut self, key: &str, value: f64) -> StoreResult<()> {
        self.conn.execute(
            UPSERT_SQL,
            params![key, ValueKind::Float.as_str(), None::<String>, None::<i64>, value],
        )?;
        Ok(())
    }

    fn has_key(&self, key: &str) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM preferences WHERE key = ?1);",
            [key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn delete_key(&mut self, key: &str) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM preferences WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn flush(&mut self) -> StoreResult<()> {
        // Autocommit mode: every upsert is already durable once it returns.
        if !self.conn.is_autocommit() {
            return Err(StoreError::Unavailable(
                "preference connection has an open transaction".to_string(),
            ));
        }
        Ok(())
    }
}
