//! Flat key-value preference store contracts and implementations.
//!
//! # Responsibility
//! - Define the string-keyed store the persistence layer writes through.
//! - Provide an in-memory store and a SQLite-backed durable store.
//!
//! # Invariants
//! - Each `set_*` call overwrites exactly one key; there are no multi-key
//!   transactions, so a crash mid-save leaves the previous value intact.
//! - Reading a key with the wrong accessor is a `TypeMismatch`, never a
//!   silent conversion.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Kind of value held under one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Int,
    Float,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            _ => None,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from key-value store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// The key holds a value of a different kind.
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
    /// The store cannot be reached at all.
    Unavailable(String),
    /// Stored row cannot be converted to a value.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TypeMismatch {
                key,
                expected,
                found,
            } => write!(f, "key `{key}` holds {found}, expected {expected}"),
            Self::Unavailable(message) => write!(f, "preference store unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid preference data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::TypeMismatch { .. } => None,
            Self::Unavailable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// String-keyed store for strings, integers and floats.
pub trait KeyValueStore {
    fn get_string(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_string(&mut self, key: &str, value: &str) -> StoreResult<()>;
    fn get_int(&self, key: &str) -> StoreResult<Option<i64>>;
    fn set_int(&mut self, key: &str, value: i64) -> StoreResult<()>;
    fn get_float(&self, key: &str) -> StoreResult<Option<f64>>;
    fn set_float(&mut self, key: &str, value: f64) -> StoreResult<()>;
    fn has_key(&self, key: &str) -> StoreResult<bool>;
    /// Deletes `key`; returns whether it existed.
    fn delete_key(&mut self, key: &str) -> StoreResult<bool>;
    /// Commits buffered writes to durable storage.
    fn flush(&mut self) -> StoreResult<()>;
}
