//! Record-set wire formats.
//!
//! # Responsibility
//! - Encode a full record set into one string stored under one key.
//! - Decode stored strings without ever aborting the whole load.
//!
//! # Invariants
//! - `decode(encode(R)) == R` exactly for every valid record set `R`.
//! - A malformed record is skipped and reported; its neighbours survive.
//! - Decoding detects the format from the text, so legacy data stays
//!   readable whatever format is configured for writing.

use crate::model::record::{ObjectId, ObjectRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod legacy;
pub mod structured;

/// Format used when writing a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// Versioned, self-describing JSON envelope.
    #[default]
    Structured,
    /// Positional delimited text kept for compatibility with old saves.
    Legacy,
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding.
#[derive(Debug)]
pub enum CodecError {
    Json(serde_json::Error),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "failed to encode record set: {err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// One record (or envelope) that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Zero-based position of the record in the stored text.
    pub index: usize,
    pub reason: String,
}

impl DecodeWarning {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Decoded records plus everything that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    pub records: BTreeMap<ObjectId, ObjectRecord>,
    pub warnings: Vec<DecodeWarning>,
}

impl DecodeReport {
    /// Inserts a decoded record; a repeated identity keeps the later one.
    fn accept(&mut self, index: usize, record: ObjectRecord) {
        if let Err(err) = record.validate() {
            self.warnings.push(DecodeWarning::new(index, err.to_string()));
            return;
        }
        if let Some(previous) = self.records.insert(record.id, record) {
            self.warnings.push(DecodeWarning::new(
                index,
                format!("duplicate identity {}; later record wins", previous.id),
            ));
        }
    }
}

/// Encodes `records` in `format`.
pub fn encode<'a, I>(format: RecordFormat, records: I) -> CodecResult<String>
where
    I: IntoIterator<Item = &'a ObjectRecord>,
{
    match format {
        RecordFormat::Structured => structured::encode(records),
        RecordFormat::Legacy => Ok(legacy::encode(records)),
    }
}

/// Decodes text written in either format.
pub fn decode(text: &str) -> DecodeReport {
    match detect_format(text) {
        RecordFormat::Structured => structured::decode(text),
        RecordFormat::Legacy => legacy::decode(text),
    }
}

/// Structured payloads are JSON objects; anything else is legacy text.
pub fn detect_format(text: &str) -> RecordFormat {
    if text.trim_start().starts_with('{') {
        RecordFormat::Structured
    } else {
        RecordFormat::Legacy
    }
}
