//! Record-set persistence over a key-value store.
//!
//! # Responsibility
//! - Save the full record collection under one key, then flush.
//! - Load and decode the collection, reporting skipped records.
//! - Allocate object identities from a persisted counter.
//!
//! # Invariants
//! - `save` overwrites the key; it never merges with what is stored.
//! - Store failures never abort: the last encoded snapshot stays in memory
//!   and one `StoreUnavailable` diagnostic is recorded per outage.
//! - An identity handed out by `allocate_id` is never handed out again by
//!   this store, even after the object is deleted.
//! - When `load` could not read the durable collection, neither the
//!   collection nor the counter is written until `recover` has read them.

use crate::codec::{self, RecordFormat};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::model::record::{ObjectId, ObjectRecord};
use crate::store::KeyValueStore;
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::fmt::Display;

pub mod migrate;
pub mod scheduler;

/// Key holding the next identity to hand out.
pub const NEXT_ID_KEY: &str = "pagebook.next_object_id";

/// Identities start at 1 so 0 never appears in stored data.
const FIRST_OBJECT_ID: u64 = 1;

/// How much of the durable state this session has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurableView {
    /// `load` has not run; `save` overwrites as usual.
    NotLoaded,
    Read,
    /// `load` failed before reading the collection and counter.
    Missed,
}

/// Durable collection read back after it was missed at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct DurableState {
    pub records: BTreeMap<ObjectId, ObjectRecord>,
    /// First identity the durable store had not handed out.
    pub next_id: ObjectId,
}

pub struct PersistenceStore<S: KeyValueStore> {
    store: S,
    key: String,
    format: RecordFormat,
    next_id: u64,
    session_snapshot: Option<String>,
    degraded: bool,
    durable: DurableView,
}

impl<S: KeyValueStore> PersistenceStore<S> {
    pub fn new(store: S, key: impl Into<String>, format: RecordFormat) -> Self {
        Self {
            store,
            key: key.into(),
            format,
            next_id: FIRST_OBJECT_ID,
            session_snapshot: None,
            degraded: false,
            durable: DurableView::NotLoaded,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Encodes `records` in the configured format.
    pub fn encode(&self, records: &BTreeMap<ObjectId, ObjectRecord>) -> codec::CodecResult<String> {
        codec::encode(self.format, records.values())
    }

    /// Decodes stored text in either format.
    pub fn decode(&self, text: &str) -> codec::DecodeReport {
        codec::decode(text)
    }

    /// Overwrites the stored collection with `records` and flushes.
    ///
    /// Returns `true` when the write reached the store. On failure the
    /// encoded text is still kept as the session snapshot. Nothing is
    /// written while the durable collection is unread, see `recover`.
    pub fn save(
        &mut self,
        records: &BTreeMap<ObjectId, ObjectRecord>,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let encoded = match self.encode(records) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(
                    "event=save_records module=persist status=error key={} error={err}",
                    self.key
                );
                return false;
            }
        };

        if self.durable == DurableView::Missed {
            self.session_snapshot = Some(encoded);
            self.report_unavailable(
                "save_records",
                "durable collection not read yet",
                diagnostics,
            );
            return false;
        }

        let written = self
            .store
            .set_string(&self.key, &encoded)
            .and_then(|_| self.store.flush());
        self.session_snapshot = Some(encoded);

        match written {
            Ok(()) => {
                self.mark_available();
                info!(
                    "event=save_records module=persist status=ok key={} count={}",
                    self.key,
                    records.len()
                );
                true
            }
            Err(err) => {
                self.report_unavailable("save_records", err, diagnostics);
                false
            }
        }
    }

    /// Loads the stored collection; a missing key yields an empty set.
    ///
    /// Skipped records are reported as `MalformedRecord`. When the store is
    /// unreachable the session snapshot (if any) is decoded instead and the
    /// durable state counts as missed until `recover` succeeds.
    pub fn load(&mut self, diagnostics: &mut Diagnostics) -> BTreeMap<ObjectId, ObjectRecord> {
        let text = match self.store.get_string(&self.key) {
            Ok(text) => Some(text),
            Err(err) => {
                self.report_unavailable("load_records", err, diagnostics);
                None
            }
        };
        let counter_read = self.load_next_id(diagnostics);

        match (&text, counter_read) {
            (Some(_), true) => {
                self.mark_available();
                self.durable = DurableView::Read;
            }
            _ if self.durable != DurableView::Read => self.durable = DurableView::Missed,
            _ => {}
        }

        let records = match text.unwrap_or_else(|| self.session_snapshot.clone()) {
            Some(text) => self.decode_reporting(&text, diagnostics),
            None => BTreeMap::new(),
        };
        if let Some(max_id) = records.keys().next_back() {
            self.prime_next_id(*max_id);
        }
        info!(
            "event=load_records module=persist status=ok key={} count={} next_id={}",
            self.key,
            records.len(),
            self.next_id
        );
        records
    }

    /// Whether the durable collection was missed at load time and must be
    /// read back before anything is written.
    pub fn needs_recovery(&self) -> bool {
        self.durable == DurableView::Missed
    }

    /// Reads the durable collection and counter that `load` missed.
    ///
    /// Returns `None` when nothing was missed or the store is still down.
    /// On success future identities start past both the durable records and
    /// the durable counter, and writes are allowed again.
    pub fn recover(&mut self, diagnostics: &mut Diagnostics) -> Option<DurableState> {
        if self.durable != DurableView::Missed {
            return None;
        }
        let read = self
            .store
            .get_string(&self.key)
            .and_then(|text| Ok((text, self.store.get_int(NEXT_ID_KEY)?)));
        let (text, stored_next) = match read {
            Ok(read) => read,
            Err(err) => {
                self.report_unavailable("recover_records", err, diagnostics);
                return None;
            }
        };
        self.mark_available();
        self.durable = DurableView::Read;

        let records = text
            .map(|text| self.decode_reporting(&text, diagnostics))
            .unwrap_or_default();
        let mut durable_next = FIRST_OBJECT_ID;
        if let Some(stored) = stored_next.and_then(|value| u64::try_from(value).ok()) {
            durable_next = durable_next.max(stored);
        }
        if let Some(max_id) = records.keys().next_back() {
            durable_next = durable_next.max(max_id.0.saturating_add(1));
        }
        self.next_id = self.next_id.max(durable_next);
        info!(
            "event=recover_records module=persist status=ok key={} count={} next_id={}",
            self.key,
            records.len(),
            self.next_id
        );
        Some(DurableState {
            records,
            next_id: ObjectId(durable_next),
        })
    }

    /// Hands out a fresh identity and persists the advanced counter.
    ///
    /// A store failure is reported but the identity is still valid for this
    /// session.
    pub fn allocate_id(&mut self, diagnostics: &mut Diagnostics) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        if self.durable == DurableView::Missed {
            debug!(
                "event=store_next_id module=persist status=deferred next_id={}",
                self.next_id
            );
        } else {
            self.store_next_id(diagnostics);
        }
        id
    }

    /// Ensures future identities are strictly greater than `seen`.
    pub fn prime_next_id(&mut self, seen: ObjectId) {
        self.next_id = self.next_id.max(seen.0.saturating_add(1));
    }

    pub fn next_id(&self) -> ObjectId {
        ObjectId(self.next_id)
    }

    /// Whether the last store operation failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Last encoded collection, whether or not it reached the store.
    pub fn session_snapshot(&self) -> Option<&str> {
        self.session_snapshot.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn decode_reporting(
        &self,
        text: &str,
        diagnostics: &mut Diagnostics,
    ) -> BTreeMap<ObjectId, ObjectRecord> {
        let report = self.decode(text);
        for warning in report.warnings {
            diagnostics.record(Diagnostic::MalformedRecord {
                index: warning.index,
                reason: warning.reason,
            });
        }
        report.records
    }

    /// Returns whether the counter could be read.
    fn load_next_id(&mut self, diagnostics: &mut Diagnostics) -> bool {
        match self.store.get_int(NEXT_ID_KEY) {
            Ok(stored) => {
                if let Some(stored) = stored.and_then(|value| u64::try_from(value).ok()) {
                    self.next_id = self.next_id.max(stored);
                }
                true
            }
            Err(err) => {
                self.report_unavailable("load_next_id", err, diagnostics);
                false
            }
        }
    }

    fn store_next_id(&mut self, diagnostics: &mut Diagnostics) {
        let value = i64::try_from(self.next_id).unwrap_or(i64::MAX);
        if let Err(err) = self
            .store
            .set_int(NEXT_ID_KEY, value)
            .and_then(|_| self.store.flush())
        {
            self.report_unavailable("store_next_id", err, diagnostics);
        }
    }

    /// Records `StoreUnavailable` once per outage; repeats are debug lines.
    fn report_unavailable(
        &mut self,
        operation: &'static str,
        message: impl Display,
        diagnostics: &mut Diagnostics,
    ) {
        if self.degraded {
            debug!("event={operation} module=persist status=degraded error={message}");
        } else {
            diagnostics.record(Diagnostic::StoreUnavailable {
                operation,
                message: message.to_string(),
            });
        }
        self.degraded = true;
    }

    fn mark_available(&mut self) {
        if self.degraded {
            info!(
                "event=store_recovered module=persist status=ok key={}",
                self.key
            );
        }
        self.degraded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{PersistenceStore, NEXT_ID_KEY};
    use crate::codec::RecordFormat;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};
    use crate::model::geometry::{Transform, Vec3};
    use crate::model::record::{ObjectId, ObjectKind, ObjectRecord, Payload};
    use crate::scene::path::ContainerPath;
    use crate::store::{KeyValueStore, MemoryKvStore};
    use std::collections::BTreeMap;

    fn sample_records() -> BTreeMap<ObjectId, ObjectRecord> {
        let record = ObjectRecord::new(
            ObjectId(4),
            ObjectKind::Tab,
            ContainerPath::parse("Canvas/pages/page2/cards2"),
            Some(0),
        )
        .with_transform(Transform::at(Vec3::new(1.5, -2.25, 0.0)))
        .with_payload(Payload::Text("hello".to_string()));
        BTreeMap::from([(record.id, record)])
    }

    #[test]
    fn load_of_missing_key_is_empty() {
        let mut persist = PersistenceStore::new(MemoryKvStore::new(), "scene", RecordFormat::Structured);
        let mut diagnostics = Diagnostics::new();
        assert!(persist.load(&mut diagnostics).is_empty());
        assert!(diagnostics.is_empty());
        assert_eq!(persist.next_id(), ObjectId(1));
    }

    #[test]
    fn save_twice_writes_identical_text() {
        let backing = MemoryKvStore::new();
        let mut persist = PersistenceStore::new(backing.clone(), "scene", RecordFormat::Legacy);
        let mut diagnostics = Diagnostics::new();
        let records = sample_records();

        assert!(persist.save(&records, &mut diagnostics));
        let first = backing.get_string("scene").unwrap();
        assert!(persist.save(&records, &mut diagnostics));
        let second = backing.get_string("scene").unwrap();

        assert_eq!(first, second);
        assert_eq!(backing.flush_count(), 2);
        assert_eq!(persist.load(&mut diagnostics), records);
    }

    #[test]
    fn unavailable_store_keeps_session_snapshot() {
        let backing = MemoryKvStore::new();
        let mut persist = PersistenceStore::new(backing.clone(), "scene", RecordFormat::Structured);
        let mut diagnostics = Diagnostics::new();
        backing.set_available(false);

        assert!(!persist.save(&sample_records(), &mut diagnostics));
        assert!(persist.is_degraded());
        assert!(persist.session_snapshot().is_some());
        assert_eq!(persist.load(&mut diagnostics), sample_records());
        assert!(!persist.save(&sample_records(), &mut diagnostics));
        assert_eq!(diagnostics.count(DiagnosticKind::StoreUnavailable), 1);
    }

    #[test]
    fn missed_load_blocks_writes_until_recovered() {
        let backing = MemoryKvStore::new();
        let mut diagnostics = Diagnostics::new();
        {
            let mut persist = PersistenceStore::new(backing.clone(), "scene", RecordFormat::Structured);
            persist.save(&sample_records(), &mut diagnostics);
            persist.prime_next_id(ObjectId(8));
            persist.allocate_id(&mut diagnostics);
        }

        backing.set_available(false);
        let mut persist = PersistenceStore::new(backing.clone(), "scene", RecordFormat::Structured);
        assert!(persist.load(&mut diagnostics).is_empty());
        assert!(persist.needs_recovery());
        assert_eq!(persist.allocate_id(&mut diagnostics), ObjectId(1));

        backing.set_available(true);
        assert!(!persist.save(&BTreeMap::new(), &mut diagnostics));
        assert_eq!(backing.get_int(NEXT_ID_KEY).unwrap(), Some(10));
        assert_eq!(
            backing.get_string("scene").unwrap().map(|text| persist.decode(&text).records),
            Some(sample_records())
        );

        let durable = persist.recover(&mut diagnostics).unwrap();
        assert_eq!(durable.records, sample_records());
        assert_eq!(durable.next_id, ObjectId(10));
        assert!(!persist.needs_recovery());
        assert_eq!(persist.allocate_id(&mut diagnostics), ObjectId(10));
        assert!(persist.recover(&mut diagnostics).is_none());
    }

    #[test]
    fn identities_are_primed_past_loaded_records_and_persisted() {
        let backing = MemoryKvStore::new();
        let mut diagnostics = Diagnostics::new();
        {
            let mut persist = PersistenceStore::new(backing.clone(), "scene", RecordFormat::Structured);
            persist.save(&sample_records(), &mut diagnostics);
        }

        let mut persist = PersistenceStore::new(backing.clone(), "scene", RecordFormat::Structured);
        persist.load(&mut diagnostics);
        assert_eq!(persist.allocate_id(&mut diagnostics), ObjectId(5));
        assert_eq!(backing.get_int(NEXT_ID_KEY).unwrap(), Some(6));
    }
}
