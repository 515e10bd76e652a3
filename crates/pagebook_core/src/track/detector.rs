//! Snapshot-diff change detection.
//!
//! # Responsibility
//! - Remember the last recorded snapshot of every tracked object.
//! - Classify each evaluation pass into added, updated and removed identities.
//!
//! # Invariants
//! - At most one snapshot is kept per identity (last write wins).
//! - Transform comparison is exact (bitwise `f32`), without tolerance.
//! - Added and updated are disjoint by construction: an identity is added
//!   only when it was not tracked before this pass.

use crate::model::record::{ObjectId, ObjectRecord};
use std::collections::{BTreeMap, BTreeSet};

/// One classified change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Added(ObjectId),
    Updated(ObjectId),
    Removed(ObjectId),
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: BTreeSet<ObjectId>,
    pub updated: BTreeSet<ObjectId>,
    pub removed: BTreeSet<ObjectId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Events in a stable order: removals, then additions, then updates.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.removed
            .iter()
            .map(|id| ChangeEvent::Removed(*id))
            .chain(self.added.iter().map(|id| ChangeEvent::Added(*id)))
            .chain(self.updated.iter().map(|id| ChangeEvent::Updated(*id)))
            .collect()
    }
}

/// Tracks last-known snapshots and diffs them against live state.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    tracked: BTreeMap<ObjectId, ObjectRecord>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `records` without reporting them as added.
    pub fn with_baseline<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ObjectRecord>,
    {
        Self {
            tracked: records.into_iter().map(|record| (record.id, record)).collect(),
        }
    }

    /// Diffs `current` against tracked snapshots and adopts `current`.
    pub fn evaluate<I>(&mut self, current: I) -> ChangeSet
    where
        I: IntoIterator<Item = ObjectRecord>,
    {
        let current: BTreeMap<ObjectId, ObjectRecord> =
            current.into_iter().map(|record| (record.id, record)).collect();
        let mut changes = ChangeSet::default();

        self.tracked.retain(|id, _| {
            let present = current.contains_key(id);
            if !present {
                changes.removed.insert(*id);
            }
            present
        });

        for (id, record) in current {
            match self.tracked.get(&id) {
                Some(previous) if !record_differs(previous, &record) => {}
                Some(_) => {
                    changes.updated.insert(id);
                    self.tracked.insert(id, record);
                }
                None => {
                    changes.added.insert(id);
                    self.tracked.insert(id, record);
                }
            }
        }

        changes
    }

    /// Stops tracking `id` without reporting a removal.
    pub fn forget(&mut self, id: ObjectId) -> Option<ObjectRecord> {
        self.tracked.remove(&id)
    }

    pub fn snapshot(&self) -> &BTreeMap<ObjectId, ObjectRecord> {
        &self.tracked
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.tracked.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

fn record_differs(previous: &ObjectRecord, current: &ObjectRecord) -> bool {
    !previous.transform.bitwise_eq(&current.transform)
        || previous.container_path != current.container_path
        || previous.payload != current.payload
        || previous.kind != current.kind
        || previous.page != current.page
}

#[cfg(test)]
mod tests {
    use super::{ChangeDetector, ChangeEvent};
    use crate::model::geometry::{Transform, Vec3};
    use crate::model::record::{ObjectId, ObjectKind, ObjectRecord, Payload};
    use crate::scene::path::ContainerPath;

    fn record(id: u64, x: f32) -> ObjectRecord {
        ObjectRecord::new(
            ObjectId(id),
            ObjectKind::Tab,
            ContainerPath::parse("Canvas/pages/page2/cards2"),
            Some(0),
        )
        .with_transform(Transform::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn first_pass_reports_everything_as_added() {
        let mut detector = ChangeDetector::new();
        let changes = detector.evaluate(vec![record(1, 0.0), record(2, 0.0)]);
        assert_eq!(changes.added.len(), 2);
        assert!(changes.updated.is_empty());
        assert_eq!(detector.len(), 2);
    }

    #[test]
    fn unchanged_pass_is_empty() {
        let mut detector = ChangeDetector::with_baseline(vec![record(1, 5.0)]);
        assert!(detector.evaluate(vec![record(1, 5.0)]).is_empty());
    }

    #[test]
    fn tiny_float_delta_counts_as_update() {
        let mut detector = ChangeDetector::with_baseline(vec![record(1, 1.0)]);
        let nudged = f32::from_bits(1.0f32.to_bits() + 1);
        let changes = detector.evaluate(vec![record(1, nudged)]);
        assert_eq!(changes.events(), vec![ChangeEvent::Updated(ObjectId(1))]);
    }

    #[test]
    fn payload_change_and_removal_are_reported() {
        let mut detector = ChangeDetector::with_baseline(vec![record(1, 0.0), record(2, 0.0)]);
        let edited = record(1, 0.0).with_payload(Payload::Text("hello".to_string()));
        let changes = detector.evaluate(vec![edited]);

        assert_eq!(
            changes.events(),
            vec![
                ChangeEvent::Removed(ObjectId(2)),
                ChangeEvent::Updated(ObjectId(1)),
            ]
        );
        assert!(detector.get(ObjectId(2)).is_none());
        assert_eq!(changes.total(), 2);
    }
}
