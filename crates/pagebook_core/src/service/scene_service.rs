//! Scene orchestration for one logical scope.
//!
//! # Responsibility
//! - Own the tree, detector, registry, reconciler and persistence of one
//!   scope (a book or a drawing surface) with explicit dependencies.
//! - Turn host mutations and ticks into change sets and coalesced saves.
//!
//! # Invariants
//! - Every save writes the full collection; there are no partial writes.
//! - A deleted identity is never reused and never reappears after reload.
//! - An object's page is fixed at creation; `reassign_page` recreates it.

use crate::config::{ConfigError, PagebookConfig};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::model::geometry::Transform;
use crate::model::record::{
    ObjectId, ObjectKind, ObjectRecord, PageIndex, Payload, RecordValidationError,
};
use crate::persist::migrate::{self, MigrationReport, ShelfSeed};
use crate::persist::scheduler::SaveScheduler;
use crate::persist::PersistenceStore;
use crate::placement::page::{PageIndexProvider, PageSubscription};
use crate::placement::{PlacementReconciler, ReconcileReport};
use crate::scene::path::{compute_path, ContainerPath};
use crate::scene::tree::{NodeId, SceneError, SceneTree};
use crate::store::KeyValueStore;
use crate::track::detector::{ChangeDetector, ChangeSet};
use crate::track::registry::PageScopedRegistry;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type SceneServiceResult<T> = Result<T, SceneServiceError>;

/// Errors returned to callers. Recoverable conditions go to `Diagnostics`.
#[derive(Debug)]
pub enum SceneServiceError {
    Config(ConfigError),
    Scene(SceneError),
    InvalidRecord(RecordValidationError),
}

impl Display for SceneServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Scene(err) => write!(f, "{err}"),
            Self::InvalidRecord(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SceneServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Scene(err) => Some(err),
            Self::InvalidRecord(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SceneServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<SceneError> for SceneServiceError {
    fn from(value: SceneError) -> Self {
        Self::Scene(value)
    }
}

impl From<RecordValidationError> for SceneServiceError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidRecord(value)
    }
}

/// Where a new object is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Card container of the page currently shown.
    ActivePage,
    /// Card container of a specific page.
    Page(PageIndex),
    /// The shared shelf container; the object has no page.
    Shared,
    /// An explicit container, created if missing.
    Container {
        path: ContainerPath,
        page: Option<PageIndex>,
    },
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub page_changed: Option<PageIndex>,
    pub visibility_changes: usize,
    pub changes: ChangeSet,
    pub saved: bool,
}

pub struct SceneService<S: KeyValueStore, P: PageIndexProvider> {
    tree: SceneTree,
    persist: PersistenceStore<S>,
    detector: ChangeDetector,
    registry: PageScopedRegistry,
    placement: PlacementReconciler,
    scheduler: SaveScheduler,
    pages: P,
    subscription: Option<PageSubscription>,
    diagnostics: Diagnostics,
    config: PagebookConfig,
    load_report: ReconcileReport,
}

impl<S: KeyValueStore, P: PageIndexProvider> SceneService<S, P> {
    /// Loads the stored collection into `tree` and applies page visibility.
    ///
    /// # Errors
    /// - `Config` when the page layout template is invalid.
    pub fn open(
        mut tree: SceneTree,
        store: S,
        config: PagebookConfig,
        pages: P,
    ) -> SceneServiceResult<Self> {
        config.validate()?;
        let mut diagnostics = Diagnostics::new();
        let mut persist =
            PersistenceStore::new(store, config.store_key.clone(), config.record_format);
        let records = persist.load(&mut diagnostics);

        let active_page = pages.current_page();
        let mut placement = PlacementReconciler::new(
            config.page_layout()?,
            config.shared_container_path(),
            config.fallback_container_path(),
            active_page,
        );
        let mut registry = PageScopedRegistry::new();
        let load_report =
            placement.reconcile_on_load(&mut tree, &records, &mut registry, &mut diagnostics);

        info!(
            "event=scene_open module=service status=ok key={} records={} page={active_page}",
            config.store_key,
            records.len()
        );

        Ok(Self {
            tree,
            persist,
            detector: ChangeDetector::with_baseline(records.into_values()),
            registry,
            placement,
            scheduler: SaveScheduler::new(config.save_policy()),
            pages,
            subscription: None,
            diagnostics,
            config,
            load_report,
        })
    }

    /// Receives page turns from a `PageSignal` instead of polling.
    pub fn with_page_subscription(mut self, subscription: PageSubscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Creates a tracked object and returns its fresh identity.
    ///
    /// # Errors
    /// - `InvalidRecord` for non-finite or zero-scale transforms.
    /// - `Scene` when the target container cannot be created.
    pub fn create_object(
        &mut self,
        kind: ObjectKind,
        target: Target,
        transform: Transform,
        payload: Payload,
    ) -> SceneServiceResult<ObjectId> {
        let (path, page) = self.resolve_target(target);
        ObjectRecord::new(self.persist.next_id(), kind, path.clone(), page)
            .with_transform(transform)
            .validate()?;

        self.tree.ensure_container_path(&path)?;
        let id = self.persist.allocate_id(&mut self.diagnostics);
        let record = ObjectRecord::new(id, kind, path, page)
            .with_transform(transform)
            .with_payload(payload);
        self.placement
            .place(&mut self.tree, &mut self.registry, &record, &mut self.diagnostics)?;
        self.placement
            .check_visibility(&mut self.tree, &self.registry);

        info!(
            "event=create_object module=service status=ok object_id={id} kind={kind} path={}",
            record.container_path
        );
        Ok(id)
    }

    /// Re-parents `id` under `path`, keeping its local transform.
    ///
    /// Returns `Ok(false)` and records `MissingIdentity` for unknown ids.
    pub fn move_object(&mut self, id: ObjectId, path: &ContainerPath) -> SceneServiceResult<bool> {
        let Some(node) = self.live_node(id, "move_object") else {
            return Ok(false);
        };
        let parent = self.tree.ensure_container_path(path)?;
        self.tree.set_parent(node, parent)?;
        self.placement
            .refresh_registration(&mut self.tree, &mut self.registry, id)?;
        self.placement
            .check_visibility(&mut self.tree, &self.registry);
        debug!("event=move_object module=service status=ok object_id={id} path={path}");
        Ok(true)
    }

    pub fn set_transform(&mut self, id: ObjectId, transform: Transform) -> SceneServiceResult<bool> {
        let Some(node) = self.live_node(id, "set_transform") else {
            return Ok(false);
        };
        let mut probe = ObjectRecord::new(id, ObjectKind::Generic, ContainerPath::Detached, None);
        probe.transform = transform;
        probe.validate()?;
        self.tree.set_transform(node, transform)?;
        Ok(true)
    }

    pub fn set_payload(&mut self, id: ObjectId, payload: Payload) -> SceneServiceResult<bool> {
        let Some(node) = self.live_node(id, "set_payload") else {
            return Ok(false);
        };
        self.tree.set_payload(node, payload)?;
        Ok(true)
    }

    /// Removes `id` and anything nested under it.
    ///
    /// The removal reaches the store on the next flush; deleted identities
    /// stay retired.
    pub fn delete_object(&mut self, id: ObjectId) -> SceneServiceResult<bool> {
        if self.live_node(id, "delete_object").is_none() {
            return Ok(false);
        }
        let removed = self.tree.remove_object(id)?;
        self.untrack(&removed);
        info!(
            "event=delete_object module=service status=ok object_id={id} removed={}",
            removed.len()
        );
        Ok(true)
    }

    /// Removes every object registered to `page`.
    pub fn delete_all_on_page(&mut self, page: PageIndex) -> SceneServiceResult<Vec<ObjectId>> {
        let mut removed = Vec::new();
        for id in self.registry.unregister_page(page) {
            if self.tree.node_of(id).is_some() {
                removed.extend(self.tree.remove_object(id)?);
            }
        }
        removed.sort();
        removed.dedup();
        self.untrack(&removed);
        info!(
            "event=delete_all_on_page module=service status=ok page={page} removed={}",
            removed.len()
        );
        Ok(removed)
    }

    /// Moves `id` to another page by deleting it and recreating it with a
    /// fresh identity on `page`.
    ///
    /// The record and target container are checked before the delete, so a
    /// failed reassignment leaves the object in place.
    pub fn reassign_page(
        &mut self,
        id: ObjectId,
        page: PageIndex,
    ) -> SceneServiceResult<Option<ObjectId>> {
        let Some(record) = self.record(id) else {
            self.diagnostics.record(Diagnostic::MissingIdentity {
                id,
                operation: "reassign_page",
            });
            return Ok(None);
        };
        let (path, _) = self.resolve_target(Target::Page(page));
        record.validate()?;
        self.tree.ensure_container_path(&path)?;

        self.delete_object(id)?;
        let new_id = self.create_object(
            record.kind,
            Target::Page(page),
            record.transform,
            record.payload,
        )?;
        info!(
            "event=reassign_page module=service status=ok object_id={id} new_object_id={new_id} page={page}"
        );
        Ok(Some(new_id))
    }

    /// Current state of every tracked object.
    pub fn snapshot(&self) -> BTreeMap<ObjectId, ObjectRecord> {
        self.tree
            .tracked()
            .map(|(node, object)| {
                let record = ObjectRecord::new(
                    object.id,
                    object.kind,
                    compute_path(&self.tree, node),
                    object.page,
                )
                .with_transform(self.tree.transform(node).unwrap_or_default())
                .with_payload(object.payload.clone());
                (object.id, record)
            })
            .collect()
    }

    pub fn record(&self, id: ObjectId) -> Option<ObjectRecord> {
        let node = self.tree.node_of(id)?;
        let object = self.tree.object(node)?;
        Some(
            ObjectRecord::new(id, object.kind, compute_path(&self.tree, node), object.page)
                .with_transform(self.tree.transform(node).unwrap_or_default())
                .with_payload(object.payload.clone()),
        )
    }

    /// Applies page turns, diffs the scene and saves when due.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        let signalled = self
            .subscription
            .as_ref()
            .and_then(PageSubscription::drain_latest);
        let page = signalled.unwrap_or_else(|| self.pages.current_page());
        if page != self.placement.active_page() {
            report.visibility_changes =
                self.placement
                    .on_page_changed(&mut self.tree, &self.registry, page);
            report.page_changed = Some(page);
        }

        report.changes = self.detector.evaluate(self.snapshot().into_values());
        if !report.changes.is_empty() {
            debug!(
                "event=detect_changes module=service status=ok added={} updated={} removed={}",
                report.changes.added.len(),
                report.changes.updated.len(),
                report.changes.removed.len()
            );
            self.scheduler.request();
        }

        if self.scheduler.should_flush(now) {
            report.saved = self.write_collection(now);
        }
        report
    }

    /// Saves the full collection now, whatever the schedule says.
    pub fn flush(&mut self) -> bool {
        self.write_collection(Instant::now())
    }

    /// Imports the old tab, shelf and seeded book content layouts, saves the
    /// result, then retires the legacy keys.
    ///
    /// Tabs are attached under `tab_container` on `tab_page`.
    pub fn import_legacy(
        &mut self,
        tab_container: &ContainerPath,
        tab_page: Option<PageIndex>,
        shelf: &[ShelfSeed],
    ) -> SceneServiceResult<MigrationReport> {
        let read = migrate::read_tab_layout(self.persist.store(), tab_container, tab_page)
            .and_then(|mut import| {
                import.extend(migrate::read_shelf_layout(self.persist.store(), shelf)?);
                let layout = self.placement.layout();
                import.extend(migrate::read_book_content(self.persist.store(), |path| {
                    layout.page_for_path(path)
                })?);
                Ok(import)
            });
        let import = match read {
            Ok(import) => import,
            Err(err) => {
                self.diagnostics.record(Diagnostic::StoreUnavailable {
                    operation: "import_legacy",
                    message: err.to_string(),
                });
                return Ok(MigrationReport::default());
            }
        };
        if import.is_empty() {
            return Ok(MigrationReport::default());
        }

        let retired_keys = import.retired_keys.clone();
        let persist = &mut self.persist;
        let diagnostics = &mut self.diagnostics;
        let report = import.into_records(|| persist.allocate_id(diagnostics));
        for warning in &report.warnings {
            self.diagnostics.record(Diagnostic::MalformedRecord {
                index: warning.index,
                reason: warning.reason.clone(),
            });
        }
        for record in report.records.values() {
            self.placement
                .place(&mut self.tree, &mut self.registry, record, &mut self.diagnostics)?;
        }
        self.placement
            .check_visibility(&mut self.tree, &self.registry);

        if self.flush() {
            for key in &retired_keys {
                if let Err(err) = self.persist.store_mut().delete_key(key) {
                    warn!("event=import_legacy module=service status=warn key={key} error={err}");
                }
            }
        }
        info!(
            "event=import_legacy module=service status=ok imported={} warnings={}",
            report.records.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// Direct tree access for hosts; edits are picked up on the next tick.
    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn node_of(&self, id: ObjectId) -> Option<NodeId> {
        self.tree.node_of(id)
    }

    pub fn is_visible(&self, id: ObjectId) -> Option<bool> {
        self.tree.is_visible(self.tree.node_of(id)?)
    }

    pub fn registry(&self) -> &PageScopedRegistry {
        &self.registry
    }

    pub fn placement(&self) -> &PlacementReconciler {
        &self.placement
    }

    pub fn active_page(&self) -> PageIndex {
        self.placement.active_page()
    }

    pub fn config(&self) -> &PagebookConfig {
        &self.config
    }

    pub fn persistence(&self) -> &PersistenceStore<S> {
        &self.persist
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Placement outcome of the initial load.
    pub fn load_report(&self) -> &ReconcileReport {
        &self.load_report
    }

    pub fn into_store(self) -> S {
        self.persist.into_inner()
    }

    fn resolve_target(&self, target: Target) -> (ContainerPath, Option<PageIndex>) {
        let layout = self.placement.layout();
        match target {
            Target::ActivePage => {
                let page = self.placement.active_page();
                (layout.container_path(page), Some(page))
            }
            Target::Page(page) => (layout.container_path(page), Some(page)),
            Target::Shared => (self.config.shared_container_path(), None),
            Target::Container { path, page } => (path, page),
        }
    }

    fn live_node(&mut self, id: ObjectId, operation: &'static str) -> Option<NodeId> {
        let node = self.tree.node_of(id);
        if node.is_none() {
            self.diagnostics
                .record(Diagnostic::MissingIdentity { id, operation });
        }
        node
    }

    /// Merges durable state missed at open, then saves the full collection
    /// and updates the schedule.
    fn write_collection(&mut self, now: Instant) -> bool {
        if self.persist.needs_recovery() {
            if let Err(err) = self.merge_durable_state() {
                error!("event=merge_durable module=service status=error error={err}");
            }
        }
        let snapshot = self.snapshot();
        self.detector.evaluate(snapshot.values().cloned());
        let saved = self.persist.save(&snapshot, &mut self.diagnostics);
        if saved {
            self.scheduler.mark_saved(now);
        } else {
            self.scheduler.mark_failed(now);
        }
        saved
    }

    /// Brings back the durable collection that an outage hid at open.
    ///
    /// Session objects whose identity the durable store may already have
    /// used are recreated under fresh identities; durable records are then
    /// placed alongside the session ones.
    fn merge_durable_state(&mut self) -> SceneServiceResult<()> {
        let Some(durable) = self.persist.recover(&mut self.diagnostics) else {
            return Ok(());
        };

        let session = self.snapshot();
        let mut removed = Vec::new();
        for id in session.keys().filter(|id| **id < durable.next_id) {
            if self.tree.node_of(*id).is_some() {
                removed.extend(self.tree.remove_object(*id)?);
            }
        }
        self.untrack(&removed);

        let mut rekeyed = 0;
        for old_id in removed {
            let Some(record) = session.get(&old_id) else {
                continue;
            };
            let id = if old_id < durable.next_id {
                rekeyed += 1;
                self.persist.allocate_id(&mut self.diagnostics)
            } else {
                old_id
            };
            let record = ObjectRecord { id, ..record.clone() };
            self.placement
                .place(&mut self.tree, &mut self.registry, &record, &mut self.diagnostics)?;
            if id != old_id {
                info!(
                    "event=rekey_object module=service status=ok object_id={old_id} new_object_id={id}"
                );
            }
        }

        for record in durable.records.values() {
            if self.tree.node_of(record.id).is_none() {
                self.placement
                    .place(&mut self.tree, &mut self.registry, record, &mut self.diagnostics)?;
            }
        }
        self.placement
            .check_visibility(&mut self.tree, &self.registry);
        info!(
            "event=merge_durable module=service status=ok restored={} rekeyed={rekeyed}",
            durable.records.len()
        );
        Ok(())
    }

    fn untrack(&mut self, removed: &[ObjectId]) {
        for id in removed {
            self.registry.unregister(*id);
            self.placement.forget(*id);
        }
    }
}
