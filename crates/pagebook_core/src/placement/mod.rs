//! Reconstruction and page-scoped visibility of tracked objects.
//!
//! # Responsibility
//! - Recreate objects from loaded records under their saved containers.
//! - Fall back to the active page container (then the configured fallback)
//!   when a saved path no longer resolves.
//! - Show objects of the active page and hide everything else, except
//!   objects in the shared container.
//!
//! # Invariants
//! - A loaded record is never dropped because its path is stale.
//! - Objects in the shared container are always visible.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::model::record::{ObjectId, ObjectRecord, PageIndex};
use crate::scene::path::{compute_path, resolve_path, ContainerPath};
use crate::scene::tree::{NodeId, SceneResult, SceneTree, TrackedObject};
use crate::track::registry::PageScopedRegistry;
use log::{debug, info};
use std::collections::BTreeMap;

pub mod layout;
pub mod page;

use layout::PageLayout;

/// Where an object currently sits relative to the visible page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    /// No parent container.
    Detached,
    AttachedVisible,
    AttachedHidden,
}

/// Outcome of one load-time reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub placed: usize,
    /// Records placed somewhere other than their saved container.
    pub fallbacks: usize,
    /// Records that could not be placed at all (identity already live).
    pub rejected: Vec<ObjectId>,
}

#[derive(Debug, Clone)]
pub struct PlacementReconciler {
    layout: PageLayout,
    shared: ContainerPath,
    fallback: ContainerPath,
    active_page: PageIndex,
    states: BTreeMap<ObjectId, PlacementState>,
}

impl PlacementReconciler {
    pub fn new(
        layout: PageLayout,
        shared: ContainerPath,
        fallback: ContainerPath,
        active_page: PageIndex,
    ) -> Self {
        Self {
            layout,
            shared,
            fallback,
            active_page,
            states: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn shared_container(&self) -> &ContainerPath {
        &self.shared
    }

    pub fn active_page(&self) -> PageIndex {
        self.active_page
    }

    pub fn active_container(&self) -> ContainerPath {
        self.layout.container_path(self.active_page)
    }

    pub fn state_of(&self, id: ObjectId) -> Option<PlacementState> {
        self.states.get(&id).copied()
    }

    pub fn forget(&mut self, id: ObjectId) {
        self.states.remove(&id);
    }

    /// Places every record, then applies page visibility.
    pub fn reconcile_on_load(
        &mut self,
        tree: &mut SceneTree,
        records: &BTreeMap<ObjectId, ObjectRecord>,
        registry: &mut PageScopedRegistry,
        diagnostics: &mut Diagnostics,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for record in records.values() {
            match self.place(tree, registry, record, diagnostics) {
                Ok(placement) => {
                    report.placed += 1;
                    if placement.fell_back {
                        report.fallbacks += 1;
                    }
                }
                Err(err) => {
                    debug!(
                        "event=place_object module=placement status=error object_id={} error={err}",
                        record.id
                    );
                    report.rejected.push(record.id);
                }
            }
        }
        self.check_visibility(tree, registry);
        info!(
            "event=reconcile module=placement status=ok placed={} fallbacks={} rejected={}",
            report.placed,
            report.fallbacks,
            report.rejected.len()
        );
        report
    }

    /// Creates (or re-attaches) the node for `record`.
    ///
    /// An object already live in `tree` is moved and updated in place.
    pub fn place(
        &mut self,
        tree: &mut SceneTree,
        registry: &mut PageScopedRegistry,
        record: &ObjectRecord,
        diagnostics: &mut Diagnostics,
    ) -> SceneResult<Placement> {
        let (parent, fell_back) = self.resolve_or_fallback(tree, record, diagnostics)?;
        let node = match tree.node_of(record.id) {
            Some(node) => {
                tree.set_parent(node, parent)?;
                tree.set_transform(node, record.transform)?;
                tree.set_payload(node, record.payload.clone())?;
                node
            }
            None => {
                let object = TrackedObject::new(record.id, record.kind, record.page)
                    .with_payload(record.payload.clone());
                let name = format!("{}_{}", record.kind, record.id);
                tree.spawn_object(parent, &name, object, record.transform)?
            }
        };
        self.refresh_registration(tree, registry, record.id)?;
        Ok(Placement { node, fell_back })
    }

    /// Resolves the saved container of `record`, creating the fallback
    /// container when needed.
    ///
    /// Returns the parent (`None` for detached records) and whether a
    /// fallback was used.
    pub fn resolve_or_fallback(
        &self,
        tree: &mut SceneTree,
        record: &ObjectRecord,
        diagnostics: &mut Diagnostics,
    ) -> SceneResult<(Option<NodeId>, bool)> {
        if record.container_path.is_detached() {
            return Ok((None, false));
        }
        if let Some(node) = resolve_path(tree, &record.container_path) {
            return Ok((Some(node), false));
        }

        let active = self.active_container();
        let (node, used) = match resolve_path(tree, &active) {
            Some(node) => (Some(node), active),
            None => (
                tree.ensure_container_path(&self.fallback)?,
                self.fallback.clone(),
            ),
        };
        diagnostics.record(Diagnostic::ResolutionFailure {
            id: record.id,
            path: record.container_path.clone(),
            fallback: used,
        });
        Ok((node, true))
    }

    /// Re-derives the registry page of `id` from its record page or, for
    /// page-less objects, from the page container it currently sits in.
    ///
    /// Objects that leave every page become visible again.
    pub fn refresh_registration(
        &mut self,
        tree: &mut SceneTree,
        registry: &mut PageScopedRegistry,
        id: ObjectId,
    ) -> SceneResult<()> {
        let Some(node) = tree.node_of(id) else {
            registry.unregister(id);
            self.forget(id);
            return Ok(());
        };
        let path = compute_path(tree, node);
        let page = tree
            .object(node)
            .and_then(|object| object.page)
            .or_else(|| self.layout.page_for_path(&path));
        match page {
            Some(page) => {
                registry.register_to_page(id, page);
            }
            None => {
                registry.unregister(id);
                tree.set_visible(node, true)?;
            }
        }
        let state = if path.is_detached() {
            PlacementState::Detached
        } else if tree.is_visible(node).unwrap_or(true) {
            PlacementState::AttachedVisible
        } else {
            PlacementState::AttachedHidden
        };
        self.states.insert(id, state);
        Ok(())
    }

    /// Shows registered objects of the active page and hides the rest.
    ///
    /// An object counts as on the active page when its container is the
    /// active page container or its registered page is the active page.
    /// Returns how many visibility flags changed.
    pub fn check_visibility(&mut self, tree: &mut SceneTree, registry: &PageScopedRegistry) -> usize {
        let active = self.active_container();
        let mut changed = 0;
        for (id, page) in registry.entries() {
            let Some(node) = tree.node_of(id) else {
                continue;
            };
            let path = compute_path(tree, node);
            let visible = path == self.shared || path == active || page == self.active_page;
            if tree.is_visible(node) != Some(visible) && tree.set_visible(node, visible).is_ok() {
                changed += 1;
            }
            let state = match (path.is_detached(), visible) {
                (true, _) => PlacementState::Detached,
                (false, true) => PlacementState::AttachedVisible,
                (false, false) => PlacementState::AttachedHidden,
            };
            self.states.insert(id, state);
        }
        debug!(
            "event=check_visibility module=placement status=ok page={} changed={changed}",
            self.active_page
        );
        changed
    }

    /// Switches the active page and re-runs the visibility sweep.
    pub fn on_page_changed(
        &mut self,
        tree: &mut SceneTree,
        registry: &PageScopedRegistry,
        page: PageIndex,
    ) -> usize {
        info!(
            "event=page_changed module=placement status=ok from={} to={page}",
            self.active_page
        );
        self.active_page = page;
        self.check_visibility(tree, registry)
    }
}

/// Node chosen for a placed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub node: NodeId,
    pub fell_back: bool,
}
