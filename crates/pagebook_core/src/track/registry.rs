//! Page-scoped object membership.
//!
//! # Responsibility
//! - Map each page index to the identities currently placed on it.
//! - Bound visibility sweeps and "delete everything on this page" scope.
//!
//! # Invariants
//! - An identity belongs to at most one page at a time.
//! - Re-registration moves an identity off its previous page.
//! - Pages with no identities are not kept.

use crate::model::record::{ObjectId, PageIndex};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct PageScopedRegistry {
    by_page: BTreeMap<PageIndex, BTreeSet<ObjectId>>,
    page_of: BTreeMap<ObjectId, PageIndex>,
}

impl PageScopedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `id` on `page`, returning the page it was previously on.
    pub fn register_to_page(&mut self, id: ObjectId, page: PageIndex) -> Option<PageIndex> {
        let previous = self.unregister(id);
        self.by_page.entry(page).or_default().insert(id);
        self.page_of.insert(id, page);
        previous
    }

    /// Removes `id`; returns `None` when it was not registered.
    pub fn unregister(&mut self, id: ObjectId) -> Option<PageIndex> {
        let page = self.page_of.remove(&id)?;
        if let Some(ids) = self.by_page.get_mut(&page) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_page.remove(&page);
            }
        }
        Some(page)
    }

    /// Removes every identity on `page` and returns them.
    pub fn unregister_page(&mut self, page: PageIndex) -> BTreeSet<ObjectId> {
        let ids = self.by_page.remove(&page).unwrap_or_default();
        for id in &ids {
            self.page_of.remove(id);
        }
        ids
    }

    pub fn objects_on_page(&self, page: PageIndex) -> BTreeSet<ObjectId> {
        self.by_page.get(&page).cloned().unwrap_or_default()
    }

    pub fn page_of(&self, id: ObjectId) -> Option<PageIndex> {
        self.page_of.get(&id).copied()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.page_of.contains_key(&id)
    }

    /// Every registered identity with its page, ordered by identity.
    pub fn entries(&self) -> impl Iterator<Item = (ObjectId, PageIndex)> + '_ {
        self.page_of.iter().map(|(id, page)| (*id, *page))
    }

    pub fn len(&self) -> usize {
        self.page_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page_of.is_empty()
    }
}
