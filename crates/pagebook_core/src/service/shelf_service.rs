//! Scroll-shelf thumbnails that can be pinned onto the active page.
//!
//! # Responsibility
//! - Seed one shelf item per sprite, adopting items that already exist.
//! - Toggle an item between the shelf and the active page's card
//!   container after a hold, with a cooldown between toggles.
//! - Clamp drags on a page to the card container's rect.
//!
//! # Invariants
//! - Shelf items never carry a page; their page comes from the container
//!   they currently sit in.
//! - Items in the shelf container are always visible.

use crate::diagnostics::Diagnostic;
use crate::gesture::{HoldGesture, HoldMode};
use crate::model::geometry::{Rect, Transform, Vec3};
use crate::model::record::{ObjectId, ObjectKind, PageIndex, Payload};
use crate::persist::migrate::ShelfSeed;
use crate::placement::page::PageIndexProvider;
use crate::scene::path::{resolve_path, ContainerPath};
use crate::service::scene_service::{SceneService, SceneServiceResult, Target};
use crate::store::KeyValueStore;
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Where a shelf item currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfLocation {
    Shelf,
    Page(PageIndex),
    /// Any other container.
    Elsewhere,
}

#[derive(Debug, Clone)]
struct ShelfEntry {
    id: ObjectId,
    home: Vec3,
    gesture: HoldGesture,
}

#[derive(Debug, Clone)]
pub struct ShelfController {
    hold: Duration,
    mode: HoldMode,
    entries: BTreeMap<String, ShelfEntry>,
}

impl ShelfController {
    pub fn new(hold: Duration, mode: HoldMode) -> Self {
        Self {
            hold,
            mode,
            entries: BTreeMap::new(),
        }
    }

    /// Shelf seeds named `{prefab}_{n}` for each sprite, in order.
    pub fn seeds_for(prefab: &str, sprites: &[&str]) -> Vec<ShelfSeed> {
        sprites
            .iter()
            .enumerate()
            .map(|(index, sprite)| ShelfSeed::new(format!("{prefab}_{index}"), *sprite))
            .collect()
    }

    /// Binds every seed to a shelf item object.
    ///
    /// An existing, unclaimed shelf item showing the same sprite is adopted;
    /// otherwise a new item is created in the shelf container.
    pub fn seed<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        seeds: &[ShelfSeed],
    ) -> SceneServiceResult<Vec<ObjectId>>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let shared = service.placement().shared_container().clone();
        let mut claimed: BTreeSet<ObjectId> =
            self.entries.values().map(|entry| entry.id).collect();
        let existing: Vec<_> = service
            .snapshot()
            .into_values()
            .filter(|record| record.kind == ObjectKind::ShelfItem)
            .collect();

        let mut ids = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if let Some(entry) = self.entries.get(&seed.unique_id) {
                ids.push(entry.id);
                continue;
            }
            let adopted = existing.iter().find(|record| {
                !claimed.contains(&record.id) && record.payload.sprite() == Some(seed.sprite.as_str())
            });
            let (id, home) = match adopted {
                Some(record) => {
                    let home = if record.container_path == shared {
                        record.transform.position
                    } else {
                        Vec3::ZERO
                    };
                    (record.id, home)
                }
                None => {
                    let id = service.create_object(
                        ObjectKind::ShelfItem,
                        Target::Shared,
                        Transform::default(),
                        Payload::Sprite(seed.sprite.clone()),
                    )?;
                    (id, Vec3::ZERO)
                }
            };
            claimed.insert(id);
            self.entries.insert(
                seed.unique_id.clone(),
                ShelfEntry {
                    id,
                    home,
                    gesture: HoldGesture::new(self.hold, self.mode),
                },
            );
            ids.push(id);
        }
        info!(
            "event=seed_shelf module=shelf status=ok items={}",
            self.entries.len()
        );
        Ok(ids)
    }

    pub fn object_id(&self, unique_id: &str) -> Option<ObjectId> {
        self.entries.get(unique_id).map(|entry| entry.id)
    }

    pub fn location<S, P>(&self, service: &SceneService<S, P>, unique_id: &str) -> Option<ShelfLocation>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let record = service.record(self.object_id(unique_id)?)?;
        if &record.container_path == service.placement().shared_container() {
            return Some(ShelfLocation::Shelf);
        }
        Some(
            match service.placement().layout().page_for_path(&record.container_path) {
                Some(page) => ShelfLocation::Page(page),
                None => ShelfLocation::Elsewhere,
            },
        )
    }

    pub fn pointer_down(&mut self, unique_id: &str) {
        if let Some(entry) = self.entries.get_mut(unique_id) {
            entry.gesture.pointer_down();
        }
    }

    /// Releases the pointer; a release that ends a drag saves.
    pub fn pointer_up<S, P>(&mut self, service: &mut SceneService<S, P>, unique_id: &str) -> bool
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let Some(entry) = self.entries.get_mut(unique_id) else {
            return false;
        };
        entry.gesture.pointer_up();
        if !entry.gesture.is_dragging() {
            return false;
        }
        entry.gesture.end_drag();
        service.flush()
    }

    /// Advances hold timers and toggles items whose hold fired.
    pub fn update<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        dt: Duration,
    ) -> SceneServiceResult<Vec<(String, ShelfLocation)>>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let fired: Vec<String> = self
            .entries
            .iter_mut()
            .filter_map(|(unique_id, entry)| entry.gesture.update(dt).then(|| unique_id.clone()))
            .collect();
        let mut toggled = Vec::new();
        for unique_id in fired {
            if let Some(location) = self.toggle(service, &unique_id)? {
                toggled.push((unique_id, location));
            }
        }
        Ok(toggled)
    }

    /// Moves an item from the shelf to the active page's card container, or
    /// back to its shelf position. Saves after a move.
    ///
    /// Returns `None` when the item is unknown or the page container does
    /// not exist.
    pub fn toggle<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        unique_id: &str,
    ) -> SceneServiceResult<Option<ShelfLocation>>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let Some(entry) = self.entries.get(unique_id) else {
            return Ok(None);
        };
        let (id, home) = (entry.id, entry.home);
        let Some(record) = service.record(id) else {
            service.diagnostics_mut().record(Diagnostic::MissingIdentity {
                id,
                operation: "toggle_shelf_item",
            });
            return Ok(None);
        };

        let page = service.active_page();
        let target = service.placement().layout().container_path(page);
        let (destination, position, location) = if record.container_path == target {
            (
                service.placement().shared_container().clone(),
                home,
                ShelfLocation::Shelf,
            )
        } else {
            if resolve_path(service.tree(), &target).is_none() {
                warn!(
                    "event=toggle_shelf_item module=shelf status=error error_code=target_missing path={target}"
                );
                return Ok(None);
            }
            (target, Vec3::ZERO, ShelfLocation::Page(page))
        };

        service.move_object(id, &destination)?;
        service.set_transform(id, record.transform.with_position(position))?;
        service.flush();
        info!(
            "event=toggle_shelf_item module=shelf status=ok unique_id={unique_id} object_id={id} location={location:?}"
        );
        Ok(Some(location))
    }

    /// Drags a pinned item to `(x, y)`, clamped to its card container.
    ///
    /// Items on the shelf do not drag.
    pub fn drag<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        unique_id: &str,
        x: f32,
        y: f32,
    ) -> SceneServiceResult<bool>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let Some(entry) = self.entries.get_mut(unique_id) else {
            return Ok(false);
        };
        let id = entry.id;
        let Some(record) = service.record(id) else {
            return Ok(false);
        };
        let page_container = service
            .placement()
            .layout()
            .container_path(service.active_page());
        if record.container_path != page_container {
            return Ok(false);
        }
        entry.gesture.begin_drag();

        let (x, y) = container_rect(service, &record.container_path)
            .map_or((x, y), |rect| rect.clamp(x, y));
        let position = Vec3::new(x, y, record.transform.position.z);
        service.set_transform(id, record.transform.with_position(position))
    }
}

fn container_rect<S, P>(
    service: &SceneService<S, P>,
    path: &ContainerPath,
) -> Option<Rect>
where
    S: KeyValueStore,
    P: PageIndexProvider,
{
    let node = resolve_path(service.tree(), path)?;
    service.tree().rect(node)
}

#[cfg(test)]
mod tests {
    use super::ShelfController;

    #[test]
    fn seeds_are_numbered_per_prefab() {
        let seeds = ShelfController::seeds_for("ScrollImage", &["sprites/a", "sprites/b"]);
        assert_eq!(seeds[0].unique_id, "ScrollImage_0");
        assert_eq!(seeds[1].unique_id, "ScrollImage_1");
        assert_eq!(seeds[1].sprite, "sprites/b");
    }
}
