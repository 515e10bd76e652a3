//! Text tabs created by long-pressing the book.
//!
//! # Responsibility
//! - Create a tab on the active page after a long press, facing the side
//!   of the book the reference object shows.
//! - Delete a tab after a long press on it; save its position on drag end.
//!
//! # Invariants
//! - No tab is created while drawing mode is active.
//! - At most one tab is created per press.

use crate::diagnostics::Diagnostic;
use crate::gesture::{HoldGesture, HoldMode};
use crate::model::geometry::{Quat, Transform, Vec3};
use crate::model::record::{ObjectId, ObjectKind, Payload};
use crate::placement::page::PageIndexProvider;
use crate::service::scene_service::{SceneService, SceneServiceResult, Target};
use crate::store::KeyValueStore;
use log::{debug, info};
use std::collections::BTreeMap;
use std::time::Duration;

/// Side of the book a tab is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabFace {
    Front,
    Back,
}

impl TabFace {
    /// Picks the face for a reference yaw in degrees.
    ///
    /// Yaw is read as a signed angle: within 10 degrees of 0 is the front,
    /// 150 to 200 degrees is the back. Anything else has no face.
    ///
    /// This differs from an unsigned `[0, 360)` reading, where 350 to 360
    /// degrees never counted as the front; here those yaws are front too.
    pub fn from_yaw(yaw_degrees: f32) -> Option<Self> {
        let yaw = yaw_degrees.rem_euclid(360.0);
        let signed = if yaw > 180.0 { yaw - 360.0 } else { yaw };
        if (-10.0..=10.0).contains(&signed) {
            Some(Self::Front)
        } else if (150.0..=200.0).contains(&yaw) {
            Some(Self::Back)
        } else {
            None
        }
    }

    pub fn rotation(self) -> Quat {
        match self {
            Self::Front => Quat::from_euler_degrees(0.0, 0.0, 0.0),
            Self::Back => Quat::from_euler_degrees(0.0, 180.0, 0.0),
        }
    }

    /// Text material resource applied to the tab.
    pub fn material(self) -> &'static str {
        match self {
            Self::Front => "shader/Front",
            Self::Back => "shader/Back",
        }
    }
}

/// Events produced by one `TabController::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabEvents {
    pub created: Option<(ObjectId, Option<TabFace>)>,
    pub deleted: Vec<ObjectId>,
}

#[derive(Debug, Clone)]
pub struct TabController {
    hold: Duration,
    create: HoldGesture,
    per_tab: BTreeMap<ObjectId, HoldGesture>,
}

impl TabController {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            create: HoldGesture::new(hold, HoldMode::OneShot),
            per_tab: BTreeMap::new(),
        }
    }

    pub fn book_pointer_down(&mut self) {
        self.create.pointer_down();
    }

    pub fn book_pointer_up(&mut self) {
        self.create.pointer_up();
    }

    pub fn tab_pointer_down(&mut self, id: ObjectId) {
        self.gesture(id).pointer_down();
    }

    pub fn tab_pointer_up(&mut self, id: ObjectId) {
        self.gesture(id).pointer_up();
    }

    pub fn begin_drag(&mut self, id: ObjectId) {
        self.gesture(id).begin_drag();
    }

    /// Moves a tab by `delta` in its container's local space.
    pub fn drag<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        id: ObjectId,
        delta: Vec3,
    ) -> SceneServiceResult<bool>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let Some(mut record) = service.record(id) else {
            service.diagnostics_mut().record(Diagnostic::MissingIdentity {
                id,
                operation: "drag_tab",
            });
            return Ok(false);
        };
        record.transform.position = Vec3::new(
            record.transform.position.x + delta.x,
            record.transform.position.y + delta.y,
            record.transform.position.z + delta.z,
        );
        service.set_transform(id, record.transform)
    }

    /// Ends a drag and saves the collection.
    pub fn end_drag<S, P>(&mut self, service: &mut SceneService<S, P>, id: ObjectId) -> bool
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        self.gesture(id).end_drag();
        service.flush()
    }

    pub fn set_text<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        id: ObjectId,
        text: &str,
    ) -> SceneServiceResult<bool>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        service.set_payload(id, Payload::Text(text.to_string()))
    }

    /// Advances hold timers by `dt` and applies fired long presses.
    ///
    /// `reference_yaw` is the current yaw of the book's reference object.
    pub fn update<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        dt: Duration,
        reference_yaw: f32,
        drawing_active: bool,
    ) -> SceneServiceResult<TabEvents>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let mut events = TabEvents::default();

        if self.create.update(dt) {
            if drawing_active {
                debug!("event=create_tab module=tabs status=skipped reason=drawing_mode");
            } else {
                let face = TabFace::from_yaw(reference_yaw);
                let rotation = face.map_or(Quat::IDENTITY, TabFace::rotation);
                let id = service.create_object(
                    ObjectKind::Tab,
                    Target::ActivePage,
                    Transform::default().with_rotation(rotation),
                    Payload::Text(String::new()),
                )?;
                info!(
                    "event=create_tab module=tabs status=ok object_id={id} material={}",
                    face.map_or("default", TabFace::material)
                );
                service.flush();
                events.created = Some((id, face));
            }
        }

        let fired: Vec<ObjectId> = self
            .per_tab
            .iter_mut()
            .filter_map(|(id, gesture)| gesture.update(dt).then_some(*id))
            .collect();
        for id in fired {
            self.per_tab.remove(&id);
            if service.delete_object(id)? {
                info!("event=delete_tab module=tabs status=ok object_id={id}");
                events.deleted.push(id);
            }
        }
        if !events.deleted.is_empty() {
            service.flush();
        }
        Ok(events)
    }

    fn gesture(&mut self, id: ObjectId) -> &mut HoldGesture {
        let hold = self.hold;
        self.per_tab
            .entry(id)
            .or_insert_with(|| HoldGesture::new(hold, HoldMode::OneShot))
    }
}

#[cfg(test)]
mod tests {
    use super::TabFace;

    #[test]
    fn face_follows_reference_yaw() {
        assert_eq!(TabFace::from_yaw(0.0), Some(TabFace::Front));
        assert_eq!(TabFace::from_yaw(355.0), Some(TabFace::Front));
        assert_eq!(TabFace::from_yaw(-10.0), Some(TabFace::Front));
        assert_eq!(TabFace::from_yaw(180.0), Some(TabFace::Back));
        assert_eq!(TabFace::from_yaw(200.0), Some(TabFace::Back));
        assert_eq!(TabFace::from_yaw(90.0), None);
        assert_eq!(TabFace::from_yaw(201.0), None);
    }

    #[test]
    fn back_face_is_a_half_turn_about_y() {
        let yaw = TabFace::Back.rotation().yaw_degrees();
        assert!((yaw - 180.0).abs() < 0.01);
        assert_eq!(TabFace::Back.material(), "shader/Back");
        assert_eq!(TabFace::Front.rotation().yaw_degrees(), 0.0);
    }
}
