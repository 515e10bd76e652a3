//! Freehand drawing on a canvas container.
//!
//! Each brush point is a tracked `Stroke` object under the drawing canvas,
//! so strokes persist like any other object.

use crate::model::geometry::{Rect, Transform, Vec3};
use crate::model::record::{ObjectId, ObjectKind, Payload};
use crate::placement::page::PageIndexProvider;
use crate::scene::path::ContainerPath;
use crate::service::scene_service::{SceneService, SceneServiceResult, Target};
use crate::store::KeyValueStore;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Idle,
    Drawing,
    Erasing,
}

#[derive(Debug, Clone)]
pub struct DrawingController {
    mode: DrawMode,
    canvas: ContainerPath,
    canvas_rect: Rect,
    brush_size: f32,
    brush: String,
    pressed: bool,
    last_point: Option<(f32, f32)>,
}

impl DrawingController {
    /// `canvas_rect` is in the canvas container's local space; `brush_size`
    /// is the edge length of the square each point covers.
    pub fn new(
        canvas: ContainerPath,
        canvas_rect: Rect,
        brush: impl Into<String>,
        brush_size: f32,
    ) -> Self {
        Self {
            mode: DrawMode::Idle,
            canvas,
            canvas_rect,
            brush_size,
            brush: brush.into(),
            pressed: false,
            last_point: None,
        }
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Drawing or erasing blocks other long-press gestures.
    pub fn is_active(&self) -> bool {
        self.mode != DrawMode::Idle
    }

    pub fn start_drawing(&mut self) {
        self.set_mode(DrawMode::Drawing);
    }

    pub fn start_erasing(&mut self) {
        self.set_mode(DrawMode::Erasing);
    }

    pub fn stop(&mut self) {
        self.set_mode(DrawMode::Idle);
    }

    /// Starts a stroke (drawing) or erases under the pointer (erasing).
    pub fn pointer_down<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        x: f32,
        y: f32,
    ) -> SceneServiceResult<Vec<ObjectId>>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        self.pressed = true;
        self.last_point = None;
        self.pointer_move(service, x, y)
    }

    /// Adds a point when the pointer moved, or erases under it.
    ///
    /// Returns created point ids while drawing and removed ids while erasing.
    pub fn pointer_move<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        x: f32,
        y: f32,
    ) -> SceneServiceResult<Vec<ObjectId>>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        if !self.pressed {
            return Ok(Vec::new());
        }
        if !self.canvas_rect.contains(x, y) {
            debug!("event=draw_point module=drawing status=rejected reason=outside_canvas x={x} y={y}");
            return Ok(Vec::new());
        }
        match self.mode {
            DrawMode::Idle => Ok(Vec::new()),
            DrawMode::Drawing => {
                if self.last_point == Some((x, y)) {
                    return Ok(Vec::new());
                }
                let id = service.create_object(
                    ObjectKind::Stroke,
                    Target::Container {
                        path: self.canvas.clone(),
                        page: None,
                    },
                    Transform::at(Vec3::new(x, y, 0.0)),
                    Payload::Sprite(self.brush.clone()),
                )?;
                self.last_point = Some((x, y));
                Ok(vec![id])
            }
            DrawMode::Erasing => self.erase_at(service, x, y),
        }
    }

    pub fn pointer_up(&mut self) {
        self.pressed = false;
        self.last_point = None;
    }

    /// Removes every point whose brush square contains `(x, y)`.
    pub fn erase_at<S, P>(
        &mut self,
        service: &mut SceneService<S, P>,
        x: f32,
        y: f32,
    ) -> SceneServiceResult<Vec<ObjectId>>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let hits: Vec<ObjectId> = self
            .strokes(service)
            .into_iter()
            .filter(|(_, position)| {
                Rect::centered(position.x, position.y, self.brush_size).contains(x, y)
            })
            .map(|(id, _)| id)
            .collect();
        for id in &hits {
            service.delete_object(*id)?;
        }
        if !hits.is_empty() {
            debug!(
                "event=erase module=drawing status=ok removed={}",
                hits.len()
            );
        }
        Ok(hits)
    }

    /// Removes every stroke on the canvas.
    pub fn clear_all<S, P>(&mut self, service: &mut SceneService<S, P>) -> SceneServiceResult<usize>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        let strokes = self.strokes(service);
        for (id, _) in &strokes {
            service.delete_object(*id)?;
        }
        info!(
            "event=clear_drawings module=drawing status=ok removed={}",
            strokes.len()
        );
        Ok(strokes.len())
    }

    /// Stroke points on the canvas with their positions, ordered by id.
    pub fn strokes<S, P>(&self, service: &SceneService<S, P>) -> Vec<(ObjectId, Vec3)>
    where
        S: KeyValueStore,
        P: PageIndexProvider,
    {
        service
            .snapshot()
            .into_values()
            .filter(|record| record.kind == ObjectKind::Stroke && record.container_path == self.canvas)
            .map(|record| (record.id, record.transform.position))
            .collect()
    }

    fn set_mode(&mut self, mode: DrawMode) {
        if self.mode != mode {
            info!("event=draw_mode module=drawing status=ok mode={mode:?}");
        }
        self.mode = mode;
        self.pressed = false;
        self.last_point = None;
    }
}
