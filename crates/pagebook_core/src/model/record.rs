//! Object record domain model.
//!
//! # Responsibility
//! - Define the snapshot persisted for every tracked canvas object.
//! - Validate snapshots before they cross a persistence boundary.
//!
//! # Invariants
//! - `id` is stable and never reused for another object.
//! - `page` is fixed at creation; moving an object to another page is a
//!   delete followed by a create.
//! - Transform components are finite and scale components are non-zero.

use crate::model::geometry::Transform;
use crate::scene::path::ContainerPath;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier for every tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based logical page index reported by the page container.
pub type PageIndex = u32;

/// Category of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Text tab created by long-pressing the book.
    Tab,
    /// Free-standing image.
    Image,
    /// One freehand drawing brush point.
    Stroke,
    /// Thumbnail that lives on the scroll shelf or on a page.
    ShelfItem,
    /// Anything else the host asks to track.
    Generic,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tab => "tab",
            Self::Image => "image",
            Self::Stroke => "stroke",
            Self::ShelfItem => "shelf_item",
            Self::Generic => "generic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tab" => Some(Self::Tab),
            "image" => Some(Self::Image),
            "stroke" => Some(Self::Stroke),
            "shelf_item" => Some(Self::ShelfItem),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form content attached to an object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    None,
    /// Typed note text.
    Text(String),
    /// Opaque sprite/image resource name.
    Sprite(String),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn sprite(&self) -> Option<&str> {
        match self {
            Self::Sprite(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Persisted snapshot of one tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Local-space transform relative to `container_path`.
    pub transform: Transform,
    /// Root-first path of the owning container at snapshot time.
    pub container_path: ContainerPath,
    /// Owning page, cached for visibility filtering. `None` for shared objects.
    #[serde(default)]
    pub page: Option<PageIndex>,
    #[serde(default)]
    pub payload: Payload,
}

impl ObjectRecord {
    /// Creates a record with identity transform and empty payload.
    pub fn new(
        id: ObjectId,
        kind: ObjectKind,
        container_path: ContainerPath,
        page: Option<PageIndex>,
    ) -> Self {
        Self {
            id,
            kind,
            transform: Transform::default(),
            container_path,
            page,
            payload: Payload::None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Validates record invariants.
    ///
    /// # Errors
    /// - `NonFiniteTransform` when any component is NaN or infinite.
    /// - `ZeroScale` when any scale component is exactly zero.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if !self.transform.is_finite() {
            return Err(RecordValidationError::NonFiniteTransform(self.id));
        }
        let scale = self.transform.scale;
        if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
            return Err(RecordValidationError::ZeroScale(self.id));
        }
        Ok(())
    }
}

/// Record invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    NonFiniteTransform(ObjectId),
    ZeroScale(ObjectId),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteTransform(id) => {
                write!(f, "object {id} has a non-finite transform component")
            }
            Self::ZeroScale(id) => write!(f, "object {id} has a zero scale component"),
        }
    }
}

impl Error for RecordValidationError {}
