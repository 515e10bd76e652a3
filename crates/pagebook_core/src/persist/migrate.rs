//! One-time import of the pre-record preference layouts.
//!
//! Three layouts exist in old installs:
//! - tabs: `Object_Count` plus per-index `Object_{i}_Exists`,
//!   `Object_{i}_Pos{X,Y,Z}` and `Object_{i}_Rot{X,Y,Z}` (Euler degrees);
//! - shelf items: `{uniqueId}_Position` holding `"x,y,z,parentPath"`;
//! - seeded book content: a JSON document under `ObjeJson` listing, per
//!   page, the images and texts to create under a named container.
//!
//! Reading never allocates identities; `LegacyImport::into_records` does,
//! so callers can read through the same store they allocate from.

use crate::codec::DecodeWarning;
use crate::model::geometry::{Quat, Transform, Vec3};
use crate::model::record::{ObjectId, ObjectKind, ObjectRecord, PageIndex, Payload};
use crate::scene::path::ContainerPath;
use crate::store::{KeyValueStore, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const TAB_COUNT_KEY: &str = "Object_Count";
pub const BOOK_CONTENT_KEY: &str = "ObjeJson";

static SHELF_POSITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^,]+?)\s*,\s*([^,]+?)\s*,\s*([^,]+?)\s*,(.*)$")
        .expect("valid shelf position regex")
});

/// Shelf item known to the host, with the sprite it displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfSeed {
    pub unique_id: String,
    pub sprite: String,
}

impl ShelfSeed {
    pub fn new(unique_id: impl Into<String>, sprite: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            sprite: sprite.into(),
        }
    }

    pub fn position_key(&self) -> String {
        format!("{}_Position", self.unique_id)
    }
}

/// One object recovered from a legacy layout, not yet given an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyObject {
    /// Legacy handle (`Object_{i}` or the shelf unique id).
    pub legacy_key: String,
    pub kind: ObjectKind,
    pub transform: Transform,
    pub container_path: ContainerPath,
    pub page: Option<PageIndex>,
    pub payload: Payload,
}

/// Everything read from legacy keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyImport {
    pub objects: Vec<LegacyObject>,
    pub warnings: Vec<DecodeWarning>,
    /// Keys to delete once the imported records are saved.
    pub retired_keys: Vec<String>,
}

/// Records created by an import, with the legacy handle of each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub records: BTreeMap<ObjectId, ObjectRecord>,
    pub id_map: BTreeMap<String, ObjectId>,
    pub warnings: Vec<DecodeWarning>,
}

impl LegacyImport {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.warnings.is_empty()
    }

    pub fn extend(&mut self, other: LegacyImport) {
        self.objects.extend(other.objects);
        self.warnings.extend(other.warnings);
        self.retired_keys.extend(other.retired_keys);
    }

    /// Gives every object a fresh identity from `allocate`, in read order.
    pub fn into_records(self, mut allocate: impl FnMut() -> ObjectId) -> MigrationReport {
        let mut report = MigrationReport {
            warnings: self.warnings,
            ..MigrationReport::default()
        };
        for object in self.objects {
            let id = allocate();
            let record = ObjectRecord::new(id, object.kind, object.container_path, object.page)
                .with_transform(object.transform)
                .with_payload(object.payload);
            report.id_map.insert(object.legacy_key, id);
            report.records.insert(id, record);
        }
        report
    }
}

/// Reads the legacy tab layout.
///
/// Tabs lived directly under one parent; `container` and `page` say which.
/// Entries whose `Exists` flag is not 1 are skipped silently, entries with
/// missing coordinates are skipped with a warning.
pub fn read_tab_layout<S>(
    store: &S,
    container: &ContainerPath,
    page: Option<PageIndex>,
) -> StoreResult<LegacyImport>
where
    S: KeyValueStore + ?Sized,
{
    let mut import = LegacyImport::default();
    let Some(count) = store.get_int(TAB_COUNT_KEY)? else {
        return Ok(import);
    };
    import.retired_keys.push(TAB_COUNT_KEY.to_string());

    for index in 0..count.max(0) {
        let handle = format!("Object_{index}");
        let exists_key = format!("{handle}_Exists");
        let exists = store.get_int(&exists_key)?;
        import.retired_keys.push(exists_key);
        let component_keys = ["PosX", "PosY", "PosZ", "RotX", "RotY", "RotZ"]
            .map(|suffix| format!("{handle}_{suffix}"));
        import.retired_keys.extend(component_keys.iter().cloned());
        if exists != Some(1) {
            continue;
        }

        let mut components = [0.0_f32; 6];
        let mut missing = None;
        for (slot, key) in components.iter_mut().zip(component_keys.iter()) {
            match store.get_float(key)? {
                Some(value) => *slot = value as f32,
                None => {
                    missing = Some(key.clone());
                    break;
                }
            }
        }
        if let Some(key) = missing {
            import.warnings.push(DecodeWarning::new(
                usize::try_from(index).unwrap_or(usize::MAX),
                format!("missing legacy key `{key}`"),
            ));
            continue;
        }

        let [px, py, pz, rx, ry, rz] = components;
        import.objects.push(LegacyObject {
            legacy_key: handle,
            kind: ObjectKind::Tab,
            transform: Transform::at(Vec3::new(px, py, pz))
                .with_rotation(Quat::from_euler_degrees(rx, ry, rz)),
            container_path: container.clone(),
            page,
            payload: Payload::None,
        });
    }
    Ok(import)
}

/// Reads `{uniqueId}_Position` entries for the given shelf items.
///
/// Items without a saved entry are not imported; hosts seed them fresh.
pub fn read_shelf_layout<S>(store: &S, seeds: &[ShelfSeed]) -> StoreResult<LegacyImport>
where
    S: KeyValueStore + ?Sized,
{
    let mut import = LegacyImport::default();
    for (index, seed) in seeds.iter().enumerate() {
        let key = seed.position_key();
        let Some(text) = store.get_string(&key)? else {
            continue;
        };
        import.retired_keys.push(key);
        match parse_shelf_position(&text) {
            Ok((position, container_path)) => import.objects.push(LegacyObject {
                legacy_key: seed.unique_id.clone(),
                kind: ObjectKind::ShelfItem,
                transform: Transform::at(position),
                container_path,
                page: None,
                payload: Payload::Sprite(seed.sprite.clone()),
            }),
            Err(reason) => import.warnings.push(DecodeWarning::new(index, reason)),
        }
    }
    Ok(import)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookContent {
    #[serde(rename = "bookPages")]
    pages: Vec<BookPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookPage {
    #[serde(rename = "hierarchParentName")]
    parent: String,
    #[serde(rename = "Images")]
    images: Vec<BookImage>,
    #[serde(rename = "Texts")]
    texts: Vec<BookText>,
}

// Material, font, color and rect size are presentation details and are not
// carried into records.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookImage {
    #[serde(rename = "spriteName")]
    sprite: String,
    #[serde(rename = "posX")]
    x: f32,
    #[serde(rename = "posY")]
    y: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookText {
    #[serde(rename = "textContent")]
    content: String,
    #[serde(rename = "posX")]
    x: f32,
    #[serde(rename = "posY")]
    y: f32,
}

/// Reads the seeded book content stored under `ObjeJson`.
///
/// Images become `Image` records carrying their sprite; texts become `Tab`
/// records carrying their content. Each entry keeps the container its page
/// names, so placement applies the usual fallback when that container is
/// missing. `page_of` maps a container to its page. Unparseable content is
/// reported as one warning and its key is kept.
pub fn read_book_content<S>(
    store: &S,
    page_of: impl Fn(&ContainerPath) -> Option<PageIndex>,
) -> StoreResult<LegacyImport>
where
    S: KeyValueStore + ?Sized,
{
    let mut import = LegacyImport::default();
    let Some(text) = store.get_string(BOOK_CONTENT_KEY)? else {
        return Ok(import);
    };
    let content: BookContent = match serde_json::from_str(&text) {
        Ok(content) => content,
        Err(err) => {
            import
                .warnings
                .push(DecodeWarning::new(0, format!("invalid book content: {err}")));
            return Ok(import);
        }
    };
    import.retired_keys.push(BOOK_CONTENT_KEY.to_string());

    for (page_index, book_page) in content.pages.into_iter().enumerate() {
        let container = ContainerPath::parse(book_page.parent.trim());
        let page = page_of(&container);
        for (index, image) in book_page.images.into_iter().enumerate() {
            import.objects.push(LegacyObject {
                legacy_key: format!("bookPages[{page_index}].Images[{index}]"),
                kind: ObjectKind::Image,
                transform: Transform::at(Vec3::new(image.x, image.y, 0.0)),
                container_path: container.clone(),
                page,
                payload: Payload::Sprite(image.sprite),
            });
        }
        for (index, text) in book_page.texts.into_iter().enumerate() {
            import.objects.push(LegacyObject {
                legacy_key: format!("bookPages[{page_index}].Texts[{index}]"),
                kind: ObjectKind::Tab,
                transform: Transform::at(Vec3::new(text.x, text.y, 0.0)),
                container_path: container.clone(),
                page,
                payload: Payload::Text(text.content),
            });
        }
    }
    Ok(import)
}

fn parse_shelf_position(text: &str) -> Result<(Vec3, ContainerPath), String> {
    let captures = SHELF_POSITION_RE
        .captures(text)
        .ok_or_else(|| format!("expected `x,y,z,parentPath`, found `{text}`"))?;
    let coordinate = |group: usize| -> Result<f32, String> {
        let raw = captures.get(group).map_or("", |m| m.as_str());
        raw.parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| format!("invalid coordinate `{raw}`"))
    };
    let position = Vec3::new(coordinate(1)?, coordinate(2)?, coordinate(3)?);
    let path = ContainerPath::parse(captures.get(4).map_or("", |m| m.as_str()));
    Ok((position, path))
}
