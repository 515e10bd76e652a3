//! Runtime configuration for one notebook scope.
//!
//! # Responsibility
//! - Describe store keys, wire format, save cadence and container layout.
//! - Load from JSON with every field defaulted.
//!
//! # Invariants
//! - A config returned by `from_json_str`/`from_file` has passed `validate`.

use crate::codec::RecordFormat;
use crate::gesture::HoldMode;
use crate::persist::scheduler::SavePolicy;
use crate::placement::layout::PageLayout;
use crate::scene::path::ContainerPath;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STORE_KEY: &str = "pagebook.scene";
pub const DEFAULT_PAGE_TEMPLATE: &str = "Canvas/pages/page{n}/cards{n}";
pub const DEFAULT_SHARED_CONTAINER: &str = "Canvas/Scroll View/Viewport/Content";

/// When pending changes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Flush on the same tick a change is observed.
    #[default]
    OnChange,
    /// Flush at most once per `save_interval_ms`.
    Interval,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidTemplate(String),
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::InvalidTemplate(template) => write!(
                f,
                "page container template `{template}` must contain `{}`",
                PageLayout::PLACEHOLDER
            ),
            Self::InvalidValue { field, message } => write!(f, "invalid `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidTemplate(_) => None,
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagebookConfig {
    /// Key the encoded record set is stored under.
    pub store_key: String,
    /// Format used when writing; reads accept both formats.
    pub record_format: RecordFormat,
    pub save_mode: SaveMode,
    /// Minimum spacing between flushes in `Interval` mode.
    pub save_interval_ms: u64,
    /// Path of the card container of page `n`; `{n}` is `page index + offset`.
    pub page_container_template: String,
    pub page_number_offset: u32,
    /// Container whose objects are never hidden by page changes.
    pub shared_container: String,
    /// Where objects go when neither their saved path nor the active page resolves.
    pub fallback_container: String,
    /// Container that drawing strokes are attached to.
    pub drawing_canvas: String,
    pub tab_hold_ms: u64,
    pub shelf_hold_ms: u64,
    pub shelf_cooldown_ms: u64,
    /// Overrides `logging::default_log_level` when set.
    pub log_level: Option<String>,
}

impl Default for PagebookConfig {
    fn default() -> Self {
        Self {
            store_key: DEFAULT_STORE_KEY.to_string(),
            record_format: RecordFormat::Structured,
            save_mode: SaveMode::OnChange,
            save_interval_ms: 500,
            page_container_template: DEFAULT_PAGE_TEMPLATE.to_string(),
            page_number_offset: 2,
            shared_container: DEFAULT_SHARED_CONTAINER.to_string(),
            fallback_container: "Canvas/pages/unsorted".to_string(),
            drawing_canvas: "Canvas/drawing".to_string(),
            tab_hold_ms: 1000,
            shelf_hold_ms: 500,
            shelf_cooldown_ms: 1000,
            log_level: None,
        }
    }
}

impl PagebookConfig {
    /// Parses and validates a JSON config; missing fields use defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store_key",
                message: "must not be blank".to_string(),
            });
        }
        if self.save_mode == SaveMode::Interval && self.save_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "save_interval_ms",
                message: "must be positive in interval mode".to_string(),
            });
        }
        if ContainerPath::parse(&self.fallback_container).is_detached() {
            return Err(ConfigError::InvalidValue {
                field: "fallback_container",
                message: "must name a container".to_string(),
            });
        }
        self.page_layout()?;
        Ok(())
    }

    pub fn page_layout(&self) -> Result<PageLayout, ConfigError> {
        PageLayout::new(&self.page_container_template, self.page_number_offset)
    }

    pub fn save_policy(&self) -> SavePolicy {
        match self.save_mode {
            SaveMode::OnChange => SavePolicy::OnChange,
            SaveMode::Interval => SavePolicy::Interval(Duration::from_millis(self.save_interval_ms)),
        }
    }

    pub fn shared_container_path(&self) -> ContainerPath {
        ContainerPath::parse(&self.shared_container)
    }

    pub fn fallback_container_path(&self) -> ContainerPath {
        ContainerPath::parse(&self.fallback_container)
    }

    pub fn drawing_canvas_path(&self) -> ContainerPath {
        ContainerPath::parse(&self.drawing_canvas)
    }

    pub fn tab_hold(&self) -> (Duration, HoldMode) {
        (Duration::from_millis(self.tab_hold_ms), HoldMode::OneShot)
    }

    pub fn shelf_hold(&self) -> (Duration, HoldMode) {
        (
            Duration::from_millis(self.shelf_hold_ms),
            HoldMode::Repeat {
                cooldown: Duration::from_millis(self.shelf_cooldown_ms),
            },
        )
    }
}
