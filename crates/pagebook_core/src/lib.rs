//! Core of pagebook: persistent scene-graph synchronization for a
//! page-based notebook canvas.
//! This crate is the single source of truth for tracking, placement and
//! persistence invariants.

pub mod codec;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod gesture;
pub mod logging;
pub mod model;
pub mod persist;
pub mod placement;
pub mod scene;
pub mod service;
pub mod store;
pub mod track;

pub use codec::{DecodeReport, DecodeWarning, RecordFormat};
pub use config::{ConfigError, PagebookConfig, SaveMode};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::geometry::{Quat, Rect, Transform, Vec3};
pub use model::record::{ObjectId, ObjectKind, ObjectRecord, PageIndex, Payload};
pub use persist::scheduler::{SavePolicy, SaveScheduler};
pub use persist::PersistenceStore;
pub use placement::page::{page_channel, PageIndexProvider, PageSignal, PageSubscription, SharedPage};
pub use placement::{PlacementReconciler, PlacementState};
pub use scene::path::{compute_path, resolve_path, ContainerLookup, ContainerPath};
pub use scene::tree::{NodeId, SceneError, SceneTree};
pub use service::scene_service::{SceneService, SceneServiceError, SceneServiceResult, Target, TickReport};
pub use store::{KeyValueStore, MemoryKvStore, SqliteKvStore, StoreError};
pub use track::detector::{ChangeDetector, ChangeEvent, ChangeSet};
pub use track::registry::PageScopedRegistry;

/// Minimal health-check API for hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
