//! Live-object tracking: change detection and page-scoped membership.

pub mod detector;
pub mod registry;
