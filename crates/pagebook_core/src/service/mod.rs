//! Scene use-case services.
//!
//! # Responsibility
//! - Orchestrate tracking, placement and persistence for one scope.
//! - Host the tab, drawing and shelf interactions built on top of it.

pub mod drawing_service;
pub mod scene_service;
pub mod shelf_service;
pub mod tab_service;
