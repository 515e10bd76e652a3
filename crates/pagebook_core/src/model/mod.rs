//! Domain model for tracked canvas objects.
//!
//! # Responsibility
//! - Define the serializable unit persisted for every tracked object.
//! - Keep geometry value types free of scene-tree and storage details.
//!
//! # Invariants
//! - Every tracked object is identified by a stable `ObjectId`.
//! - Identities are never reused after deletion.

pub mod geometry;
pub mod record;
