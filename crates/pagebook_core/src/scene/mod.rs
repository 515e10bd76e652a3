//! In-memory containment tree and path resolution.
//!
//! # Responsibility
//! - Own the container hierarchy that tracked objects are attached to.
//! - Translate between live nodes and portable container paths.
//!
//! # Invariants
//! - A node has at most one parent; parent links never form a cycle.
//! - Every tracked `ObjectId` maps to exactly one live node.

pub mod path;
pub mod tree;
