//! Container path computation and resolution.
//!
//! A container path is the root-first, `/`-joined sequence of node names from
//! the tree root down to an object's immediate parent. Objects without a
//! parent use the `Detached` sentinel, written as `None` in text formats.

use crate::scene::tree::{NodeId, SceneTree};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Text written for objects that have no parent container.
pub const DETACHED_SENTINEL: &str = "None";
/// Separator between container names.
pub const PATH_SEPARATOR: char = '/';

/// Portable reference to a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ContainerPath {
    /// The object sits at tree root level.
    Detached,
    /// Normalized `/`-joined path without leading or trailing separators.
    Path(String),
}

impl ContainerPath {
    /// Parses text written by `Display`; blank text and the sentinel map to
    /// `Detached`.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim().trim_matches(PATH_SEPARATOR);
        if trimmed.is_empty() || trimmed == DETACHED_SENTINEL {
            return Self::Detached;
        }
        Self::Path(trimmed.to_string())
    }

    /// Joins non-empty segments; no segments yields `Detached`.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .filter(|segment| !segment.as_ref().is_empty())
            .map(|segment| segment.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        if joined.is_empty() {
            Self::Detached
        } else {
            Self::Path(joined)
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Detached => DETACHED_SENTINEL,
            Self::Path(path) => path.as_str(),
        }
    }

    /// Container names, root first. Empty for `Detached`.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::Detached => Vec::new(),
            Self::Path(path) => path.split(PATH_SEPARATOR).collect(),
        }
    }

    /// Path of a child container named `name` under this one.
    pub fn child(&self, name: &str) -> Self {
        match self {
            Self::Detached => Self::parse(name),
            Self::Path(path) => Self::Path(format!("{path}{PATH_SEPARATOR}{name}")),
        }
    }
}

impl Display for ContainerPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<String>> for ContainerPath {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Self::Detached,
            Some(path) => match path.trim().trim_matches(PATH_SEPARATOR) {
                "" => Self::Detached,
                trimmed => Self::Path(trimmed.to_string()),
            },
        }
    }
}

impl From<ContainerPath> for Option<String> {
    fn from(value: ContainerPath) -> Self {
        match value {
            ContainerPath::Detached => None,
            ContainerPath::Path(path) => Some(path),
        }
    }
}

/// Global-scope lookup of a node by its full path.
///
/// Implementations return the first match when several nodes share a path
/// and `None` for stale or unknown paths. They never panic.
pub trait ContainerLookup {
    fn find_by_path(&self, path: &str) -> Option<NodeId>;
}

/// Path of `node`'s parent container, root first.
///
/// Returns `Detached` when `node` has no parent or is not a live node.
pub fn compute_path(tree: &SceneTree, node: NodeId) -> ContainerPath {
    match tree.parent(node) {
        Some(parent) => node_path(tree, parent),
        None => ContainerPath::Detached,
    }
}

/// Full path of `node` itself, including its own name.
pub fn node_path(tree: &SceneTree, node: NodeId) -> ContainerPath {
    let mut names = Vec::new();
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        match tree.name(current) {
            Some(name) => names.push(name.to_string()),
            None => break,
        }
        cursor = tree.parent(current);
    }
    names.reverse();
    ContainerPath::from_segments(names)
}

/// Resolves a container path back to a live node.
///
/// `Detached` resolves to `None`, meaning "attach at root level"; callers
/// distinguish it from a failed lookup with `ContainerPath::is_detached`.
pub fn resolve_path<L>(lookup: &L, path: &ContainerPath) -> Option<NodeId>
where
    L: ContainerLookup + ?Sized,
{
    match path {
        ContainerPath::Detached => None,
        ContainerPath::Path(path) => lookup.find_by_path(path),
    }
}
