//! Arena-backed containment tree.
//!
//! # Responsibility
//! - Store containers and tracked objects with parent/child links.
//! - Maintain an explicit path index so lookups never walk the whole tree.
//! - Maintain an `ObjectId -> NodeId` index for tracked objects.
//!
//! # Invariants
//! - Node slots are never reused; a removed `NodeId` stays dead.
//! - Node names are non-blank and never contain the path separator.
//! - The path index keeps the first node registered for a duplicated path.

use crate::model::geometry::{Rect, Transform};
use crate::model::record::{ObjectId, ObjectKind, PageIndex, Payload};
use crate::scene::path::{ContainerLookup, ContainerPath, PATH_SEPARATOR};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Handle to one live node in a `SceneTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Errors from tree mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Node handle is dead or was never issued by this tree.
    NodeNotFound(NodeId),
    /// No live node carries this object identity.
    ObjectNotFound(ObjectId),
    /// Another live node already carries this object identity.
    DuplicateObject(ObjectId),
    /// Name is blank or contains the path separator.
    InvalidName(String),
    /// Re-parenting would make a node its own ancestor.
    CycleDetected { node: NodeId, parent: NodeId },
}

impl Display for SceneError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(node) => write!(f, "scene node not found: {node}"),
            Self::ObjectNotFound(id) => write!(f, "tracked object not found: {id}"),
            Self::DuplicateObject(id) => write!(f, "tracked object already exists: {id}"),
            Self::InvalidName(name) => write!(f, "invalid scene node name `{name}`"),
            Self::CycleDetected { node, parent } => {
                write!(f, "moving node {node} under {parent} would create a cycle")
            }
        }
    }
}

impl Error for SceneError {}

/// Tracking metadata carried by object nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Page fixed at creation time, `None` for shared objects.
    pub page: Option<PageIndex>,
    pub payload: Payload,
}

impl TrackedObject {
    pub fn new(id: ObjectId, kind: ObjectKind, page: Option<PageIndex>) -> Self {
        Self {
            id,
            kind,
            page,
            payload: Payload::None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: Transform,
    visible: bool,
    rect: Option<Rect>,
    object: Option<TrackedObject>,
}

/// Containment tree owned by one logical scope (a book or a drawing surface).
#[derive(Debug, Default)]
pub struct SceneTree {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    objects: BTreeMap<ObjectId, NodeId>,
    path_index: HashMap<String, NodeId>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plain container node.
    pub fn add_container(&mut self, parent: Option<NodeId>, name: &str) -> SceneResult<NodeId> {
        self.insert_node(parent, name, Transform::default(), None)
    }

    /// Returns the node at `path`, creating every missing segment.
    ///
    /// `Detached` yields `Ok(None)`.
    pub fn ensure_container_path(&mut self, path: &ContainerPath) -> SceneResult<Option<NodeId>> {
        if let Some(existing) = self.find_by_path(path.as_str()).filter(|_| !path.is_detached()) {
            return Ok(Some(existing));
        }

        let mut cursor = None;
        for segment in path.segments() {
            cursor = Some(match self.find_child(cursor, segment) {
                Some(child) => child,
                None => self.add_container(cursor, segment)?,
            });
        }
        Ok(cursor)
    }

    /// Adds a node carrying a tracked object.
    ///
    /// # Errors
    /// - `DuplicateObject` when the identity is already live in this tree.
    pub fn spawn_object(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        object: TrackedObject,
        transform: Transform,
    ) -> SceneResult<NodeId> {
        if self.objects.contains_key(&object.id) {
            return Err(SceneError::DuplicateObject(object.id));
        }
        let id = object.id;
        let node = self.insert_node(parent, name, transform, Some(object))?;
        self.objects.insert(id, node);
        Ok(node)
    }

    /// Removes `node` and its whole subtree.
    ///
    /// Returns identities of tracked objects that were removed.
    pub fn remove(&mut self, node: NodeId) -> SceneResult<Vec<ObjectId>> {
        let parent = self.node(node)?.parent;
        self.detach_from_parent(node, parent);

        let mut removed = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(slot) = self.nodes.get_mut(current.0).and_then(Option::take) {
                if let Some(object) = slot.object {
                    self.objects.remove(&object.id);
                    removed.push(object.id);
                }
                stack.extend(slot.children);
            }
        }

        self.rebuild_path_index();
        removed.sort();
        Ok(removed)
    }

    /// Removes the node carrying `id` together with its subtree.
    pub fn remove_object(&mut self, id: ObjectId) -> SceneResult<Vec<ObjectId>> {
        let node = self.node_of(id).ok_or(SceneError::ObjectNotFound(id))?;
        self.remove(node)
    }

    /// Moves `node` under `new_parent`, keeping its local transform.
    pub fn set_parent(&mut self, node: NodeId, new_parent: Option<NodeId>) -> SceneResult<()> {
        let old_parent = self.node(node)?.parent;
        if let Some(parent) = new_parent {
            self.node(parent)?;
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == node {
                    return Err(SceneError::CycleDetected { node, parent });
                }
                cursor = self.parent(current);
            }
        }
        if old_parent == new_parent {
            return Ok(());
        }

        self.detach_from_parent(node, old_parent);
        self.attach_to_parent(node, new_parent);
        self.node_mut(node)?.parent = new_parent;
        self.rebuild_path_index();
        Ok(())
    }

    pub fn rename(&mut self, node: NodeId, name: &str) -> SceneResult<()> {
        let normalized = normalize_name(name)?;
        self.node_mut(node)?.name = normalized;
        self.rebuild_path_index();
        Ok(())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_ok()
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.node(node).ok().map(|node| node.name.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok().and_then(|node| node.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// First child named `name` under `parent` (or among roots).
    pub fn find_child(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        let siblings = match parent {
            Some(parent) => self.children(parent),
            None => self.roots.as_slice(),
        };
        siblings
            .iter()
            .copied()
            .find(|child| self.name(*child) == Some(name))
    }

    pub fn transform(&self, node: NodeId) -> Option<Transform> {
        self.node(node).ok().map(|node| node.transform)
    }

    pub fn set_transform(&mut self, node: NodeId, transform: Transform) -> SceneResult<()> {
        self.node_mut(node)?.transform = transform;
        Ok(())
    }

    pub fn is_visible(&self, node: NodeId) -> Option<bool> {
        self.node(node).ok().map(|node| node.visible)
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) -> SceneResult<()> {
        self.node_mut(node)?.visible = visible;
        Ok(())
    }

    /// Local-space bounds used for clamping and hit tests, if the host set one.
    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.node(node).ok().and_then(|node| node.rect)
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> SceneResult<()> {
        self.node_mut(node)?.rect = Some(rect);
        Ok(())
    }

    pub fn object(&self, node: NodeId) -> Option<&TrackedObject> {
        self.node(node).ok().and_then(|node| node.object.as_ref())
    }

    pub fn set_payload(&mut self, node: NodeId, payload: Payload) -> SceneResult<()> {
        let node_ref = self.node_mut(node)?;
        match node_ref.object.as_mut() {
            Some(object) => {
                object.payload = payload;
                Ok(())
            }
            None => Err(SceneError::NodeNotFound(node)),
        }
    }

    /// Node carrying the tracked object `id`.
    pub fn node_of(&self, id: ObjectId) -> Option<NodeId> {
        self.objects.get(&id).copied()
    }

    /// Tracked objects ordered by identity.
    pub fn tracked(&self) -> impl Iterator<Item = (NodeId, &TrackedObject)> + '_ {
        self.objects.values().filter_map(move |node| {
            self.object(*node).map(|object| (*node, object))
        })
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn insert_node(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        transform: Transform,
        object: Option<TrackedObject>,
    ) -> SceneResult<NodeId> {
        let name = normalize_name(name)?;
        if let Some(parent) = parent {
            self.node(parent)?;
        }

        let node = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            name,
            parent,
            children: Vec::new(),
            transform,
            visible: true,
            rect: None,
            object,
        }));
        self.attach_to_parent(node, parent);

        let path = self.full_path_string(node);
        self.path_index.entry(path).or_insert(node);
        Ok(node)
    }

    fn attach_to_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        match parent.and_then(|parent| self.nodes.get_mut(parent.0).and_then(Option::as_mut)) {
            Some(parent_node) => parent_node.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn detach_from_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        match parent.and_then(|parent| self.nodes.get_mut(parent.0).and_then(Option::as_mut)) {
            Some(parent_node) => parent_node.children.retain(|child| *child != node),
            None => self.roots.retain(|root| *root != node),
        }
    }

    fn full_path_string(&self, node: NodeId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            let Ok(current_node) = self.node(current) else {
                break;
            };
            names.push(current_node.name.as_str());
            cursor = current_node.parent;
        }
        names.reverse();
        names.join("/")
    }

    fn rebuild_path_index(&mut self) {
        let mut index = HashMap::new();
        let mut stack: Vec<(NodeId, String)> = self
            .roots
            .iter()
            .rev()
            .filter_map(|root| self.name(*root).map(|name| (*root, name.to_string())))
            .collect();
        while let Some((node, path)) = stack.pop() {
            for child in self.children(node).iter().rev() {
                if let Some(name) = self.name(*child) {
                    stack.push((*child, format!("{path}{PATH_SEPARATOR}{name}")));
                }
            }
            index.entry(path).or_insert(node);
        }
        self.path_index = index;
    }

    fn node(&self, node: NodeId) -> SceneResult<&Node> {
        self.nodes
            .get(node.0)
            .and_then(Option::as_ref)
            .ok_or(SceneError::NodeNotFound(node))
    }

    fn node_mut(&mut self, node: NodeId) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(node.0)
            .and_then(Option::as_mut)
            .ok_or(SceneError::NodeNotFound(node))
    }
}

impl ContainerLookup for SceneTree {
    fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let normalized = path.trim().trim_matches(PATH_SEPARATOR);
        self.path_index
            .get(normalized)
            .copied()
            .filter(|node| self.contains(*node))
    }
}

fn normalize_name(name: &str) -> SceneResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(PATH_SEPARATOR) {
        return Err(SceneError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}
