//! In-memory node graph store and its mutation/query facade.
//!
//! # Responsibility
//! - Own every node record of one session.
//! - Create, import, export, find and destroy nodes.
//! - Notify observers synchronously on every change.
//!
//! # Invariants
//! - The Bus is the only owner of node records; `Node` handles hold no state.
//! - Records keep insertion order, so export order is deterministic.
//! - No `RefCell` borrow is held while observers or hooks run.
//!
//! # See also
//! - `node.rs` for the per-node view API.

mod import;
mod node;
mod walk;

pub use node::Node;
pub use walk::WalkOptions;

use crate::model::component::{Component, ComponentKind, NodeValue};
use crate::model::raw_node::{
    default_linked, is_system_id, new_node_id, NodeId, RawNode, REL_CHILDREN,
};
use indexmap::IndexMap;
use log::{trace, warn};
use std::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// Result type used by graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors from graph store and node operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node record is absent from the store (never created or destroyed).
    NodeNotFound(NodeId),
    /// Reparenting would make a node its own ancestor.
    CycleDetected { node_id: NodeId, parent_id: NodeId },
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "use of non-existent node: {id}"),
            Self::CycleDetected { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under parent {parent_id}"
            ),
        }
    }
}

impl Error for GraphError {}

/// Change notification delivered to observers.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node content or one of its relation lists changed.
    Changed(Node),
    /// Node record was removed from the store.
    Destroyed(NodeId),
}

/// Handle returned by [`Bus::observe`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Rc<dyn Fn(&NodeEvent)>;
type AttachHook = Rc<dyn Fn(&Node)>;

/// In-memory node record.
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) value: Option<NodeValue>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) linked: BTreeMap<String, Vec<NodeId>>,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) rel: Option<String>,
    pub(crate) hash: u64,
}

impl NodeRecord {
    fn new(id: NodeId, name: impl Into<String>, value: Option<NodeValue>) -> Self {
        let mut record = Self {
            id,
            name: name.into(),
            value,
            parent: None,
            linked: default_linked(),
            attrs: BTreeMap::new(),
            rel: None,
            hash: 0,
        };
        record.hash = record.content_hash();
        record
    }

    /// Builds a record from its persisted shape, inflating component values.
    pub(crate) fn from_raw(raw: RawNode) -> Self {
        let value = raw.value.map(|value| inflate_value(&raw.name, value));
        let mut record = Self {
            id: raw.id,
            name: raw.name,
            value,
            parent: raw.parent,
            linked: raw.linked,
            attrs: raw.attrs,
            rel: raw.rel,
            hash: 0,
        };
        record.hash = record.content_hash();
        record
    }

    pub(crate) fn to_raw(&self) -> RawNode {
        RawNode {
            id: self.id.clone(),
            name: self.name.clone(),
            value: self.value.as_ref().map(NodeValue::to_json),
            parent: self.parent.clone(),
            linked: self.linked.clone(),
            attrs: self.attrs.clone(),
            rel: self.rel.clone(),
        }
    }

    pub(crate) fn rel_name(&self) -> &str {
        self.rel.as_deref().unwrap_or(REL_CHILDREN)
    }

    pub(crate) fn linked_ids(&self, rel: &str) -> Vec<NodeId> {
        self.linked.get(rel).cloned().unwrap_or_default()
    }

    pub(crate) fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.name.hash(&mut hasher);
        self.value
            .as_ref()
            .map(|value| value.to_json().to_string())
            .hash(&mut hasher);
        self.parent.hash(&mut hasher);
        self.linked.hash(&mut hasher);
        self.attrs.hash(&mut hasher);
        self.rel.hash(&mut hasher);
        hasher.finish()
    }
}

fn inflate_value(name: &str, value: serde_json::Value) -> NodeValue {
    let Some(kind) = ComponentKind::from_name(name) else {
        return NodeValue::Data(value);
    };
    match Component::from_value(kind, value.clone()) {
        Ok(component) => NodeValue::Component(component),
        Err(err) => {
            warn!(
                "event=component_inflate module=bus status=error component={} error={}",
                name, err
            );
            NodeValue::Data(value)
        }
    }
}

struct BusInner {
    store: RefCell<IndexMap<NodeId, NodeRecord>>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
    attach_hooks: RefCell<Vec<AttachHook>>,
    next_observer_id: Cell<u64>,
}

/// Shared handle to one session's node store.
///
/// Cloning the handle shares the store. Observers that need the Bus should
/// capture a [`WeakBus`] to avoid a reference cycle.
#[derive(Clone)]
pub struct Bus {
    inner: Rc<BusInner>,
}

/// Non-owning Bus handle.
#[derive(Clone)]
pub struct WeakBus {
    inner: Weak<BusInner>,
}

impl WeakBus {
    pub fn upgrade(&self) -> Option<Bus> {
        self.inner.upgrade().map(|inner| Bus { inner })
    }
}

impl Debug for Bus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").field("nodes", &self.len()).finish()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(BusInner {
                store: RefCell::new(IndexMap::new()),
                observers: RefCell::new(Vec::new()),
                attach_hooks: RefCell::new(Vec::new()),
                next_observer_id: Cell::new(0),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakBus {
        WeakBus {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns whether both handles share one store.
    pub fn same_store(&self, other: &Bus) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.borrow().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.store.borrow().contains_key(id)
    }

    /// Returns a view of the node with `id`, if present.
    pub fn get(&self, id: &str) -> Option<Node> {
        self.contains(id)
            .then(|| Node::new(self.clone(), id.to_string()))
    }

    /// Returns every parentless node in store order.
    pub fn roots(&self) -> Vec<Node> {
        let ids = self
            .inner
            .store
            .borrow()
            .values()
            .filter(|record| record.parent.is_none())
            .map(|record| record.id.clone())
            .collect::<Vec<_>>();
        ids.into_iter()
            .map(|id| Node::new(self.clone(), id))
            .collect()
    }

    /// Creates a node, resolving `/`-delimited paths.
    ///
    /// Missing intermediate path segments are created. The last segment is
    /// always a new node, except for `@`-prefixed system names which are
    /// reused when already present.
    pub fn make(&self, name: &str, value: Option<NodeValue>) -> GraphResult<Node> {
        let (parent, leaf) = match name.rsplit_once('/') {
            Some((parent_path, leaf)) => {
                let parent = match self.find(parent_path) {
                    Some(parent) => parent,
                    None => self.make(parent_path, None)?,
                };
                (Some(parent), leaf)
            }
            None => (None, name),
        };

        if is_system_id(leaf) {
            if let Some(existing) = self.get(leaf) {
                return Ok(existing);
            }
        }

        let node = if is_system_id(leaf) {
            self.insert_record(NodeRecord::new(leaf.to_string(), leaf, value))
        } else {
            self.create(leaf, value)
        };
        trace!(
            "event=node_make module=bus status=ok node_id={} nested={}",
            node.id(),
            parent.is_some()
        );

        match parent {
            Some(parent) => parent.add_child(&node)?,
            None => node.changed(),
        }
        Ok(node)
    }

    /// Removes one record and detaches it from its parent's relation list.
    ///
    /// Descendants are not touched; see [`Node::destroy`] for subtree removal.
    pub fn destroy(&self, node: &Node) -> GraphResult<()> {
        let record = self
            .inner
            .store
            .borrow_mut()
            .shift_remove(node.id())
            .ok_or_else(|| GraphError::NodeNotFound(node.id().to_string()))?;

        if let Some(parent_id) = &record.parent {
            let rel = record.rel_name().to_string();
            let detached = self
                .with_record_mut(parent_id, |parent| {
                    if let Some(ids) = parent.linked.get_mut(&rel) {
                        ids.retain(|id| id != &record.id);
                    }
                })
                .is_ok();
            if detached {
                self.changed(parent_id);
            }
        }

        trace!(
            "event=node_destroy module=bus status=ok node_id={}",
            record.id
        );
        self.emit(&NodeEvent::Destroyed(record.id));
        Ok(())
    }

    /// Resolves a node by ID, then by `/`-delimited name path from a root.
    pub fn find(&self, path: &str) -> Option<Node> {
        if let Some(node) = self.get(path) {
            return Some(node);
        }

        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut current = self
            .roots()
            .into_iter()
            .find(|root| root.id() == first || root.name().is_ok_and(|name| name == first))?;
        for segment in segments {
            current = current
                .children()
                .ok()?
                .into_iter()
                .find(|child| child.name().is_ok_and(|name| name == segment))?;
        }
        Some(current)
    }

    /// Registers a change observer invoked synchronously on every change.
    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&NodeEvent) + 'static,
    {
        let id = ObserverId(self.inner.next_observer_id.get());
        self.inner.next_observer_id.set(id.0 + 1);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Rc::new(observer)));
        id
    }

    /// Unregisters an observer. Returns `false` when it was not registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Registers a hook fired once per node surviving [`Bus::import`].
    pub fn on_attach<F>(&self, hook: F)
    where
        F: Fn(&Node) + 'static,
    {
        self.inner.attach_hooks.borrow_mut().push(Rc::new(hook));
    }

    /// Recomputes the node's content hash and notifies observers.
    pub(crate) fn changed(&self, id: &str) {
        let updated = self
            .with_record_mut(id, |record| record.hash = record.content_hash())
            .is_ok();
        if updated {
            self.emit(&NodeEvent::Changed(Node::new(self.clone(), id.to_string())));
        }
    }

    fn emit(&self, event: &NodeEvent) {
        let observers = self
            .inner
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect::<Vec<_>>();
        for observer in observers {
            observer(event);
        }
    }

    /// Inserts a detached record under a fresh generated ID, without notifying.
    pub(crate) fn create(&self, name: &str, value: Option<NodeValue>) -> Node {
        let mut id = new_node_id();
        while self.contains(&id) {
            id = new_node_id();
        }
        self.insert_record(NodeRecord::new(id, name, value))
    }

    pub(crate) fn insert_record(&self, record: NodeRecord) -> Node {
        let id = record.id.clone();
        self.inner.store.borrow_mut().insert(id.clone(), record);
        Node::new(self.clone(), id)
    }

    pub(crate) fn with_record<T>(
        &self,
        id: &str,
        read: impl FnOnce(&NodeRecord) -> T,
    ) -> GraphResult<T> {
        let store = self.inner.store.borrow();
        let record = store
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        Ok(read(record))
    }

    pub(crate) fn with_record_mut<T>(
        &self,
        id: &str,
        write: impl FnOnce(&mut NodeRecord) -> T,
    ) -> GraphResult<T> {
        let mut store = self.inner.store.borrow_mut();
        let record = store
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        Ok(write(record))
    }
}
