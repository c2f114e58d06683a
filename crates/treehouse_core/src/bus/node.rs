//! Stateless node view.
//!
//! # Responsibility
//! - Expose one node's properties and relations as computed accessors.
//! - Funnel every mutation through `changed()`.
//!
//! # Invariants
//! - A `Node` holds only an ID and a Bus handle; equality is by ID.
//! - Name, value and children of a reference node resolve to its target.
//! - A node ID appears at most once in its parent's relation list.

use super::walk::{walk_node, WalkOptions};
use super::{Bus, GraphError, GraphResult, NodeRecord};
use crate::model::component::{Component, ComponentKind, NodeValue};
use crate::model::raw_node::{
    default_linked, new_node_id, NodeId, RawNode, ATTR_REF_TO, REL_CHILDREN, REL_COMPONENTS,
    REL_FIELDS,
};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

/// View of one node in a [`Bus`].
#[derive(Clone)]
pub struct Node {
    bus: Bus,
    id: NodeId,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("id", &self.id).finish()
    }
}

impl Node {
    pub(crate) fn new(bus: Bus, id: NodeId) -> Self {
        Self { bus, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Snapshot of the backing record.
    pub fn raw(&self) -> GraphResult<RawNode> {
        self.bus.with_record(&self.id, NodeRecord::to_raw)
    }

    pub fn is_destroyed(&self) -> bool {
        !self.bus.contains(&self.id)
    }

    /// Content hash recomputed on every `changed()`.
    pub fn hash(&self) -> GraphResult<u64> {
        self.bus.with_record(&self.id, |record| record.hash)
    }

    /// Recomputes the content hash and notifies Bus observers.
    pub fn changed(&self) {
        self.bus.changed(&self.id);
    }

    // --- references -------------------------------------------------------

    /// Live target of this alias node, if any.
    ///
    /// A dangling `refTo` (target destroyed) reads as no reference.
    pub fn ref_to(&self) -> GraphResult<Option<Node>> {
        let target = self.attr(ATTR_REF_TO)?;
        Ok(target.and_then(|id| self.bus.get(&id)))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.ref_to(), Ok(Some(_)))
    }

    /// Turns this node into an alias of `target`, or clears the alias.
    pub fn set_ref_to(&self, target: Option<&Node>) -> GraphResult<()> {
        match target {
            Some(target) => {
                if target.is_destroyed() {
                    return Err(GraphError::NodeNotFound(target.id.clone()));
                }
                self.set_attr(ATTR_REF_TO, target.id.clone())
            }
            None => self.remove_attr(ATTR_REF_TO).map(|_| ()),
        }
    }

    /// Follows the alias chain to the node that owns name, value and children.
    ///
    /// Returns `self` for plain nodes. Alias cycles stop at the last new node.
    pub fn target(&self) -> Node {
        let mut seen = HashSet::from([self.id.clone()]);
        let mut current = self.clone();
        while let Ok(Some(next)) = current.ref_to() {
            if !seen.insert(next.id.clone()) {
                break;
            }
            current = next;
        }
        current
    }

    // --- content ----------------------------------------------------------

    pub fn name(&self) -> GraphResult<String> {
        let target = self.target();
        self.bus.with_record(&target.id, |record| record.name.clone())
    }

    pub fn set_name(&self, name: impl Into<String>) -> GraphResult<()> {
        let target = self.target();
        let name = name.into();
        self.bus
            .with_record_mut(&target.id, |record| record.name = name)?;
        target.changed();
        Ok(())
    }

    pub fn value(&self) -> GraphResult<Option<NodeValue>> {
        let target = self.target();
        self.bus
            .with_record(&target.id, |record| record.value.clone())
    }

    pub fn set_value(&self, value: Option<NodeValue>) -> GraphResult<()> {
        let target = self.target();
        self.bus
            .with_record_mut(&target.id, |record| record.value = value)?;
        target.changed();
        Ok(())
    }

    pub fn attr(&self, key: &str) -> GraphResult<Option<String>> {
        self.bus
            .with_record(&self.id, |record| record.attrs.get(key).cloned())
    }

    pub fn attrs(&self) -> GraphResult<BTreeMap<String, String>> {
        self.bus.with_record(&self.id, |record| record.attrs.clone())
    }

    pub fn set_attr(&self, key: &str, value: impl Into<String>) -> GraphResult<()> {
        let value = value.into();
        self.bus.with_record_mut(&self.id, |record| {
            record.attrs.insert(key.to_string(), value);
        })?;
        self.changed();
        Ok(())
    }

    /// Removes one attribute, returning its previous value.
    pub fn remove_attr(&self, key: &str) -> GraphResult<Option<String>> {
        let removed = self
            .bus
            .with_record_mut(&self.id, |record| record.attrs.remove(key))?;
        if removed.is_some() {
            self.changed();
        }
        Ok(removed)
    }

    // --- hierarchy --------------------------------------------------------

    pub fn parent(&self) -> GraphResult<Option<Node>> {
        let parent_id = self.bus.with_record(&self.id, |record| record.parent.clone())?;
        Ok(parent_id.and_then(|id| self.bus.get(&id)))
    }

    /// Moves this node under `parent`, keeping its relation name.
    ///
    /// `None` detaches the node and makes it a root.
    pub fn set_parent(&self, parent: Option<&Node>) -> GraphResult<()> {
        match parent {
            Some(parent) => {
                let rel = self.rel()?;
                parent.link_into(&rel, self, None)
            }
            None => self.detach(),
        }
    }

    /// Relation name under the parent (`Children` when unset).
    pub fn rel(&self) -> GraphResult<String> {
        self.bus
            .with_record(&self.id, |record| record.rel_name().to_string())
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> GraphResult<Vec<Node>> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([self.id.clone()]);
        let mut cursor = self.parent()?;
        while let Some(node) = cursor {
            if !seen.insert(node.id.clone()) {
                break;
            }
            cursor = node.parent()?;
            ancestors.push(node);
        }
        Ok(ancestors)
    }

    pub fn root(&self) -> GraphResult<Node> {
        Ok(self.ancestors()?.pop().unwrap_or_else(|| self.clone()))
    }

    /// `/`-joined names from the root down to this node.
    pub fn path(&self) -> GraphResult<String> {
        let mut names = self
            .ancestors()?
            .iter()
            .map(Node::name)
            .collect::<GraphResult<Vec<_>>>()?;
        names.reverse();
        names.push(self.name()?);
        Ok(names.join("/"))
    }

    pub fn walk<F>(&self, mut visit: F, opts: WalkOptions) -> bool
    where
        F: FnMut(&Node) -> bool,
    {
        let mut expanded_refs = HashSet::new();
        walk_node(self, &mut visit, opts, &mut expanded_refs)
    }

    // --- relations --------------------------------------------------------

    /// Live nodes of one relation of this node (no alias resolution).
    pub fn linked(&self, rel: &str) -> GraphResult<Vec<Node>> {
        let ids = self.bus.with_record(&self.id, |record| record.linked_ids(rel))?;
        Ok(ids.into_iter().filter_map(|id| self.bus.get(&id)).collect())
    }

    /// Moves `node` into relation `rel` of this node, appended at the end.
    pub fn add_linked(&self, rel: &str, node: &Node) -> GraphResult<()> {
        self.link_into(rel, node, None)
    }

    /// Detaches `node` when it is linked under `rel` of this node.
    ///
    /// Returns whether anything was removed.
    pub fn remove_linked(&self, rel: &str, node: &Node) -> GraphResult<bool> {
        let (parent, node_rel) = node.bus.with_record(&node.id, |record| {
            (record.parent.clone(), record.rel_name().to_string())
        })?;
        if parent.as_deref() != Some(self.id.as_str()) || node_rel != rel {
            return Ok(false);
        }
        node.detach()?;
        Ok(true)
    }

    pub fn children(&self) -> GraphResult<Vec<Node>> {
        self.target().linked(REL_CHILDREN)
    }

    pub fn child_count(&self) -> GraphResult<usize> {
        Ok(self.children()?.len())
    }

    pub fn has_children(&self) -> GraphResult<bool> {
        Ok(self.child_count()? > 0)
    }

    pub fn add_child(&self, node: &Node) -> GraphResult<()> {
        self.target().link_into(REL_CHILDREN, node, None)
    }

    /// Moves `node` into the children of this node at `index` (clamped).
    pub fn insert_child(&self, node: &Node, index: usize) -> GraphResult<()> {
        self.target().link_into(REL_CHILDREN, node, Some(index))
    }

    pub fn remove_child(&self, node: &Node) -> GraphResult<bool> {
        self.target().remove_linked(REL_CHILDREN, node)
    }

    pub fn fields(&self) -> GraphResult<Vec<Node>> {
        self.linked(REL_FIELDS)
    }

    pub fn field(&self, name: &str) -> GraphResult<Option<Node>> {
        Ok(self
            .fields()?
            .into_iter()
            .find(|field| field.name().is_ok_and(|field_name| field_name == name)))
    }

    /// Creates a field node named `name` under this node.
    pub fn add_field(&self, name: &str, value: Option<NodeValue>) -> GraphResult<Node> {
        self.ensure_exists()?;
        let field = self.bus.create(name, value);
        self.link_into(REL_FIELDS, &field, None)?;
        Ok(field)
    }

    pub fn components(&self) -> GraphResult<Vec<Node>> {
        self.linked(REL_COMPONENTS)
    }

    /// Attaches `component`, replacing the value of an existing one of the same kind.
    pub fn add_component(&self, component: Component) -> GraphResult<Node> {
        if let Some(existing) = self.component_node(component.kind())? {
            existing.set_value(Some(component.into()))?;
            return Ok(existing);
        }
        self.ensure_exists()?;
        let node = self.bus.create(component.name(), Some(component.into()));
        self.link_into(REL_COMPONENTS, &node, None)?;
        Ok(node)
    }

    pub fn component_node(&self, kind: ComponentKind) -> GraphResult<Option<Node>> {
        Ok(self.components()?.into_iter().find(|node| {
            node.bus
                .with_record(&node.id, |record| record.name == kind.name())
                .unwrap_or(false)
        }))
    }

    pub fn component(&self, kind: ComponentKind) -> GraphResult<Option<Component>> {
        let Some(node) = self.component_node(kind)? else {
            return Ok(None);
        };
        let value = node.value()?;
        Ok(value.and_then(|value| value.as_component().cloned()))
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        matches!(self.component_node(kind), Ok(Some(_)))
    }

    /// Destroys the attached component of `kind`. Returns whether one existed.
    pub fn remove_component(&self, kind: ComponentKind) -> GraphResult<bool> {
        match self.component_node(kind)? {
            Some(node) => {
                node.destroy()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- ordering ---------------------------------------------------------

    /// Position within the parent's relation list; `0` for roots.
    pub fn sibling_index(&self) -> GraphResult<usize> {
        let Some((_, siblings)) = self.siblings_raw()? else {
            return Ok(0);
        };
        Ok(siblings
            .iter()
            .position(|id| id == &self.id)
            .unwrap_or(0))
    }

    /// Moves this node to `index` within its current parent's relation list.
    ///
    /// The index is clamped to the last position. Roots are left in place.
    pub fn set_sibling_index(&self, index: usize) -> GraphResult<()> {
        let (parent, rel) = self.bus.with_record(&self.id, |record| {
            (record.parent.clone(), record.rel_name().to_string())
        })?;
        let Some(parent_id) = parent else {
            return Ok(());
        };
        let moved = self.bus.with_record_mut(&parent_id, |parent| {
            let Some(ids) = parent.linked.get_mut(&rel) else {
                return false;
            };
            let Some(current) = ids.iter().position(|id| id == &self.id) else {
                return false;
            };
            let id = ids.remove(current);
            let at = index.min(ids.len());
            ids.insert(at, id);
            current != at
        })?;
        if moved {
            self.bus.changed(&parent_id);
        }
        Ok(())
    }

    pub fn prev_sibling(&self) -> GraphResult<Option<Node>> {
        self.sibling_at_offset(-1)
    }

    pub fn next_sibling(&self) -> GraphResult<Option<Node>> {
        self.sibling_at_offset(1)
    }

    // --- lifecycle --------------------------------------------------------

    /// Removes this node from the store.
    ///
    /// An alias node removes only itself. Any other node removes itself with
    /// every node it owns under any relation, deepest first.
    pub fn destroy(&self) -> GraphResult<()> {
        if self.attr(ATTR_REF_TO)?.is_some() {
            return self.bus.destroy(self);
        }

        for node in self.owned_subtree().iter().rev() {
            if !node.is_destroyed() {
                self.bus.destroy(node)?;
            }
        }
        Ok(())
    }

    /// Deep-copies this node with fresh IDs and places the copy right after it.
    pub fn duplicate(&self) -> GraphResult<Node> {
        let (parent, rel) = self.bus.with_record(&self.id, |record| {
            (record.parent.clone(), record.rel_name().to_string())
        })?;
        let copy = self.clone_detached()?;
        match parent.and_then(|id| self.bus.get(&id)) {
            Some(parent) => {
                let index = self.sibling_index()? + 1;
                parent.link_into(&rel, &copy, Some(index))?;
            }
            None => copy.changed(),
        }
        Ok(copy)
    }

    // --- internals --------------------------------------------------------

    fn ensure_exists(&self) -> GraphResult<()> {
        if self.is_destroyed() {
            return Err(GraphError::NodeNotFound(self.id.clone()));
        }
        Ok(())
    }

    /// Links `node` under relation `rel` of exactly this node (no alias resolution).
    fn link_into(&self, rel: &str, node: &Node, index: Option<usize>) -> GraphResult<()> {
        self.ensure_exists()?;
        node.ensure_exists()?;
        if node.id == self.id || self.ancestors()?.contains(node) {
            return Err(GraphError::CycleDetected {
                node_id: node.id.clone(),
                parent_id: self.id.clone(),
            });
        }

        let old_parent = node.unlink_from_parent()?;
        let rel_value = (rel != REL_CHILDREN).then(|| rel.to_string());
        self.bus.with_record_mut(&node.id, |record| {
            record.parent = Some(self.id.clone());
            record.rel = rel_value;
        })?;
        self.bus.with_record_mut(&self.id, |record| {
            let ids = record.linked.entry(rel.to_string()).or_default();
            let at = index.map_or(ids.len(), |index| index.min(ids.len()));
            ids.insert(at, node.id.clone());
        })?;

        if let Some(old_parent) = old_parent {
            if old_parent != self.id {
                self.bus.changed(&old_parent);
            }
        }
        self.changed();
        node.changed();
        Ok(())
    }

    /// Removes this node's ID from its parent's relation list, without notifying.
    fn unlink_from_parent(&self) -> GraphResult<Option<NodeId>> {
        let (parent, rel) = self.bus.with_record(&self.id, |record| {
            (record.parent.clone(), record.rel_name().to_string())
        })?;
        if let Some(parent_id) = &parent {
            // A missing parent record just means there is nothing to unlink.
            let _ = self.bus.with_record_mut(parent_id, |record| {
                if let Some(ids) = record.linked.get_mut(&rel) {
                    ids.retain(|id| id != &self.id);
                }
            });
        }
        Ok(parent)
    }

    fn detach(&self) -> GraphResult<()> {
        let old_parent = self.unlink_from_parent()?;
        self.bus.with_record_mut(&self.id, |record| {
            record.parent = None;
            record.rel = None;
        })?;
        if let Some(old_parent) = old_parent {
            self.bus.changed(&old_parent);
        }
        self.changed();
        Ok(())
    }

    fn siblings_raw(&self) -> GraphResult<Option<(NodeId, Vec<NodeId>)>> {
        let (parent, rel) = self.bus.with_record(&self.id, |record| {
            (record.parent.clone(), record.rel_name().to_string())
        })?;
        let Some(parent_id) = parent else {
            return Ok(None);
        };
        let siblings = self
            .bus
            .with_record(&parent_id, |record| record.linked_ids(&rel))
            .unwrap_or_default();
        Ok(Some((parent_id, siblings)))
    }

    fn sibling_at_offset(&self, offset: isize) -> GraphResult<Option<Node>> {
        let Some((_, siblings)) = self.siblings_raw()? else {
            return Ok(None);
        };
        let Some(position) = siblings.iter().position(|id| id == &self.id) else {
            return Ok(None);
        };
        let Some(target) = position.checked_add_signed(offset) else {
            return Ok(None);
        };
        Ok(siblings.get(target).and_then(|id| self.bus.get(id)))
    }

    /// Pre-order list of this node and every record whose parent chain leads
    /// here, across all relations. Listed IDs owned elsewhere are skipped.
    fn owned_subtree(&self) -> Vec<Node> {
        let mut owned = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![self.id.clone()];
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Ok(linked) = self.bus.with_record(&id, |record| {
                record
                    .linked
                    .values()
                    .flatten()
                    .cloned()
                    .collect::<Vec<_>>()
            }) else {
                continue;
            };
            let mut next = linked
                .into_iter()
                .filter(|linked_id| {
                    self.bus
                        .with_record(linked_id, |record| {
                            record.parent.as_deref() == Some(id.as_str())
                        })
                        .unwrap_or(false)
                })
                .collect::<Vec<_>>();
            next.reverse();
            pending.extend(next);
            owned.push(Node::new(self.bus.clone(), id));
        }
        owned
    }

    /// Copies this node and everything it owns into new detached records.
    fn clone_detached(&self) -> GraphResult<Node> {
        let (name, value, attrs, rels) = self.bus.with_record(&self.id, |record| {
            (
                record.name.clone(),
                record.value.clone(),
                record.attrs.clone(),
                record.linked.keys().cloned().collect::<Vec<_>>(),
            )
        })?;

        let mut id = new_node_id();
        while self.bus.contains(&id) {
            id = new_node_id();
        }
        let mut record = NodeRecord {
            id,
            name,
            value,
            parent: None,
            linked: default_linked(),
            attrs,
            rel: None,
            hash: 0,
        };
        record.hash = record.content_hash();
        let copy = self.bus.insert_record(record);

        for rel in rels.iter().map(String::as_str) {
            for owned in self.linked(rel)? {
                if owned.parent()?.as_ref() != Some(self) {
                    continue;
                }
                let owned_copy = owned.clone_detached()?;
                self.bus.with_record_mut(&owned_copy.id, |record| {
                    record.parent = Some(copy.id.clone());
                    record.rel = (rel != REL_CHILDREN).then(|| rel.to_string());
                })?;
                self.bus.with_record_mut(&copy.id, |record| {
                    record
                        .linked
                        .entry(rel.to_string())
                        .or_default()
                        .push(owned_copy.id.clone());
                })?;
                owned_copy.changed();
            }
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::{Bus, GraphError, NodeEvent};
    use crate::model::component::{Checkbox, Component, ComponentKind, NodeValue, Page};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn record_changes(bus: &Bus) -> Rc<RefCell<Vec<String>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        bus.observe(move |event| {
            if let NodeEvent::Changed(node) = event {
                sink.borrow_mut().push(node.id().to_string());
            }
        });
        events
    }

    #[test]
    fn alias_proxies_name_value_and_children() {
        let bus = Bus::new();
        let target = bus.make("@root/Target", Some(NodeValue::text("v1"))).unwrap();
        bus.make("@root/Target/Child", None).unwrap();
        let alias = bus.make("@root/Alias", None).unwrap();
        alias.set_ref_to(Some(&target)).unwrap();

        assert!(alias.is_ref());
        assert_eq!(alias.name().unwrap(), "Target");
        assert_eq!(alias.value().unwrap(), Some(NodeValue::text("v1")));
        assert_eq!(alias.child_count().unwrap(), 1);

        alias.set_name("Renamed").unwrap();
        assert_eq!(target.name().unwrap(), "Renamed");
        assert_eq!(alias.raw().unwrap().name, "Alias");

        let extra = bus.make("@root/Extra", None).unwrap();
        alias.add_child(&extra).unwrap();
        assert_eq!(extra.parent().unwrap(), Some(target.clone()));
        assert!(alias.remove_child(&extra).unwrap());
        assert_eq!(target.child_count().unwrap(), 1);
        assert_eq!(extra.parent().unwrap(), None);
    }

    #[test]
    fn destroying_alias_keeps_target() {
        let bus = Bus::new();
        let target = bus.make("@root/Target", None).unwrap();
        let alias = bus.make("@root/Alias", None).unwrap();
        alias.set_ref_to(Some(&target)).unwrap();

        alias.destroy().unwrap();

        assert!(alias.is_destroyed());
        assert!(!target.is_destroyed());
    }

    #[test]
    fn destroy_removes_subtree_and_notifies_root_once() {
        let bus = Bus::new();
        let root = bus.make("@root", None).unwrap();
        let a = bus.make("@root/A", None).unwrap();
        let b = bus.make("@root/A/B", None).unwrap();
        let c = bus.make("@root/A/C", None).unwrap();
        let checkbox = a
            .add_component(Component::Checkbox(Checkbox::default()))
            .unwrap();
        let changes = record_changes(&bus);

        a.destroy().unwrap();

        for node in [&a, &b, &c, &checkbox] {
            assert!(node.is_destroyed());
            assert_eq!(bus.find(node.id()), None);
        }
        assert!(root.children().unwrap().is_empty());
        let root_changes = changes
            .borrow()
            .iter()
            .filter(|id| id.as_str() == "@root")
            .count();
        assert_eq!(root_changes, 1);
    }

    #[test]
    fn destroy_removes_nodes_in_custom_relations() {
        let bus = Bus::new();
        bus.make("@root", None).unwrap();
        let a = bus.make("@root/A", None).unwrap();
        let tag = bus.make("@root/Tag", None).unwrap();
        let nested = bus.make("@root/Tag/Nested", None).unwrap();
        a.add_linked("Tags", &tag).unwrap();

        a.destroy().unwrap();

        assert!(tag.is_destroyed());
        assert!(nested.is_destroyed());
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn duplicate_copies_custom_relations() {
        let bus = Bus::new();
        bus.make("@root", None).unwrap();
        let a = bus.make("@root/A", None).unwrap();
        let tag = bus.make("@root/Tag", None).unwrap();
        a.add_linked("Tags", &tag).unwrap();

        let copy = a.duplicate().unwrap();

        let tags = copy.linked("Tags").unwrap();
        assert_eq!(tags.len(), 1);
        assert_ne!(tags[0], tag);
        assert_eq!(tags[0].name().unwrap(), "Tag");
        assert_eq!(tags[0].parent().unwrap(), Some(copy));
    }

    #[test]
    fn duplicate_deep_copies_with_fresh_ids() {
        let bus = Bus::new();
        let root = bus.make("@root", None).unwrap();
        let original = bus.make("@root/Original", Some(NodeValue::text("body"))).unwrap();
        bus.make("@root/Original/Child", None).unwrap();
        bus.make("@root/Original/Child/Grandchild", None).unwrap();
        original.add_field("status", Some(NodeValue::text("open"))).unwrap();
        original
            .add_component(Component::Page(Page {
                markdown: "# notes".to_string(),
            }))
            .unwrap();
        let after = bus.make("@root/After", None).unwrap();

        let copy = original.duplicate().unwrap();

        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.name().unwrap(), "Original");
        assert_eq!(copy.value().unwrap(), original.value().unwrap());
        assert_eq!(copy.sibling_index().unwrap(), 1);
        assert_eq!(after.sibling_index().unwrap(), 2);
        assert_eq!(root.child_count().unwrap(), 3);

        let mut original_ids = HashSet::new();
        original.walk(
            |node| {
                original_ids.insert(node.id().to_string());
                false
            },
            crate::bus::WalkOptions::subtree(),
        );
        let mut copy_ids = Vec::new();
        copy.walk(
            |node| {
                copy_ids.push(node.id().to_string());
                false
            },
            crate::bus::WalkOptions::subtree(),
        );
        assert_eq!(copy_ids.len(), original_ids.len());
        assert!(copy_ids.iter().all(|id| !original_ids.contains(id)));

        assert_eq!(
            copy.field("status").unwrap().unwrap().value().unwrap(),
            Some(NodeValue::text("open"))
        );
        assert_eq!(
            copy.component(ComponentKind::Page).unwrap(),
            Some(Component::Page(Page {
                markdown: "# notes".to_string()
            }))
        );
        let copied_child = &copy.children().unwrap()[0];
        assert_eq!(copied_child.parent().unwrap(), Some(copy.clone()));
        assert_eq!(copied_child.path().unwrap(), "@root/Original/Child");
    }

    #[test]
    fn sibling_index_reorders_within_parent_only() {
        let bus = Bus::new();
        let root = bus.make("@root", None).unwrap();
        let a = bus.make("@root/A", None).unwrap();
        let b = bus.make("@root/B", None).unwrap();
        let c = bus.make("@root/C", None).unwrap();

        a.set_sibling_index(2).unwrap();
        assert_eq!(root.children().unwrap(), vec![b.clone(), c.clone(), a.clone()]);

        a.set_sibling_index(99).unwrap();
        assert_eq!(root.children().unwrap(), vec![b.clone(), c.clone(), a.clone()]);

        c.set_sibling_index(0).unwrap();
        assert_eq!(root.children().unwrap(), vec![c.clone(), b.clone(), a.clone()]);
        assert_eq!(b.prev_sibling().unwrap(), Some(c.clone()));
        assert_eq!(b.next_sibling().unwrap(), Some(a.clone()));
        assert_eq!(c.prev_sibling().unwrap(), None);
    }

    #[test]
    fn set_parent_moves_between_relation_lists() {
        let bus = Bus::new();
        let left = bus.make("@root/Left", None).unwrap();
        let right = bus.make("@root/Right", None).unwrap();
        let item = bus.make("@root/Left/Item", None).unwrap();

        item.set_parent(Some(&right)).unwrap();

        assert!(left.children().unwrap().is_empty());
        assert_eq!(right.children().unwrap(), vec![item.clone()]);
        assert_eq!(item.path().unwrap(), "@root/Right/Item");
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let bus = Bus::new();
        let outer = bus.make("@root/Outer", None).unwrap();
        let inner = bus.make("@root/Outer/Inner", None).unwrap();

        let err = outer.set_parent(Some(&inner)).unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                node_id: outer.id().to_string(),
                parent_id: inner.id().to_string(),
            }
        );
        assert!(matches!(
            outer.add_child(&outer),
            Err(GraphError::CycleDetected { .. })
        ));
    }

    #[test]
    fn components_are_unique_per_kind() {
        let bus = Bus::new();
        let task = bus.make("@root/Task", None).unwrap();

        let first = task
            .add_component(Component::Checkbox(Checkbox { checked: false }))
            .unwrap();
        let second = task
            .add_component(Component::Checkbox(Checkbox { checked: true }))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(task.components().unwrap().len(), 1);
        assert_eq!(
            task.component(ComponentKind::Checkbox).unwrap(),
            Some(Component::Checkbox(Checkbox { checked: true }))
        );
        assert!(task.remove_component(ComponentKind::Checkbox).unwrap());
        assert!(!task.has_component(ComponentKind::Checkbox));
        assert!(first.is_destroyed());
    }

    #[test]
    fn setters_change_hash_and_fail_on_destroyed_nodes() {
        let bus = Bus::new();
        let node = bus.make("@root/Item", None).unwrap();
        let before = node.hash().unwrap();

        node.set_value(Some(NodeValue::text("changed"))).unwrap();
        assert_ne!(node.hash().unwrap(), before);

        node.destroy().unwrap();
        assert_eq!(
            node.name(),
            Err(GraphError::NodeNotFound(node.id().to_string()))
        );
        assert!(node.set_attr("k", "v").is_err());
    }
}
