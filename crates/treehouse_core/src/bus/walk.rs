//! Pre-order graph traversal.

use super::{Bus, Node};
use crate::model::raw_node::{NodeId, REL_CHILDREN, REL_COMPONENTS, REL_FIELDS};
use std::collections::HashSet;

/// Traversal switches for [`Bus::walk`] and [`Node::walk`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Descend through a reference node into its target's children.
    pub follow_refs: bool,
    /// Visit attached component nodes.
    pub include_components: bool,
    /// Visit field nodes.
    pub include_fields: bool,
}

impl WalkOptions {
    /// Fields, components and children of every visited node.
    pub fn subtree() -> Self {
        Self {
            follow_refs: false,
            include_components: true,
            include_fields: true,
        }
    }
}

impl Bus {
    /// Visits every node pre-order, root by root, until `visit` returns `true`.
    ///
    /// Returns whether the walk stopped early.
    pub fn walk<F>(&self, mut visit: F, opts: WalkOptions) -> bool
    where
        F: FnMut(&Node) -> bool,
    {
        let mut expanded_refs = HashSet::new();
        self.roots()
            .iter()
            .any(|root| walk_node(root, &mut visit, opts, &mut expanded_refs))
    }
}

pub(crate) fn walk_node(
    node: &Node,
    visit: &mut dyn FnMut(&Node) -> bool,
    opts: WalkOptions,
    expanded_refs: &mut HashSet<NodeId>,
) -> bool {
    if visit(node) {
        return true;
    }

    let Ok((fields, components, children)) = node.bus().with_record(node.id(), |record| {
        (
            record.linked_ids(REL_FIELDS),
            record.linked_ids(REL_COMPONENTS),
            record.linked_ids(REL_CHILDREN),
        )
    }) else {
        return false;
    };

    let mut next = Vec::new();
    if opts.include_fields {
        next.extend(fields);
    }
    if opts.include_components {
        next.extend(components);
    }

    let target = node.target();
    if opts.follow_refs && target != *node {
        if expanded_refs.insert(target.id().to_string()) {
            if let Ok(target_children) = target.bus().with_record(target.id(), |record| {
                record.linked_ids(REL_CHILDREN)
            }) {
                next.extend(target_children);
            }
        }
    } else {
        next.extend(children);
    }

    next.into_iter()
        .filter_map(|id| node.bus().get(&id))
        .any(|child| walk_node(&child, visit, opts, expanded_refs))
}

#[cfg(test)]
mod tests {
    use super::WalkOptions;
    use crate::bus::Bus;
    use crate::model::component::{Checkbox, Component};

    fn names(bus: &Bus, opts: WalkOptions) -> Vec<String> {
        let mut seen = Vec::new();
        bus.walk(
            |node| {
                seen.push(node.raw().unwrap().name);
                false
            },
            opts,
        );
        seen
    }

    #[test]
    fn walks_pre_order_and_stops_early() {
        let bus = Bus::new();
        bus.make("@root/A/B", None).unwrap();
        bus.make("@root/C", None).unwrap();

        assert_eq!(names(&bus, WalkOptions::default()), vec!["@root", "A", "B", "C"]);

        let mut visited = 0;
        let stopped = bus.walk(
            |node| {
                visited += 1;
                node.raw().unwrap().name == "A"
            },
            WalkOptions::default(),
        );
        assert!(stopped);
        assert_eq!(visited, 2);
    }

    #[test]
    fn includes_components_only_when_asked() {
        let bus = Bus::new();
        let task = bus.make("@root/Task", None).unwrap();
        task.add_component(Component::Checkbox(Checkbox::default()))
            .unwrap();

        assert_eq!(names(&bus, WalkOptions::default()), vec!["@root", "Task"]);
        assert_eq!(
            names(&bus, WalkOptions::subtree()),
            vec!["@root", "Task", "treehouse.Checkbox"]
        );
    }

    #[test]
    fn follows_refs_without_looping() {
        let bus = Bus::new();
        let root = bus.make("@root", None).unwrap();
        let shared = bus.make("@root/Shared", None).unwrap();
        bus.make("@root/Shared/Leaf", None).unwrap();
        let alias = bus.make("@root/Alias", None).unwrap();
        alias.set_ref_to(Some(&shared)).unwrap();
        let back = bus.make("@root/Shared/Back", None).unwrap();
        back.set_ref_to(Some(&root)).unwrap();

        let opts = WalkOptions {
            follow_refs: true,
            ..WalkOptions::default()
        };
        let mut ids = Vec::new();
        bus.walk(
            |node| {
                ids.push(node.id().to_string());
                false
            },
            opts,
        );

        // Each ref target is expanded once per walk: @root via Back, Shared via Alias.
        assert_eq!(ids.len(), 11);
        assert_eq!(ids.iter().filter(|id| *id == alias.id()).count(), 2);
        let plain = names(&bus, WalkOptions::default());
        assert_eq!(plain, vec!["@root", "Shared", "Leaf", "Back", "Alias"]);
    }
}
