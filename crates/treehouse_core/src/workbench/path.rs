//! Panel paths and visual row navigation.
//!
//! # Responsibility
//! - Identify one visual instance of a node: the same node can appear in
//!   several panels or under several aliases.
//! - Compute the previous and next visible outline row.
//!
//! # Invariants
//! - A path always holds its head; `pop` never removes it.
//! - Rows of a node are its target's fields followed by its target's children.
//! - The head row is always treated as expanded.

use crate::bus::{GraphResult, Node};
use std::fmt::{Debug, Formatter};

/// Answers whether `node` is expanded inside the panel headed by `head`.
pub trait Expansion {
    fn is_expanded(&self, head: &Node, node: &Node) -> bool;
}

impl<F> Expansion for F
where
    F: Fn(&Node, &Node) -> bool,
{
    fn is_expanded(&self, head: &Node, node: &Node) -> bool {
        self(head, node)
    }
}

/// Rooted stack of nodes from a panel head down to one row.
#[derive(Clone, PartialEq, Eq)]
pub struct Path {
    name: String,
    nodes: Vec<Node>,
}

impl Debug for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Path").field("key", &self.key()).finish()
    }
}

impl Path {
    /// Creates a path holding only `head`, owned by panel `name`.
    pub fn new(head: Node, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![head],
        }
    }

    /// Panel name this path belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> &Node {
        &self.nodes[0]
    }

    /// Row the path points at.
    pub fn node(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Parent row of `node()`, `None` at the head.
    pub fn previous(&self) -> Option<&Node> {
        self.nodes.len().checked_sub(2).map(|index| &self.nodes[index])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`; a path holds at least its head.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Removes the last row. The head is never removed.
    pub fn pop(&mut self) -> Option<Node> {
        if self.nodes.len() > 1 {
            self.nodes.pop()
        } else {
            None
        }
    }

    /// Copy of this path extended by `node`.
    pub fn sub(&self, node: Node) -> Path {
        let mut sub = self.clone();
        sub.push(node);
        sub
    }

    /// Stable identity of this visual row, unique across panels.
    pub fn key(&self) -> String {
        let ids = self.nodes.iter().map(Node::id).collect::<Vec<_>>();
        format!("{}:{}", self.name, ids.join(":"))
    }

    /// Whether the row is expanded; the head always is.
    pub fn is_expanded(&self, expansion: &dyn Expansion) -> bool {
        self.nodes.len() == 1 || expansion.is_expanded(self.head(), self.node())
    }

    fn contains_target_of(&self, node: &Node) -> bool {
        let target = node.target();
        self.nodes[..self.nodes.len() - 1]
            .iter()
            .any(|ancestor| ancestor.target() == target)
    }
}

/// Visible rows under `node`: its target's fields, then its target's children.
pub fn rows(node: &Node) -> GraphResult<Vec<Node>> {
    let target = node.target();
    let mut rows = target.fields()?;
    rows.extend(target.children()?);
    Ok(rows)
}

/// Row shown directly above `path`, or `None` at the top of the panel.
pub fn find_above(path: &Path, expansion: &dyn Expansion) -> GraphResult<Option<Path>> {
    let Some(parent) = path.previous() else {
        return Ok(None);
    };
    let siblings = rows(parent)?;
    let Some(index) = siblings.iter().position(|row| row == path.node()) else {
        return Ok(None);
    };

    let mut above = path.clone();
    above.pop();
    if index == 0 {
        if above.len() == 1 {
            return Ok(None);
        }
        return Ok(Some(above));
    }

    above.push(siblings[index - 1].clone());
    last_visible_descendant(above, expansion).map(Some)
}

/// Row shown directly below `path`, or `None` at the bottom of the panel.
pub fn find_below(path: &Path, expansion: &dyn Expansion) -> GraphResult<Option<Path>> {
    if path.is_expanded(expansion) && !path.contains_target_of(path.node()) {
        if let Some(first) = rows(path.node())?.into_iter().next() {
            return Ok(Some(path.sub(first)));
        }
    }

    let mut cursor = path.clone();
    while let Some(node) = cursor.pop() {
        let siblings = rows(cursor.node())?;
        let next = siblings
            .iter()
            .position(|row| row == &node)
            .and_then(|index| siblings.get(index + 1));
        if let Some(next) = next {
            return Ok(Some(cursor.sub(next.clone())));
        }
    }
    Ok(None)
}

fn last_visible_descendant(mut path: Path, expansion: &dyn Expansion) -> GraphResult<Path> {
    while path.is_expanded(expansion) && !path.contains_target_of(path.node()) {
        let Some(last) = rows(path.node())?.pop() else {
            break;
        };
        path.push(last);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{find_above, find_below, Path};
    use crate::bus::{Bus, Node};
    use std::collections::HashSet;

    struct Outline {
        root: Node,
        a: Node,
        a1: Node,
        a2: Node,
        b: Node,
    }

    // @root
    //   A (field: Due)
    //     A1
    //     A2
    //   B
    fn outline(bus: &Bus) -> Outline {
        let root = bus.make("@root", None).unwrap();
        let a = bus.make("@root/A", None).unwrap();
        a.add_field("Due", None).unwrap();
        let a1 = bus.make("@root/A/A1", None).unwrap();
        let a2 = bus.make("@root/A/A2", None).unwrap();
        let b = bus.make("@root/B", None).unwrap();
        Outline { root, a, a1, a2, b }
    }

    fn names(path: &Path) -> Vec<String> {
        path.nodes().iter().map(|node| node.name().unwrap()).collect()
    }

    #[test]
    fn pop_never_removes_head() {
        let bus = Bus::new();
        let tree = outline(&bus);
        let mut path = Path::new(tree.root.clone(), "main").sub(tree.a.clone());

        assert_eq!(path.previous(), Some(&tree.root));
        assert_eq!(path.pop(), Some(tree.a.clone()));
        assert_eq!(path.pop(), None);
        assert_eq!(path.len(), 1);
        assert_eq!(path.node(), &tree.root);
        assert_eq!(path.key(), "main:@root");
    }

    #[test]
    fn collapsed_rows_are_skipped() {
        let bus = Bus::new();
        let tree = outline(&bus);
        let collapsed = |_: &Node, _: &Node| false;
        let a = Path::new(tree.root.clone(), "main").sub(tree.a.clone());

        let below = find_below(&a, &collapsed).unwrap().unwrap();
        assert_eq!(below.node(), &tree.b);

        let above = find_above(&below, &collapsed).unwrap().unwrap();
        assert_eq!(above.node(), &tree.a);
        assert_eq!(find_above(&above, &collapsed).unwrap(), None);
    }

    #[test]
    fn expanded_rows_visit_fields_before_children() {
        let bus = Bus::new();
        let tree = outline(&bus);
        let expanded = HashSet::from([tree.a.id().to_string()]);
        let expansion = move |_: &Node, node: &Node| expanded.contains(node.id());

        let mut path = Path::new(tree.root.clone(), "main").sub(tree.a.clone());
        let mut visited = vec![names(&path).join("/")];
        while let Some(next) = find_below(&path, &expansion).unwrap() {
            visited.push(names(&next).join("/"));
            path = next;
        }
        assert_eq!(
            visited,
            vec!["@root/A", "@root/A/Due", "@root/A/A1", "@root/A/A2", "@root/B"]
        );

        let above_b = find_above(&path, &expansion).unwrap().unwrap();
        assert_eq!(above_b.node(), &tree.a2);
        let above_a1 = find_above(
            &Path::new(tree.root.clone(), "main")
                .sub(tree.a.clone())
                .sub(tree.a1.clone()),
            &expansion,
        )
        .unwrap()
        .unwrap();
        assert_eq!(names(&above_a1), vec!["@root", "A", "Due"]);
    }

    #[test]
    fn alias_rows_show_target_children() {
        let bus = Bus::new();
        let tree = outline(&bus);
        let alias = bus.make("@root/alias", None).unwrap();
        alias.set_ref_to(Some(&tree.a)).unwrap();
        let expansion = |_: &Node, _: &Node| true;

        let path = Path::new(tree.root.clone(), "main").sub(alias.clone());
        let below = find_below(&path, &expansion).unwrap().unwrap();

        assert_eq!(below.previous(), Some(&alias));
        assert_eq!(below.node().name().unwrap(), "Due");
    }

    #[test]
    fn self_referencing_alias_does_not_loop() {
        let bus = Bus::new();
        let tree = outline(&bus);
        let alias = bus.make("@root/A/loop", None).unwrap();
        alias.set_ref_to(Some(&tree.a)).unwrap();
        let expansion = |_: &Node, _: &Node| true;

        let path = Path::new(tree.root.clone(), "main").sub(tree.b.clone());
        let above = find_above(&path, &expansion).unwrap().unwrap();

        assert_eq!(above.node(), &alias);
        assert_eq!(above.len(), 3);
    }
}
