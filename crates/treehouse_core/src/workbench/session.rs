//! Workbench session service.
//!
//! # Responsibility
//! - Wire the workspace Bus to the backend: index on change, drop from the
//!   index on destroy, schedule a save after every change.
//! - Save pending changes once at the end of every editing command.
//! - Provide panel, expansion, clipboard and outline editing commands.
//!
//! # Invariants
//! - The main panel is the first panel and cannot be closed.
//! - Search results only contain nodes still present in the Bus.
//! - Rows moved by editing commands stay in the `Children` relation.

use super::path::{find_above, find_below, Expansion, Path};
use crate::backend::{Backend, SearchDoc, SearchIndex};
use crate::bus::{Bus, GraphError, GraphResult, Node, NodeEvent, ObserverId};
use crate::model::component::{Component, ComponentKind, NodeValue};
use crate::model::raw_node::{REL_CHILDREN, REL_COMPONENTS};
use crate::workspace::{ErrorSink, Workspace, WorkspaceConfig, WorkspaceError};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;

const MAIN_PANEL: &str = "main";

/// Result type for workbench commands.
pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

/// Errors returned by workbench commands.
#[derive(Debug)]
pub enum WorkbenchError {
    Graph(GraphError),
    Workspace(WorkspaceError),
}

impl Display for WorkbenchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph(err) => write!(f, "{err}"),
            Self::Workspace(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkbenchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            Self::Workspace(err) => Some(err),
        }
    }
}

impl From<GraphError> for WorkbenchError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

impl From<WorkspaceError> for WorkbenchError {
    fn from(value: WorkspaceError) -> Self {
        Self::Workspace(value)
    }
}

/// What `paste` does with the clipboard node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOp {
    /// Paste a deep copy; the clipboard stays filled.
    Copy,
    /// Move the node; the clipboard is cleared.
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clipboard {
    pub node: Node,
    pub op: ClipboardOp,
}

impl Expansion for Workspace {
    fn is_expanded(&self, head: &Node, node: &Node) -> bool {
        Workspace::is_expanded(self, head, node)
    }
}

/// One editing session over a workspace.
pub struct Workbench {
    workspace: Rc<Workspace>,
    backend: Backend,
    panels: RefCell<Vec<Path>>,
    next_panel: Cell<u64>,
    clipboard: RefCell<Option<Clipboard>>,
    observer: ObserverId,
}

impl Drop for Workbench {
    fn drop(&mut self) {
        self.workspace.bus().unobserve(self.observer);
    }
}

impl Workbench {
    /// Creates a session persisting through `backend.files`.
    ///
    /// Nothing is read until [`Workbench::load`] runs.
    pub fn new(backend: Backend, config: WorkspaceConfig) -> WorkbenchResult<Self> {
        let workspace = Workspace::new(Arc::clone(&backend.files), config)?;
        Ok(Self::with_workspace(backend, workspace))
    }

    /// Like [`Workbench::new`], forwarding background write failures to `on_error`.
    pub fn with_error_sink(
        backend: Backend,
        config: WorkspaceConfig,
        on_error: ErrorSink,
    ) -> WorkbenchResult<Self> {
        let workspace = Workspace::with_error_sink(Arc::clone(&backend.files), config, on_error)?;
        Ok(Self::with_workspace(backend, workspace))
    }

    fn with_workspace(backend: Backend, workspace: Workspace) -> Self {
        let workspace = Rc::new(workspace);
        let bus = workspace.bus().clone();

        let index = Arc::clone(&backend.index);
        let saver = Rc::downgrade(&workspace);
        let observer = bus.observe(move |event| {
            match event {
                NodeEvent::Changed(node) => index_node(index.as_ref(), node),
                NodeEvent::Destroyed(id) => index.remove(id),
            }
            if let Some(workspace) = saver.upgrade() {
                if let Err(err) = workspace.schedule_save() {
                    warn!(
                        "event=workspace_save module=workbench status=error error={}",
                        err
                    );
                }
            }
        });

        let index = Arc::clone(&backend.index);
        bus.on_attach(move |node| index_node(index.as_ref(), node));

        Self {
            workspace,
            backend,
            panels: RefCell::new(Vec::new()),
            next_panel: Cell::new(0),
            clipboard: RefCell::new(None),
            observer,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn bus(&self) -> &Bus {
        self.workspace.bus()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    // --- persistence ------------------------------------------------------

    /// Loads the workspace and opens the last opened node (or `@root`).
    pub fn load(&self) -> WorkbenchResult<Path> {
        self.workspace.load()?;
        let head = match self.workspace.last_opened() {
            Some(node) => node,
            None => self.workspace.root()?,
        };
        self.panels.borrow_mut().clear();
        let main = self.open(&head)?;
        self.workspace.save_pending()?;
        info!(
            "event=workbench_load module=workbench status=ok nodes={} head={}",
            self.bus().len(),
            head.id()
        );
        Ok(main)
    }

    pub fn save(&self) -> WorkbenchResult<()> {
        self.workspace.save()?;
        Ok(())
    }

    /// Saves changes made directly through [`Node`] handles since the last
    /// snapshot. Returns whether anything was pending.
    pub fn save_pending(&self) -> WorkbenchResult<bool> {
        Ok(self.workspace.save_pending()?)
    }

    pub fn flush(&self) {
        self.workspace.flush();
    }

    // --- panels -----------------------------------------------------------

    /// Shows `node` in the main panel and remembers it as last opened.
    pub fn open(&self, node: &Node) -> WorkbenchResult<Path> {
        let path = Path::new(node.clone(), MAIN_PANEL);
        {
            let mut panels = self.panels.borrow_mut();
            match panels.first_mut() {
                Some(main) => *main = path.clone(),
                None => panels.push(path.clone()),
            }
        }
        self.workspace.set_last_opened(node)?;
        Ok(path)
    }

    /// Opens `node` in an additional side panel.
    pub fn open_new_panel(&self, node: &Node) -> Path {
        let number = self.next_panel.get() + 1;
        self.next_panel.set(number);
        let path = Path::new(node.clone(), format!("panel-{number}"));
        self.panels.borrow_mut().push(path.clone());
        path
    }

    /// Closes a side panel. Returns `false` for the main or an unknown panel.
    pub fn close_panel(&self, panel: &Path) -> bool {
        let mut panels = self.panels.borrow_mut();
        match panels.iter().position(|open| open.name() == panel.name()) {
            Some(0) | None => false,
            Some(index) => {
                panels.remove(index);
                true
            }
        }
    }

    pub fn panels(&self) -> Vec<Path> {
        self.panels.borrow().clone()
    }

    /// The main panel, once `load` or `open` ran.
    pub fn main_panel(&self) -> Option<Path> {
        self.panels.borrow().first().cloned()
    }

    // --- expansion --------------------------------------------------------

    pub fn is_expanded(&self, path: &Path) -> bool {
        path.is_expanded(self.workspace.as_ref())
    }

    /// Stores the expansion flag of a row. The head row is always expanded.
    pub fn set_expanded(&self, path: &Path, expanded: bool) -> WorkbenchResult<()> {
        if path.len() == 1 {
            return Ok(());
        }
        self.workspace
            .set_expanded(path.head(), path.node(), expanded)?;
        Ok(())
    }

    /// Flips the expansion flag. Returns the new state.
    pub fn toggle_expanded(&self, path: &Path) -> WorkbenchResult<bool> {
        let expanded = !self.is_expanded(path);
        self.set_expanded(path, expanded)?;
        Ok(self.is_expanded(path))
    }

    // --- clipboard --------------------------------------------------------

    pub fn copy(&self, path: &Path) {
        self.fill_clipboard(path, ClipboardOp::Copy);
    }

    pub fn cut(&self, path: &Path) {
        self.fill_clipboard(path, ClipboardOp::Cut);
    }

    pub fn clipboard(&self) -> Option<Clipboard> {
        self.clipboard.borrow().clone()
    }

    /// Pastes the clipboard node right after `path`'s row.
    ///
    /// Returns the path of the pasted row, or `None` when nothing is on the
    /// clipboard.
    pub fn paste(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        let Some(clipboard) = self.live_clipboard() else {
            return Ok(None);
        };
        let pasted = match clipboard.op {
            ClipboardOp::Copy => {
                let copy = clipboard.node.duplicate()?;
                self.place_after(path, &copy)?
            }
            ClipboardOp::Cut => {
                let moved = self.place_after(path, &clipboard.node)?;
                *self.clipboard.borrow_mut() = None;
                moved
            }
        };
        debug!(
            "event=clipboard_paste module=workbench status=ok op={:?} node_id={}",
            clipboard.op,
            pasted.node().id()
        );
        self.workspace.save_pending()?;
        Ok(Some(pasted))
    }

    /// Pastes an alias of the clipboard node right after `path`'s row.
    pub fn paste_reference(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        let Some(clipboard) = self.live_clipboard() else {
            return Ok(None);
        };
        let alias = self.bus().create("", None);
        let placed = alias
            .set_ref_to(Some(&clipboard.node.target()))
            .map_err(WorkbenchError::from)
            .and_then(|()| self.place_after(path, &alias));
        let pasted = self.keep_or_discard(&alias, placed)?;
        self.workspace.save_pending()?;
        Ok(Some(pasted))
    }

    fn fill_clipboard(&self, path: &Path, op: ClipboardOp) {
        *self.clipboard.borrow_mut() = Some(Clipboard {
            node: path.node().clone(),
            op,
        });
    }

    fn live_clipboard(&self) -> Option<Clipboard> {
        let clipboard = self.clipboard.borrow().clone()?;
        if clipboard.node.is_destroyed() {
            *self.clipboard.borrow_mut() = None;
            return None;
        }
        Some(clipboard)
    }

    // --- outline editing --------------------------------------------------

    /// Inserts an empty node on the row below `path`.
    ///
    /// Expanded rows with children (and the head) get a new first child;
    /// other rows get a new next sibling.
    pub fn new_node_after(&self, path: &Path) -> WorkbenchResult<Path> {
        let node = self.bus().create("", None);
        let placed = self.place_new_row(path, &node);
        let created = self.keep_or_discard(&node, placed)?;
        self.workspace.save_pending()?;
        Ok(created)
    }

    fn place_new_row(&self, path: &Path, node: &Node) -> WorkbenchResult<Path> {
        if path.len() == 1 || (self.is_expanded(path) && path.node().has_children()?) {
            path.node().insert_child(node, 0)?;
            return Ok(path.sub(node.clone()));
        }
        self.place_after(path, node)
    }

    /// Removes a freshly created record again when placing it failed.
    fn keep_or_discard(
        &self,
        created: &Node,
        placed: WorkbenchResult<Path>,
    ) -> WorkbenchResult<Path> {
        if placed.is_err() && !created.is_destroyed() {
            if let Err(err) = self.bus().destroy(created) {
                warn!(
                    "event=node_discard module=workbench status=error node_id={} error={}",
                    created.id(),
                    err
                );
            }
        }
        placed
    }

    /// Moves the row under its previous sibling, as that sibling's last child.
    ///
    /// Returns the row's new path, or `None` when there is no previous sibling.
    pub fn indent(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        let node = path.node();
        let mut parent_path = path.clone();
        if parent_path.pop().is_none() || node.rel()? != REL_CHILDREN {
            return Ok(None);
        }
        let Some(previous) = node.prev_sibling()? else {
            return Ok(None);
        };

        previous.add_child(node)?;
        let previous_path = parent_path.sub(previous);
        self.set_expanded(&previous_path, true)?;
        self.workspace.save_pending()?;
        Ok(Some(previous_path.sub(node.clone())))
    }

    /// Moves the row out of its parent, right after that parent.
    ///
    /// Returns `None` for rows directly under the panel head.
    pub fn outdent(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        let node = path.node();
        if path.len() < 3 || node.rel()? != REL_CHILDREN {
            return Ok(None);
        }
        let mut grandparent_path = path.clone();
        grandparent_path.pop();
        let Some(parent) = grandparent_path.pop() else {
            return Ok(None);
        };

        let grandparent = grandparent_path.node();
        let index = grandparent
            .children()?
            .iter()
            .position(|child| child == &parent)
            .map_or(0, |index| index + 1);
        grandparent.insert_child(node, index)?;
        self.workspace.save_pending()?;
        Ok(Some(grandparent_path.sub(node.clone())))
    }

    /// Swaps the row with its previous sibling. Returns whether it moved.
    pub fn move_up(&self, path: &Path) -> WorkbenchResult<bool> {
        let node = path.node();
        if path.len() == 1 {
            return Ok(false);
        }
        let index = node.sibling_index()?;
        if index == 0 {
            return Ok(false);
        }
        node.set_sibling_index(index - 1)?;
        self.workspace.save_pending()?;
        Ok(true)
    }

    /// Swaps the row with its next sibling. Returns whether it moved.
    pub fn move_down(&self, path: &Path) -> WorkbenchResult<bool> {
        let node = path.node();
        if path.len() == 1 || node.next_sibling()?.is_none() {
            return Ok(false);
        }
        node.set_sibling_index(node.sibling_index()? + 1)?;
        self.workspace.save_pending()?;
        Ok(true)
    }

    /// Destroys the row's node and returns the row to focus next.
    ///
    /// The panel head is never deleted.
    pub fn delete(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        if path.len() == 1 {
            return Ok(None);
        }
        let focus = match self.cursor_up(path)? {
            Some(above) => Some(above),
            None => self.cursor_down(path)?.filter(|below| below.previous() != Some(path.node())),
        };
        path.node().destroy()?;
        self.workspace.save_pending()?;
        Ok(focus.filter(|focus| !focus.node().is_destroyed()))
    }

    pub fn cursor_up(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        Ok(find_above(path, self.workspace.as_ref())?)
    }

    pub fn cursor_down(&self, path: &Path) -> WorkbenchResult<Option<Path>> {
        Ok(find_below(path, self.workspace.as_ref())?)
    }

    /// Moves `node` right after `path`'s row and returns its new path.
    fn place_after(&self, path: &Path, node: &Node) -> WorkbenchResult<Path> {
        if path.node() == node {
            return Ok(path.clone());
        }
        let mut parent_path = path.clone();
        if parent_path.pop().is_none() {
            parent_path.node().add_child(node)?;
            return Ok(parent_path.sub(node.clone()));
        }

        // Positions are taken without `node`, which linking removes first.
        let parent = parent_path.node();
        let index = parent
            .children()?
            .iter()
            .filter(|child| *child != node)
            .position(|child| child == path.node())
            .map_or(0, |index| index + 1);
        parent.insert_child(node, index)?;
        Ok(parent_path.sub(node.clone()))
    }

    // --- search -----------------------------------------------------------

    /// Nodes matching `query`, skipping IDs no longer in the Bus.
    pub fn search(&self, query: &str) -> Vec<Node> {
        self.backend
            .index
            .search(query)
            .into_iter()
            .filter_map(|id| self.bus().get(&id))
            .collect()
    }

    /// Runs the query of `node`'s SmartNode component.
    pub fn smart_results(&self, node: &Node) -> WorkbenchResult<Vec<Node>> {
        let Some(Component::SmartNode(smart)) = node.component(ComponentKind::SmartNode)? else {
            return Ok(Vec::new());
        };
        Ok(self
            .search(&smart.query)
            .into_iter()
            .filter(|result| result != node)
            .collect())
    }
}

/// Re-indexes the node owning `node`'s text.
///
/// Component nodes are folded into their owner's document; aliases are kept
/// out of the index so results do not repeat their targets.
fn index_node(index: &dyn SearchIndex, node: &Node) {
    let owner = match node.rel() {
        Ok(rel) if rel == REL_COMPONENTS => match node.parent() {
            Ok(Some(parent)) => parent,
            _ => return,
        },
        Ok(_) => node.clone(),
        Err(_) => return,
    };
    if owner.is_ref() {
        index.remove(owner.id());
        return;
    }
    match search_doc(&owner) {
        Ok(doc) => index.index(doc),
        Err(err) => debug!(
            "event=search_index module=workbench status=skipped node_id={} error={}",
            owner.id(),
            err
        ),
    }
}

fn search_doc(node: &Node) -> GraphResult<SearchDoc> {
    let mut parts = Vec::new();
    if let Some(text) = node.value()?.and_then(|value| value.search_text()) {
        parts.push(text);
    }
    for component in node.components()? {
        let Some(value) = component.value()? else {
            continue;
        };
        if matches!(value, NodeValue::Component(Component::SmartNode(_))) {
            continue;
        }
        if let Some(text) = value.search_text() {
            parts.push(text);
        }
    }
    Ok(SearchDoc {
        id: node.id().to_string(),
        name: node.name()?,
        text: (!parts.is_empty()).then(|| parts.join("\n")),
    })
}
