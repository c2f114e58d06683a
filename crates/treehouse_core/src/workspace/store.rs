//! Workspace persistence service.
//!
//! # Responsibility
//! - Own the session Bus and its persisted side state (expansion flags,
//!   last opened node, settings).
//! - Load the workspace file into the Bus and save snapshots back through
//!   the debounced writer.
//!
//! # Invariants
//! - `@root` exists after every successful `load`.
//! - Scheduled saves build at most one snapshot per debounce window; later
//!   changes stay pending until `save_pending`, `flush` or drop.
//! - Files newer than `WORKSPACE_FILE_VERSION` are rejected before import.
//! - A failed load leaves the Bus untouched.

use super::snapshot::{
    migrate_legacy_names, ExpandedState, Settings, WorkspaceFile, WORKSPACE_FILE_VERSION,
};
use super::writer::{ErrorSink, SaveWriter};
use crate::backend::{BackendError, FileStore};
use crate::bus::{Bus, GraphError, Node};
use crate::model::raw_node::NodeId;
use log::{error, info, trace, warn};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// ID of the workspace root node.
pub const ROOT_ID: &str = "@root";

const DEFAULT_WORKSPACE_PATH: &str = "workspace.json";
const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors raised while loading or saving a workspace.
#[derive(Debug)]
pub enum WorkspaceError {
    Backend(BackendError),
    Serialization(serde_json::Error),
    Graph(GraphError),
    /// File written by a newer version of the application.
    UnsupportedVersion {
        file_version: u32,
        latest_supported: u32,
    },
    /// Background writer thread could not be started.
    Writer(std::io::Error),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "invalid workspace file: {err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::UnsupportedVersion {
                file_version,
                latest_supported,
            } => write!(
                f,
                "workspace file version {file_version} is newer than supported version {latest_supported}"
            ),
            Self::Writer(err) => write!(f, "failed to start workspace writer: {err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::UnsupportedVersion { .. } => None,
            Self::Writer(err) => Some(err),
        }
    }
}

impl From<BackendError> for WorkspaceError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<serde_json::Error> for WorkspaceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<GraphError> for WorkspaceError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

/// Where and how often the workspace is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// File path inside the file store.
    pub path: String,
    /// Quiet period after the last save before the file is written.
    pub debounce: Duration,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_WORKSPACE_PATH.to_string(),
            debounce: DEFAULT_SAVE_DEBOUNCE,
        }
    }
}

/// Persisted session state around one Bus.
pub struct Workspace {
    bus: Bus,
    files: Arc<dyn FileStore>,
    config: WorkspaceConfig,
    last_opened: RefCell<Option<NodeId>>,
    expanded: RefCell<ExpandedState>,
    settings: RefCell<Settings>,
    dirty: Cell<bool>,
    last_snapshot: Cell<Option<Instant>>,
    snapshots_built: Cell<u64>,
    writer: SaveWriter,
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(err) = self.save_pending() {
            error!(
                "event=workspace_save module=workspace status=error stage=drop error={}",
                err
            );
        }
    }
}

impl Workspace {
    /// Creates an empty workspace whose write failures are only logged.
    pub fn new(files: Arc<dyn FileStore>, config: WorkspaceConfig) -> WorkspaceResult<Self> {
        Self::with_error_sink(files, config, Arc::new(|_: &BackendError| {}))
    }

    /// Creates an empty workspace forwarding write failures to `on_error`.
    ///
    /// A [`BackendError::LockStolen`] delivered here means another session
    /// owns the file; the host should reload instead of merging.
    pub fn with_error_sink(
        files: Arc<dyn FileStore>,
        config: WorkspaceConfig,
        on_error: ErrorSink,
    ) -> WorkspaceResult<Self> {
        let writer = SaveWriter::spawn(
            Arc::clone(&files),
            config.path.clone(),
            config.debounce,
            on_error,
        )
        .map_err(WorkspaceError::Writer)?;
        Ok(Self {
            bus: Bus::new(),
            files,
            config,
            last_opened: RefCell::new(None),
            expanded: RefCell::new(ExpandedState::default()),
            settings: RefCell::new(Settings::default()),
            dirty: Cell::new(false),
            last_snapshot: Cell::new(None),
            snapshots_built: Cell::new(0),
            writer,
        })
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// The `@root` node, created when missing.
    pub fn root(&self) -> WorkspaceResult<Node> {
        Ok(self.bus.make(ROOT_ID, None)?)
    }

    /// Reads the workspace file and imports it into the Bus.
    ///
    /// A missing file yields a fresh workspace with only `@root`.
    pub fn load(&self) -> WorkspaceResult<()> {
        let started_at = Instant::now();
        let result = self.load_inner();
        match &result {
            Ok(nodes) => info!(
                "event=workspace_load module=workspace status=ok nodes={} duration_ms={}",
                nodes,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=workspace_load module=workspace status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result.map(|_| ())
    }

    fn load_inner(&self) -> WorkspaceResult<usize> {
        let Some(contents) = self.files.read_file(&self.config.path)? else {
            self.root()?;
            return Ok(0);
        };

        let mut file: WorkspaceFile = serde_json::from_str(&contents)?;
        if file.version > WORKSPACE_FILE_VERSION {
            return Err(WorkspaceError::UnsupportedVersion {
                file_version: file.version,
                latest_supported: WORKSPACE_FILE_VERSION,
            });
        }

        let renamed = migrate_legacy_names(&mut file.nodes);
        if renamed > 0 {
            warn!(
                "event=workspace_migrate module=workspace status=ok renamed={}",
                renamed
            );
        }

        let total = file.nodes.len();
        self.bus.import(file.nodes);

        // Side state first: creating `@root` below may already trigger a save.
        file.expanded.retain_known(|id| self.bus.contains(id));
        *self.expanded.borrow_mut() = file.expanded;
        *self.last_opened.borrow_mut() = file.lastopen.filter(|id| self.bus.contains(id));
        *self.settings.borrow_mut() = file.settings;
        self.root()?;
        Ok(total)
    }

    /// Current state as a workspace document.
    pub fn snapshot(&self) -> WorkspaceFile {
        WorkspaceFile {
            version: WORKSPACE_FILE_VERSION,
            lastopen: self.last_opened.borrow().clone(),
            expanded: self.expanded.borrow().clone(),
            nodes: self.bus.export(),
            settings: self.settings.borrow().clone(),
        }
    }

    /// Serializes the current snapshot and hands it to the debounced writer.
    pub fn save(&self) -> WorkspaceResult<()> {
        let contents = serde_json::to_string(&self.snapshot())?;
        self.dirty.set(false);
        self.last_snapshot.set(Some(Instant::now()));
        let built = self.snapshots_built.get() + 1;
        self.snapshots_built.set(built);
        trace!(
            "event=workspace_snapshot module=workspace status=ok snapshots={} bytes={}",
            built,
            contents.len()
        );
        self.writer.submit(contents);
        Ok(())
    }

    /// Marks the workspace changed.
    ///
    /// A snapshot is built right away only when none was built during the
    /// last debounce window. Otherwise the change waits for the next
    /// scheduled save after the window, [`Workspace::save_pending`],
    /// [`Workspace::flush`] or drop.
    pub fn schedule_save(&self) -> WorkspaceResult<()> {
        self.dirty.set(true);
        let due = self
            .last_snapshot
            .get()
            .map_or(true, |at| at.elapsed() >= self.config.debounce);
        if due {
            self.save()?;
        }
        Ok(())
    }

    /// Saves when changes are pending. Returns whether a snapshot was built.
    pub fn save_pending(&self) -> WorkspaceResult<bool> {
        if !self.dirty.get() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Number of snapshots serialized by this workspace.
    pub fn snapshots_built(&self) -> u64 {
        self.snapshots_built.get()
    }

    /// Saves pending changes, then blocks until every scheduled write has
    /// completed.
    pub fn flush(&self) {
        if let Err(err) = self.save_pending() {
            error!(
                "event=workspace_save module=workspace status=error stage=flush error={}",
                err
            );
        }
        self.writer.flush();
    }

    pub fn is_expanded(&self, head: &Node, node: &Node) -> bool {
        self.expanded.borrow().get(head.id(), node.id())
    }

    /// Stores one expansion flag and saves when it changed.
    pub fn set_expanded(&self, head: &Node, node: &Node, expanded: bool) -> WorkspaceResult<()> {
        let changed = self
            .expanded
            .borrow_mut()
            .set(head.id(), node.id(), expanded);
        if changed {
            self.save()?;
        }
        Ok(())
    }

    pub fn last_opened(&self) -> Option<Node> {
        let id = self.last_opened.borrow().clone()?;
        self.bus.get(&id)
    }

    pub fn set_last_opened(&self, node: &Node) -> WorkspaceResult<()> {
        let previous = self.last_opened.replace(Some(node.id().to_string()));
        if previous.as_deref() != Some(node.id()) {
            self.save()?;
        }
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn set_settings(&self, settings: Settings) -> WorkspaceResult<()> {
        *self.settings.borrow_mut() = settings;
        self.save()
    }
}
