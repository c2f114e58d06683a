//! Core node graph for Treehouse.
//! This crate owns the graph store, its persistence and the editing session.

pub mod backend;
pub mod bus;
pub mod logging;
pub mod model;
pub mod workbench;
pub mod workspace;

pub use backend::{
    Authenticator, Backend, BackendError, BackendResult, DirFileStore, FileStore,
    LocalAuthenticator, MemoryFileStore, MemorySearchIndex, SearchDoc, SearchIndex, User,
};
pub use bus::{Bus, GraphError, GraphResult, Node, NodeEvent, ObserverId, WalkOptions, WeakBus};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::component::{
    Checkbox, Component, ComponentKind, Description, NodeValue, Page, SmartNode, Tag,
};
pub use model::raw_node::{NodeId, RawNode};
pub use workbench::{Clipboard, ClipboardOp, Path, Workbench, WorkbenchError, WorkbenchResult};
pub use workspace::{
    Settings, Workspace, WorkspaceConfig, WorkspaceError, WorkspaceFile, WorkspaceResult, ROOT_ID,
};

/// Host linkage check: resolves `@root` in a throwaway Bus.
///
/// Returns `"pong"` when the graph store answers, `"degraded"` otherwise.
pub fn ping() -> &'static str {
    let bus = Bus::new();
    match bus.make(ROOT_ID, None) {
        Ok(root) if bus.find(ROOT_ID).as_ref() == Some(&root) => "pong",
        _ => "degraded",
    }
}

/// Version of `treehouse_core`, as printed by the CLI banner.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
