//! Workspace persistence.
//!
//! # Responsibility
//! - Define the workspace file format and its migrations.
//! - Persist the Bus plus session side state through a `FileStore`.

pub mod snapshot;
pub mod store;
pub mod writer;

pub use snapshot::{ExpandedState, Settings, WorkspaceFile, WORKSPACE_FILE_VERSION};
pub use store::{Workspace, WorkspaceConfig, WorkspaceError, WorkspaceResult, ROOT_ID};
pub use writer::ErrorSink;
