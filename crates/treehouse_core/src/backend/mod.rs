//! Backend adapter contracts.
//!
//! # Responsibility
//! - Define the collaborator boundary between the graph core and its host:
//!   authentication, text search and file persistence.
//! - Provide local in-process implementations of every contract.
//!
//! # Invariants
//! - Adapters are `Send + Sync` so persistence can run off the session thread.
//! - Adapters never see `Node` handles, only plain data.

pub mod auth;
pub mod file_store;
pub mod search_index;

use crate::model::raw_node::NodeId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

pub use auth::LocalAuthenticator;
pub use file_store::{DirFileStore, MemoryFileStore};
pub use search_index::MemorySearchIndex;

/// Result type for backend adapter calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by backend adapters.
#[derive(Debug)]
pub enum BackendError {
    /// File read/write failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Path escapes the store root or is otherwise unusable.
    InvalidPath(String),
    /// Another session took over the workspace; local state must reload.
    LockStolen,
    /// Authentication failed or no user is signed in.
    Auth(String),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "file store i/o failed at `{}`: {source}", path.display())
            }
            Self::InvalidPath(path) => write!(f, "invalid file store path `{path}`"),
            Self::LockStolen => write!(f, "workspace lock was taken by another session"),
            Self::Auth(message) => write!(f, "authentication failed: {message}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidPath(_) => None,
            Self::LockStolen => None,
            Self::Auth(_) => None,
        }
    }
}

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub display_name: String,
}

/// Session authentication contract.
pub trait Authenticator: Send + Sync {
    fn login(&self) -> BackendResult<User>;
    fn logout(&self) -> BackendResult<()>;
    fn current_user(&self) -> Option<User>;
}

/// Plain-data projection of one node handed to the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDoc {
    pub id: NodeId,
    pub name: String,
    pub text: Option<String>,
}

/// Text search contract. `search` returns node IDs.
pub trait SearchIndex: Send + Sync {
    fn index(&self, doc: SearchDoc);
    fn remove(&self, id: &str);
    fn search(&self, query: &str) -> Vec<NodeId>;
}

/// Whole-file persistence contract.
pub trait FileStore: Send + Sync {
    /// Returns `None` when the file does not exist.
    fn read_file(&self, path: &str) -> BackendResult<Option<String>>;
    fn write_file(&self, path: &str, contents: &str) -> BackendResult<()>;
}

/// Adapter bundle handed to the workbench.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn Authenticator>,
    pub index: Arc<dyn SearchIndex>,
    pub files: Arc<dyn FileStore>,
}

impl Backend {
    /// In-process backend: local user, memory index, memory file store.
    pub fn in_memory() -> Self {
        Self {
            auth: Arc::new(LocalAuthenticator::default()),
            index: Arc::new(MemorySearchIndex::new()),
            files: Arc::new(MemoryFileStore::new()),
        }
    }

    /// Local backend persisting files below `root`.
    pub fn local_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            files: Arc::new(DirFileStore::new(root)),
            ..Self::in_memory()
        }
    }
}
