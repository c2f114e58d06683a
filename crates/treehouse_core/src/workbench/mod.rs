//! Editing session over one workspace.
//!
//! # Responsibility
//! - Track panels, expansion, clipboard and cursor movement.
//! - Keep the search index and the workspace file in step with the Bus.

pub mod path;
pub mod session;

pub use path::{find_above, find_below, rows, Expansion, Path};
pub use session::{Clipboard, ClipboardOp, Workbench, WorkbenchError, WorkbenchResult};
