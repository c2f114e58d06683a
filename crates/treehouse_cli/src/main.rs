//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `treehouse_core` linkage with a deterministic probe.
//! - Print the outline of a workspace directory when one is given.

use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use treehouse_core::{Backend, Node, WalkOptions, Workbench, WorkspaceConfig};

fn main() -> ExitCode {
    println!("treehouse_core ping={}", treehouse_core::ping());
    println!("treehouse_core version={}", treehouse_core::core_version());

    let Some(dir) = std::env::args_os().nth(1).map(PathBuf::from) else {
        return ExitCode::SUCCESS;
    };
    match print_outline(dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn print_outline(dir: PathBuf) -> Result<(), String> {
    let dir = std::path::absolute(&dir).map_err(|err| err.to_string())?;
    treehouse_core::init_logging(treehouse_core::default_log_level(), dir.join("logs"))
        .map_err(|err| err.to_string())?;

    let workbench = Workbench::new(Backend::local_dir(&dir), WorkspaceConfig::default())
        .map_err(|err| err.to_string())?;
    let main = workbench.load().map_err(|err| err.to_string())?;
    info!(
        "event=cli_outline module=cli status=ok nodes={}",
        workbench.bus().len()
    );

    let head = main.head();
    let depth_of = |node: &Node| node.ancestors().map(|ancestors| ancestors.len()).unwrap_or(0);
    let base = depth_of(head);
    head.walk(
        |node| {
            let depth = depth_of(node).saturating_sub(base);
            let name = node.name().unwrap_or_default();
            println!("{}{}", "  ".repeat(depth), name);
            false
        },
        WalkOptions::default(),
    );
    Ok(())
}
