//! Internal utilities.

use crate::error::{Result, SplitRouteError};
use std::path::{Path, PathBuf};

/// Tools a real run shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["dig", "route", "netstat", "networksetup", "ifconfig"];

/// Returns `true` if the effective user is root.
#[must_use]
pub fn is_root() -> bool {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Finds `tool` in the directories of `path_var` (a `PATH`-style list).
#[must_use]
pub fn find_in(tool: &str, path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

/// Checks that every tool in `tools` is on `PATH`.
///
/// # Errors
///
/// Returns [`SplitRouteError::MissingTool`] naming the first absent tool.
pub fn require_tools(tools: &[&str]) -> Result<()> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    for tool in tools {
        if find_in(tool, &path_var).is_none() {
            return Err(SplitRouteError::MissingTool((*tool).to_string()));
        }
    }
    Ok(())
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}
