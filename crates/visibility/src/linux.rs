//! Linux-specific implementation.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::{dotfile, ConcealError};

/// Hide the file by name, then tag it as hidden and make it immutable.
///
/// Only the rename is mandatory, the attributes are set with the external
/// tools that may be missing or need privileges the process doesn't have.
pub(super) fn conceal(path: &Path) -> Result<PathBuf, ConcealError> {
    let path = dotfile::rename(path)?;

    // The extended attribute goes first, an immutable file rejects it.
    run_tool("attr", &["-s", "hidden", "-V", "1"], &path);
    run_tool("chattr", &["+i"], &path);

    Ok(path)
}

/// Run the tool against the path, a failure is only logged.
fn run_tool(program: &str, args: &[&str], path: &Path) {
    match Command::new(program).args(args).arg(path).output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            tracing::warn!(
                message = "tool failed",
                %program,
                path = %path.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(err) => {
            tracing::warn!(message = "unable to run the tool", %program, error = %err);
        }
    }
}
