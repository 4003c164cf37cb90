use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::error::{KinedlError, KinedlResult};

/// Resolve a configured tool path, either a bare name looked up in `PATH` or a path
/// to the executable.
pub fn locate_tool(tool: &'static str, path: &Path) -> KinedlResult<PathBuf> {
    which::which(path).map_err(|e| {
        tracing::debug!("Looking up {tool} at {}: {e}", path.display());
        KinedlError::ToolNotFound {
            tool,
            path: path.to_path_buf(),
        }
    })
}

/// Run an external tool to completion and fail on a non-zero exit status.
pub async fn run_tool(tool: &'static str, path: &Path, command: &mut Command) -> KinedlResult<()> {
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => KinedlError::ToolNotFound {
                tool,
                path: path.to_path_buf(),
            },
            _ => KinedlError::IOError(e),
        })?;

    if !output.status.success() {
        return Err(KinedlError::ToolFailed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
