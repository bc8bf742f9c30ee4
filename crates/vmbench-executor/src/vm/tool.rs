//! Imperative calls to the external VM management tool
//!
//! The tool's subcommand surface (`pull`, `clone`, `set`, `run`, `ip`,
//! `delete`) is treated as opaque and fallible. Stdout and stderr are
//! captured for diagnostics only, except for `ip`, whose stdout carries
//! the VM address.

use crate::error::ExecutorError;
use crate::process;
use tokio_util::sync::CancellationToken;

/// Run a tool subcommand, discarding its stdout
pub(crate) async fn call(
    cancel: &CancellationToken,
    tool: &str,
    args: &[&str],
) -> Result<(), ExecutorError> {
    call_output(cancel, tool, args).await.map(|_| ())
}

/// Run a tool subcommand, returning its stdout
pub(crate) async fn call_output(
    cancel: &CancellationToken,
    tool: &str,
    args: &[&str],
) -> Result<String, ExecutorError> {
    tracing::debug!(tool, ?args, "running VM management tool");
    let output = process::capture(cancel, tool, args).await?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}
