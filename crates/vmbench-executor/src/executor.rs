//! The execution-backend contract
//!
//! A backend is anywhere a command string can be run: the local shell, or
//! an ephemeral VM reached over SSH. Callers depend only on this
//! three-operation contract, never on backend-specific fields.

use crate::error::ExecutorError;
use tokio_util::sync::CancellationToken;

/// Uniform interface for running a command somewhere and getting its
/// output back
///
/// Calls on one backend are sequential by contract: callers must not issue
/// concurrent `run` calls against the same instance.
#[async_trait::async_trait]
pub trait Executor: Send {
    /// Display name used in logs and result tables
    fn name(&self) -> &str;

    /// Run a command string, returning its captured stdout
    ///
    /// Cancelling `cancel` unblocks the call promptly, even where the
    /// underlying transport has no native cancellation support.
    async fn run(
        &mut self,
        cancel: &CancellationToken,
        command: &str,
    ) -> Result<Vec<u8>, ExecutorError>;

    /// Release all held resources
    ///
    /// Safe to call after a partial failure and safe to call more than
    /// once; later calls are no-ops.
    async fn close(&mut self) -> Result<(), ExecutorError>;
}
