//! Local backend
//!
//! Runs commands through the host shell. Acquires no resources, so close
//! is a no-op and failures are returned verbatim with no retries.

use crate::error::ExecutorError;
use crate::executor::Executor;
use crate::process;
use tokio_util::sync::CancellationToken;

const DEFAULT_SHELL: &str = "sh";

/// Execution backend for the local machine
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
}

impl LocalExecutor {
    /// Create a local backend using the default shell
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    /// Create a local backend using a specific shell
    #[inline]
    #[must_use]
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Executor for LocalExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn run(
        &mut self,
        cancel: &CancellationToken,
        command: &str,
    ) -> Result<Vec<u8>, ExecutorError> {
        process::capture(cancel, &self.shell, &["-c", command]).await
    }

    async fn close(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }
}
