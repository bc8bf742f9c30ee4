//! Error types for execution backends
//!
//! Covers the full lifecycle of a backend:
//! - Process spawning and non-zero exits
//! - Provisioning failures (pull/clone/set)
//! - Connectivity failures (dial, handshake, authentication)
//! - Remote command failures
//! - Teardown failures
//! - Cancellation, kept distinct so callers can tell an operator stop
//!   apart from a broken backend

/// Main executor error type
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// An external program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A local command completed with a non-zero status
    #[error("command exited with status {code:?}")]
    CommandFailed {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
    },

    /// A provisioning step failed; the backend was never usable
    #[error("provisioning step `{step}` failed: {source}")]
    Provision {
        /// Which imperative call failed (pull, clone, set, ip)
        step: &'static str,
        /// Underlying error
        #[source]
        source: Box<ExecutorError>,
    },

    /// Dial or handshake failure that is not an I/O or protocol error
    #[error("connect to {addr} failed: {reason}")]
    Connect {
        /// Target address
        addr: String,
        /// What went wrong
        reason: String,
    },

    /// SSH protocol error
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),

    /// `run` was called on a backend with no live connection
    #[error("backend is not connected")]
    NotConnected,

    /// A remote command completed with a non-zero status
    #[error("remote command exited with status {status}")]
    RemoteExit {
        /// Remote exit status
        status: u32,
    },

    /// The remote session ended without reporting an exit status
    #[error("remote session closed before reporting an exit status")]
    SessionClosed,

    /// I/O error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// VM deletion failed during close
    #[error("teardown failed: {source}")]
    Teardown {
        /// Underlying error
        #[source]
        source: Box<ExecutorError>,
    },

    /// The operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Check whether this error is a cancellation
    ///
    /// Cancellation is terminal: it is never retried and propagates
    /// unchanged through provisioning wrappers.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Provision { source, .. } | Self::Teardown { source } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Wrap an error with the provisioning step that produced it
    ///
    /// Cancellation passes through unwrapped.
    pub(crate) fn provision(step: &'static str, source: ExecutorError) -> Self {
        if source.is_cancelled() {
            return Self::Cancelled;
        }
        Self::Provision {
            step,
            source: Box::new(source),
        }
    }
}
