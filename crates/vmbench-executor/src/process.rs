//! Process Runner
//!
//! Runs one external command, capturing its stdout byte-exact while
//! mirroring both output streams to the diagnostic log. The mirror is
//! line-buffered and never sits between the child and the capture buffer,
//! so a slow logging backend cannot stall or fail a run.

use crate::error::ExecutorError;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Line-buffered mirror into `tracing::debug!`
///
/// Bytes are accumulated until a newline is seen, then emitted as one log
/// line. Incomplete trailing output is flushed when the stream ends.
pub(crate) struct LineSink {
    stream: &'static str,
    pending: Vec<u8>,
}

impl LineSink {
    pub(crate) fn new(stream: &'static str) -> Self {
        Self {
            stream,
            pending: Vec::new(),
        }
    }

    pub(crate) fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            tracing::debug!(stream = self.stream, "{}", text);
        }
    }

    pub(crate) fn flush(&mut self) {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending);
            tracing::debug!(stream = self.stream, "{}", text);
            self.pending.clear();
        }
    }
}

/// Run `program` with `args`, capturing stdout
///
/// Spawns exactly one child process. Stdout is captured into the returned
/// buffer and mirrored to the debug log; stderr is mirrored only. If
/// `cancel` fires while the child is still running it is killed and
/// [`ExecutorError::Cancelled`] is returned.
///
/// # Errors
/// - [`ExecutorError::Spawn`] if the program cannot be started
/// - [`ExecutorError::CommandFailed`] on a non-zero exit
/// - [`ExecutorError::Cancelled`] if the token fired first
pub async fn capture(
    cancel: &CancellationToken,
    program: &str,
    args: &[&str],
) -> Result<Vec<u8>, ExecutorError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecutorError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecutorError::Io(std::io::Error::other("child stdout not piped")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecutorError::Io(std::io::Error::other("child stderr not piped")))?;

    let stdout_task = tokio::spawn(drain(stdout, LineSink::new("stdout"), true));
    let stderr_task = tokio::spawn(drain(stderr, LineSink::new("stderr"), false));

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            // Killing the child closes its pipes, so the readers finish.
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            return Err(ExecutorError::Cancelled);
        }
        status = child.wait() => status?,
    };

    let captured = stdout_task
        .await
        .map_err(|e| ExecutorError::Io(std::io::Error::other(e)))?;
    let _ = stderr_task.await;

    if !status.success() {
        return Err(ExecutorError::CommandFailed {
            code: status.code(),
        });
    }

    Ok(captured)
}

/// Read a stream to EOF, mirroring it to the log
///
/// Returns the captured bytes when `keep` is set, an empty buffer otherwise.
async fn drain<R: AsyncRead + Unpin>(mut reader: R, mut sink: LineSink, keep: bool) -> Vec<u8> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if keep {
                    captured.extend_from_slice(&buf[..n]);
                }
                sink.feed(&buf[..n]);
            }
        }
    }
    sink.flush();
    captured
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn captures_stdout_byte_exact() {
        let cancel = CancellationToken::new();
        let output = capture(&cancel, "sh", &["-c", "printf 'a\\nb\\nc'"])
            .await
            .unwrap();
        assert_eq!(output, b"a\nb\nc");
    }

    #[tokio::test]
    async fn stderr_is_not_captured() {
        let cancel = CancellationToken::new();
        let output = capture(&cancel, "sh", &["-c", "echo visible; echo hidden 1>&2"])
            .await
            .unwrap();
        assert_eq!(output, b"visible\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let cancel = CancellationToken::new();
        let err = capture(&cancel, "sh", &["-c", "exit 3"]).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::CommandFailed { code: Some(3) }
        ));
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let cancel = CancellationToken::new();
        let err = capture(&cancel, "definitely-not-a-real-binary-0c1d2e", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child_promptly() {
        let cancel = CancellationToken::new();
        let killer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            killer.cancel();
        });

        let start = Instant::now();
        let err = capture(&cancel, "sleep", &["30"]).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn line_sink_buffers_partial_lines() {
        let mut sink = LineSink::new("stdout");
        sink.feed(b"partial");
        assert_eq!(sink.pending, b"partial");
        sink.feed(b" line\nnext");
        assert_eq!(sink.pending, b"next");
        sink.flush();
        assert!(sink.pending.is_empty());
    }
}
