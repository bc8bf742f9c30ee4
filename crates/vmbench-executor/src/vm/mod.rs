//! Ephemeral virtual-machine backend
//!
//! Provisions a uniquely named clone of a base image, boots it in the
//! background, connects to it over SSH and runs commands inside it. The
//! clone is deleted during close, whichever point construction reached:
//! every code path that issued `clone` eventually issues `delete`.

mod tool;

use crate::error::ExecutorError;
use crate::executor::Executor;
use crate::host;
use crate::process::LineSink;
use crate::retry::{retry_until_cancelled, RetryPolicy};
use russh::client;
use russh::{ChannelMsg, Disconnect};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEFAULT_TOOL: &str = "tart";
const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_ADDRESS_WAIT_SECS: u64 = 60;
const DEFAULT_FALLBACK_MEMORY_MB: u64 = 8192;

/// Configuration for the VM backend
///
/// Every tunable the backend uses lives here; nothing is hardwired in the
/// lifecycle logic.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Base image reference to clone
    pub image: String,
    /// Extra arguments appended to the boot invocation, passed through
    /// opaquely (e.g. disk-caching options)
    pub extra_run_args: Vec<String>,
    /// VM management tool binary
    pub tool: String,
    /// Fraction of host memory given to the clone; 1.0 matches the host
    /// so results stay comparable to the local backend
    pub memory_fraction: f64,
    /// Memory to assume, in MiB, when the host total cannot be read
    pub fallback_memory_mb: u64,
    /// Bound on the address poll, in seconds
    pub address_wait_secs: u64,
    /// SSH port inside the VM
    pub ssh_port: u16,
    /// SSH credentials. The defaults are only appropriate for a
    /// disposable, network-isolated benchmark instance.
    pub ssh_user: String,
    /// SSH password
    pub ssh_password: String,
    /// Connection retry policy
    pub retry: RetryPolicy,
}

impl VmConfig {
    /// Configuration with defaults for the given base image
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            extra_run_args: Vec::new(),
            tool: DEFAULT_TOOL.to_string(),
            memory_fraction: 1.0,
            fallback_memory_mb: DEFAULT_FALLBACK_MEMORY_MB,
            address_wait_secs: DEFAULT_ADDRESS_WAIT_SECS,
            ssh_port: DEFAULT_SSH_PORT,
            ssh_user: "admin".to_string(),
            ssh_password: "admin".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Append extra boot-time arguments
    #[must_use]
    pub fn with_run_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_run_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Use a different management tool binary
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }
}

/// Accepts any server key.
///
/// The target is an ephemeral, locally provisioned instance whose host key
/// cannot be known ahead of time, so server identity is deliberately not
/// verified. This is a trust decision, not an oversight; it would be wrong
/// for anything other than a disposable local VM.
struct AcceptAnyHostKey;

#[async_trait::async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Execution backend running commands inside an ephemeral VM
pub struct VmExecutor {
    instance: String,
    config: VmConfig,
    ssh: Option<client::Handle<AcceptAnyHostKey>>,
    boot_cancel: CancellationToken,
    closed: bool,
}

// Manual impl: the SSH handle is opaque.
impl std::fmt::Debug for VmExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmExecutor")
            .field("instance", &self.instance)
            .field("connected", &self.ssh.is_some())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Collision-resistant instance name for a fresh clone
fn instance_name() -> String {
    format!("vmbench-{}", Uuid::new_v4())
}

impl VmExecutor {
    /// Provision, boot and connect to a fresh clone of `config.image`
    ///
    /// Pulls the image if missing, clones it under a unique name, sizes the
    /// clone to the host, starts the boot process in the background, polls
    /// for the VM address and establishes an SSH connection with retries.
    /// On any failure after the clone step the instance is torn down before
    /// the primary error is returned.
    pub async fn new(
        cancel: &CancellationToken,
        config: VmConfig,
    ) -> Result<Self, ExecutorError> {
        let instance = instance_name();

        tool::call(cancel, &config.tool, &["pull", &config.image])
            .await
            .map_err(|e| ExecutorError::provision("pull", e))?;

        tool::call(cancel, &config.tool, &["clone", &config.image, &instance])
            .await
            .map_err(|e| ExecutorError::provision("clone", e))?;

        // From here on the clone exists, so failures must tear down.
        let mut vm = Self {
            instance,
            config,
            ssh: None,
            boot_cancel: cancel.child_token(),
            closed: false,
        };

        if let Err(e) = vm.boot_and_connect(cancel).await {
            if let Err(close_err) = vm.close().await {
                tracing::warn!(error = %close_err, vm = %vm.instance, "teardown after failed construction");
            }
            return Err(e);
        }

        Ok(vm)
    }

    async fn boot_and_connect(&mut self, cancel: &CancellationToken) -> Result<(), ExecutorError> {
        let cpus = host::logical_cpus().to_string();
        let total_mb = host::total_memory_mb().unwrap_or(self.config.fallback_memory_mb);
        let memory = ((total_mb as f64 * self.config.memory_fraction) as u64).to_string();
        tracing::info!(vm = %self.instance, cpus = %cpus, memory_mb = %memory, "setting resources");

        tool::call(
            cancel,
            &self.config.tool,
            &["set", &self.instance, "--cpu", &cpus, "--memory", &memory],
        )
        .await
        .map_err(|e| ExecutorError::provision("set", e))?;

        // The boot process stays alive until close() cancels its token.
        // Its error is intentionally dropped: a failed boot shows up as a
        // connection failure on the foreground path, which is surfaced.
        let boot_cancel = self.boot_cancel.clone();
        let tool_bin = self.config.tool.clone();
        let mut run_args = vec![
            "run".to_string(),
            "--no-graphics".to_string(),
            self.instance.clone(),
        ];
        run_args.extend(self.config.extra_run_args.iter().cloned());
        tokio::spawn(async move {
            let args: Vec<&str> = run_args.iter().map(String::as_str).collect();
            let _ = tool::call(&boot_cancel, &tool_bin, &args).await;
        });

        let wait = self.config.address_wait_secs.to_string();
        let ip = tool::call_output(
            cancel,
            &self.config.tool,
            &["ip", "--wait", &wait, &self.instance],
        )
        .await
        .map_err(|e| ExecutorError::provision("ip", e))?;

        let addr = format!("{}:{}", ip.trim(), self.config.ssh_port);
        tracing::info!(vm = %self.instance, addr = %addr, "connecting");

        let ssh = self.connect(cancel, &addr).await?;
        self.ssh = Some(ssh);
        Ok(())
    }

    /// Establish the SSH connection, retrying until success or cancellation
    ///
    /// Each attempt is bounded by a timeout covering the dial, the
    /// handshake and authentication, so a server that accepts the dial but
    /// never completes the handshake cannot stall the loop. A failed
    /// attempt abandons its session object and the next attempt starts
    /// from a fresh dial. The retry loop races in-flight attempts against
    /// the caller's token, so cancellation takes effect mid-attempt.
    async fn connect(
        &self,
        cancel: &CancellationToken,
        addr: &str,
    ) -> Result<client::Handle<AcceptAnyHostKey>, ExecutorError> {
        let ssh_config = Arc::new(client::Config::default());
        let policy = self.config.retry.clone();
        let user = self.config.ssh_user.clone();
        let password = self.config.ssh_password.clone();

        retry_until_cancelled(cancel, &policy, || {
            let ssh_config = Arc::clone(&ssh_config);
            let addr = addr.to_string();
            let user = user.clone();
            let password = password.clone();
            let attempt_timeout = policy.attempt_timeout;

            async move {
                let attempt = async {
                    let stream = TcpStream::connect(addr.as_str())
                        .await
                        .map_err(ExecutorError::Io)?;

                    let mut handle =
                        client::connect_stream(ssh_config, stream, AcceptAnyHostKey).await?;

                    let authenticated = handle.authenticate_password(user, password).await?;
                    if !authenticated {
                        return Err(ExecutorError::Connect {
                            addr: addr.clone(),
                            reason: "authentication rejected".to_string(),
                        });
                    }

                    Ok(handle)
                };

                let result = timeout(attempt_timeout, attempt).await;
                match result {
                    Ok(result) => result,
                    Err(_) => Err(ExecutorError::Connect {
                        addr,
                        reason: "attempt timed out".to_string(),
                    }),
                }
            }
        })
        .await
    }
}

#[async_trait::async_trait]
impl Executor for VmExecutor {
    fn name(&self) -> &str {
        "vm"
    }

    async fn run(
        &mut self,
        cancel: &CancellationToken,
        command: &str,
    ) -> Result<Vec<u8>, ExecutorError> {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        let ssh = self.ssh.as_ref().ok_or(ExecutorError::NotConnected)?;

        // The SSH protocol has no notion of the caller's cancellation
        // token, so the whole call races a per-call child token: session
        // setup included, since a stalled connection can wedge any of
        // those steps too. On cancellation the session is force-closed,
        // which unblocks the remote side. The child token goes away with
        // this call, so it cannot fire spuriously after success.
        let call_cancel = cancel.child_token();

        // One session per call; sessions are never reused across calls.
        let mut channel = tokio::select! {
            _ = call_cancel.cancelled() => return Err(ExecutorError::Cancelled),
            channel = ssh.channel_open_session() => channel?,
        };

        let setup = async {
            channel.request_shell(true).await?;
            channel.data(command.as_bytes()).await?;
            channel.eof().await?;
            Ok::<_, ExecutorError>(())
        };
        tokio::select! {
            _ = call_cancel.cancelled() => {
                let _ = channel.close().await;
                return Err(ExecutorError::Cancelled);
            }
            result = setup => result?,
        };

        let mut captured = Vec::new();
        let mut out_sink = LineSink::new("stdout");
        let mut err_sink = LineSink::new("stderr");
        let mut exit_status = None;

        loop {
            tokio::select! {
                _ = call_cancel.cancelled() => {
                    let _ = channel.close().await;
                    return Err(ExecutorError::Cancelled);
                }
                msg = channel.wait() => match msg {
                    None => break,
                    Some(ChannelMsg::Data { ref data }) => {
                        captured.extend_from_slice(data);
                        out_sink.feed(data);
                    }
                    Some(ChannelMsg::ExtendedData { ref data, .. }) => err_sink.feed(data),
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => {
                        exit_status = Some(status);
                    }
                    Some(_) => {}
                },
            }
        }
        out_sink.flush();
        err_sink.flush();

        match exit_status {
            Some(0) => Ok(captured),
            Some(status) => Err(ExecutorError::RemoteExit { status }),
            None => Err(ExecutorError::SessionClosed),
        }
    }

    /// Tear down the backend
    ///
    /// Steps are independently guarded so one failure cannot skip the
    /// rest: disconnect SSH if connected (errors ignored), stop the boot
    /// process, delete the clone. Deletion runs under its own token so it
    /// proceeds even when the caller's token was already cancelled. A
    /// second close is a no-op and never issues a second delete.
    async fn close(&mut self) -> Result<(), ExecutorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(ssh) = self.ssh.take() {
            let _ = ssh.disconnect(Disconnect::ByApplication, "", "en").await;
        }

        self.boot_cancel.cancel();

        let delete_cancel = CancellationToken::new();
        tool::call(
            &delete_cancel,
            &self.config.tool,
            &["delete", &self.instance],
        )
        .await
        .map_err(|e| ExecutorError::Teardown {
            source: Box::new(e),
        })
    }
}
