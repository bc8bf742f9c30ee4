//! Execution backends for the vmbench harness
//!
//! A benchmark run needs to execute workload commands "somewhere" and get
//! their output back, whether that somewhere is the local machine or an
//! ephemeral virtual machine that has to be provisioned, booted, reached
//! over the network and destroyed afterwards. This crate provides:
//! - The three-operation [`Executor`] contract (name / run / close)
//! - A local-shell backend
//! - A VM backend with background boot, retrying SSH connection
//!   establishment, a cancellation bridge for remote sessions and
//!   guaranteed teardown
//! - A factory enumerating the backend configurations to benchmark
//!
//! # Example
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use vmbench_executor::{Executor, LocalExecutor};
//!
//! # async fn example() -> Result<(), vmbench_executor::ExecutorError> {
//! let cancel = CancellationToken::new();
//! let mut local = LocalExecutor::new();
//!
//! let output = local.run(&cancel, "uname -a").await?;
//! println!("{}", String::from_utf8_lossy(&output));
//!
//! local.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod factory;
pub mod host;
pub mod local;
pub mod process;
pub mod retry;
pub mod vm;

pub use error::ExecutorError;
pub use executor::Executor;
pub use factory::{default_backends, BackendSpec};
pub use local::LocalExecutor;
pub use retry::RetryPolicy;
pub use vm::{VmConfig, VmExecutor};
