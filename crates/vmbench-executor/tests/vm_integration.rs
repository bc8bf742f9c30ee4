//! End-to-end test against a real VM management tool
//!
//! Needs `tart` on PATH and network access to pull the base image, so it
//! is ignored by default. Run with:
//! `cargo test -p vmbench-executor -- --ignored`

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use vmbench_executor::{Executor, VmConfig, VmExecutor};

const BASE_IMAGE: &str = "ghcr.io/cirruslabs/macos-sonoma-base:latest";

#[tokio::test]
#[ignore = "requires the tart binary and a pulled base image"]
async fn vm_echo_matches_local_behavior() {
    let cancel = CancellationToken::new();
    let config = VmConfig::new(BASE_IMAGE);

    let mut vm = VmExecutor::new(&cancel, config).await.unwrap();

    let output = vm.run(&cancel, "echo \"this is a test\"").await.unwrap();
    assert_eq!(output, b"this is a test\n");

    vm.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires the tart binary and a pulled base image"]
async fn cancelling_a_call_token_returns_that_run_promptly() {
    let root = CancellationToken::new();
    let config = VmConfig::new(BASE_IMAGE);

    let mut vm = VmExecutor::new(&root, config).await.unwrap();

    // Cancel only this call's token; the backend itself stays usable
    // until close.
    let call = root.child_token();
    let stopper = call.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        stopper.cancel();
    });

    let start = Instant::now();
    let err = vm.run(&call, "sleep 300").await.unwrap_err();
    assert!(err.is_cancelled(), "got {err}");
    assert!(start.elapsed() < Duration::from_secs(30));

    vm.close().await.unwrap();
}
