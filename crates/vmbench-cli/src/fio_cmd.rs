//! The `vmbench fio` subcommand: disk I/O benchmarks.
//!
//! Builds the local and default-VM backends up front, installs fio on
//! each, then runs the whole catalogue on every backend so the same two
//! instances are reused across workloads. All backends are closed on the
//! way out, whatever the outcome; close failures are reported but never
//! mask the primary error.

use crate::report::{format_bytes, format_si, Table};
use anyhow::{anyhow, bail, Context};
use tokio_util::sync::CancellationToken;
use vmbench_bench::fio;
use vmbench_executor::{Executor, LocalExecutor, VmConfig, VmExecutor};

pub async fn run(
    cancel: &CancellationToken,
    image: &str,
    install: &str,
) -> anyhow::Result<()> {
    let mut executors: Vec<Box<dyn Executor>> = Vec::new();
    let result = run_benchmarks(cancel, image, install, &mut executors).await;

    let mut close_failures = Vec::new();
    for executor in &mut executors {
        if let Err(e) = executor.close().await {
            tracing::error!(executor = executor.name(), error = %e, "failed to close executor");
            close_failures.push(format!("{}: {e}", executor.name()));
        }
    }

    match result {
        Err(e) => Err(e),
        Ok(()) if !close_failures.is_empty() => {
            Err(anyhow!("failed to close executors: {}", close_failures.join("; ")))
        }
        Ok(()) => Ok(()),
    }
}

async fn run_benchmarks(
    cancel: &CancellationToken,
    image: &str,
    install: &str,
    executors: &mut Vec<Box<dyn Executor>>,
) -> anyhow::Result<()> {
    tracing::info!("initializing local executor");
    executors.push(Box::new(LocalExecutor::new()));

    tracing::info!(image, "initializing vm executor");
    let vm = VmExecutor::new(cancel, VmConfig::new(image)).await?;
    executors.push(Box::new(vm));

    for executor in executors.iter_mut() {
        tracing::info!(executor = executor.name(), "installing fio");
        executor
            .run(cancel, install)
            .await
            .with_context(|| format!("failed to install fio on {} executor", executor.name()))?;
    }

    let mut table = Table::new(["Name", "Executor", "Bandwidth", "I/O operations"]);

    for benchmark in fio::BENCHMARKS {
        for executor in executors.iter_mut() {
            tracing::info!(
                benchmark = benchmark.name,
                executor = executor.name(),
                "running benchmark"
            );

            let stdout = executor.run(cancel, benchmark.command).await?;
            let report = fio::parse(&stdout).context("failed to parse fio JSON output")?;

            if report.jobs.len() != 1 {
                bail!(
                    "expected exactly 1 job from fio's JSON output, got {}",
                    report.jobs.len()
                );
            }
            let write = &report.jobs[0].write;

            // fio reports bandwidth in KiB/s; the table uses decimal units.
            let bandwidth = format!("{}/s", format_bytes(write.bw as u64 * 1000));
            let iops = format_si(write.iops, 2, "IOPS");

            tracing::info!(bandwidth = %bandwidth, iops = %iops, "write results");
            table.add_row([
                benchmark.name.to_string(),
                executor.name().to_string(),
                bandwidth,
                iops,
            ]);
        }
    }

    println!("{}", table.render());

    Ok(())
}
