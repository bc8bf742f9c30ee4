//! The `vmbench xcode` subcommand: build-time benchmarks.
//!
//! Iterates the catalogue against the full backend matrix lazily: each
//! backend is constructed, exercised and closed before the next one
//! starts, so at most one VM is alive at a time. A backend is always
//! closed before its run error propagates, keeping the clone/delete
//! pairing intact even on failure.

use crate::report::{format_duration, Table};
use anyhow::{anyhow, Context};
use tokio_util::sync::CancellationToken;
use vmbench_bench::xcode;
use vmbench_executor::{default_backends, process};

pub async fn run(
    cancel: &CancellationToken,
    image: &str,
    prepare: Option<&str>,
) -> anyhow::Result<()> {
    let mut table = Table::new(["Name", "Executor", "Time"]);

    for benchmark in xcode::BENCHMARKS {
        for backend in default_backends() {
            if let Some(prepare) = prepare {
                let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
                tracing::info!(command = prepare, shell = %shell, "running prepare command");
                process::capture(cancel, &shell, &["-c", prepare])
                    .await
                    .with_context(|| format!("failed to run prepare command {prepare:?}"))?;
            }

            tracing::info!(backend = backend.name(), "initializing backend");
            let mut executor = backend.build(cancel, image).await?;

            tracing::info!(
                benchmark = benchmark.name,
                backend = backend.name(),
                "running benchmark"
            );
            let run_result = executor.run(cancel, benchmark.command).await;
            let close_result = executor.close().await;

            let stdout = run_result?;
            close_result
                .map_err(|e| anyhow!("failed to close backend {}: {e}", backend.name()))?;

            let output = xcode::parse_output(&String::from_utf8_lossy(&stdout))?;
            let duration = output
                .duration()
                .to_std()
                .context("build ended before it started")?;

            tracing::info!(duration = %format_duration(duration), "benchmark finished");
            table.add_row([
                benchmark.name.to_string(),
                backend.name().to_string(),
                format_duration(duration),
            ]);
        }
    }

    println!("{}", table.render());

    Ok(())
}
