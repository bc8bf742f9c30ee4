//! The vmbench command-line interface. Runs workload benchmarks against
//! local and ephemeral-VM execution backends.

use clap::{Arg, ArgAction, Command};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod fio_cmd;
mod report;
mod xcode_cmd;

const DEFAULT_FIO_IMAGE: &str = "ghcr.io/cirruslabs/macos-sonoma-base:latest";
const DEFAULT_XCODE_IMAGE: &str = "ghcr.io/cirruslabs/macos-sequoia-xcode:latest";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("vmbench")
        .about("Run workload benchmarks against local and ephemeral-VM backends")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("fio")
                .about("run Flexible I/O tester (fio) benchmarks")
                .arg(debug_arg())
                .arg(
                    Arg::new("image")
                        .long("image")
                        .default_value(DEFAULT_FIO_IMAGE)
                        .help("base image for the VM backend"),
                )
                .arg(
                    Arg::new("install")
                        .long("install")
                        .default_value("brew install fio")
                        .help("command used to install fio on each backend"),
                ),
        )
        .subcommand(
            Command::new("xcode")
                .about("run Xcode build-time benchmarks")
                .arg(debug_arg())
                .arg(
                    Arg::new("image")
                        .long("image")
                        .default_value(DEFAULT_XCODE_IMAGE)
                        .help("base image for the VM backends"),
                )
                .arg(
                    Arg::new("prepare")
                        .long("prepare")
                        .help("command to run before each benchmark"),
                ),
        );

    let matches = cli.get_matches();

    let cancel = cancel_on_ctrl_c();

    match matches.subcommand() {
        Some(("fio", sub)) => {
            init_logging(sub.get_flag("debug"));
            let image = sub.get_one::<String>("image").map(String::as_str);
            let install = sub.get_one::<String>("install").map(String::as_str);
            fio_cmd::run(
                &cancel,
                image.unwrap_or(DEFAULT_FIO_IMAGE),
                install.unwrap_or("brew install fio"),
            )
            .await
        }
        Some(("xcode", sub)) => {
            init_logging(sub.get_flag("debug"));
            let image = sub.get_one::<String>("image").map(String::as_str);
            let prepare = sub.get_one::<String>("prepare").map(String::as_str);
            xcode_cmd::run(&cancel, image.unwrap_or(DEFAULT_XCODE_IMAGE), prepare).await
        }
        _ => unreachable!("subcommand is required"),
    }
}

fn debug_arg() -> Arg {
    Arg::new("debug")
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("enable debug logging")
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

/// Root cancellation: the first Ctrl-C cancels everything downstream,
/// unblocking in-flight retries and remote waits and letting backends
/// tear down.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            trigger.cancel();
        }
    });
    cancel
}
