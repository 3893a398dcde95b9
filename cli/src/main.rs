//! `resubir-repro` entry point.
//!
//! Exit status: 0 on success, 1 on any failure (the error is printed to
//! stderr and recorded in the capture record), 130 when interrupted.

use std::process::ExitCode;

use clap::Parser;
use repro_cli::{ReproCli, is_cancelled};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so `--print-config` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = ReproCli::parse();

    // Ctrl+C cancels the interaction; the session still records and closes.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Signal received, finishing the run");
            on_signal.cancel();
        }
    });

    match cli.run(cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_cancelled(&err) {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
