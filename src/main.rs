//! quicssh - tunnel SSH (TCP) byte streams over QUIC (UDP).

use clap::Parser;
use quicssh::{install_crypto_provider, run_client, run_server, BuildInfo, Cli, Command};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    // For client mode, default to "error" level so the terminal stays clean
    let log_level = if matches!(cli.command, Command::Client(_)) && cli.log_level == "info" {
        "error".to_string()
    } else {
        cli.log_level.clone()
    };
    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    install_crypto_provider();

    match cli.command {
        Command::Server(args) => {
            tracing::debug!(?args, "Server arguments");

            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let result = runtime.block_on(run_server(&args));
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
                std::process::exit(e.exit_code().into());
            }
        }
        Command::Client(args) => {
            tracing::debug!(?args, "Client arguments");

            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let result = runtime.block_on(run_client(&args));
            // stdin is read on a blocking thread that may never return
            runtime.shutdown_background();
            if let Err(e) = result {
                tracing::error!(error = %e, "client error");
                std::process::exit(e.exit_code().into());
            }
        }
        Command::Version => {
            let info = BuildInfo::get();
            println!("{}", info.format());
        }
    }
}
