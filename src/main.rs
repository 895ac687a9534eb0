use clap::Parser;
use taskboard::cli::commands::{Cli, LogFormat};
use taskboard::cli::handlers;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Env var holding the log filter, e.g. `taskboard=debug`
const LOG_ENV: &str = "TASKBOARD_LOG";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("taskboard=warn"));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output, logs go to stderr
    match format {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
