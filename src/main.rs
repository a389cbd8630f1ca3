mod cli;
mod config;
mod error;
mod extract;
mod model;
mod providers;
mod sync;

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gitlin=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("sync") => match cli::handle_sync(&args[1..]).await {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                error!("{e:#}");
                ExitCode::FAILURE
            }
        },
        Some("help") | Some("-h") | Some("--help") | None => {
            cli::print_help();
            ExitCode::SUCCESS
        }
        Some(other) => {
            eprintln!("Unknown command: {other}\n");
            cli::print_help();
            ExitCode::FAILURE
        }
    }
}
