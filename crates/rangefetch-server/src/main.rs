use rangefetch_core::logging;

mod cli;
mod server;
mod session;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", e);
    }

    if let Err(err) = Cli::run_from_args().await {
        tracing::error!("fatal: {:#}", err);
        eprintln!("rangefetch error: {:#}", err);
        std::process::exit(1);
    }
}
