// Sessiongate: Application Entry Point
//
// Parses CLI arguments, initializes structured logging (cookie values and the
// stored blob are never logged), and dispatches to the command handler.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sessiongate::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=sessiongate=debug for verbose output. Logs go to stderr so
    // `unlock` can hand the restored header over stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sessiongate=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
