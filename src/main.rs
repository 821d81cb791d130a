use clap::Parser;
use studio::cli::commands::Cli;
use studio::cli::handlers;
use tracing_subscriber::EnvFilter;

fn main() {
    // STUDIO_LOG=debug shows store writes; warnings only by default
    let filter = EnvFilter::try_from_env("STUDIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
