mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Ingest(args) => cmd::ingest::run(&cli.global, args).await,
        Commands::Retrieve(args) => cmd::retrieve::run(&cli.global, args).await,
        Commands::Status => cmd::status::run(&cli.global).await,
        Commands::Simulate(args) => cmd::simulate::run(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
