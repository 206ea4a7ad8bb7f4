use anyhow::Result;
use clap::{Parser, Subcommand};
use ltp_proxy::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Create default configuration
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => ltp_proxy::serve(cli.config_path.as_deref()).await,
        Commands::Setup => match cli.config_path.as_deref() {
            Some(path) => ltp_proxy::cli::setup::setup_at_path(path),
            None => ltp_proxy::cli::setup::setup(),
        },
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
