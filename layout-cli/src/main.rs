use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use layout_service::config::DEFAULT_CONFIG_PATH;

/// app-layout - service template with health aggregation
#[derive(Parser)]
#[command(name = "app-layout")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP (and gRPC) servers
    Server {
        /// Config file path
        #[arg(short, long = "conf", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
        conf: PathBuf,
    },
    /// Print build information
    Version,
    /// Query the health endpoints of a running instance
    Check {
        /// Base URL of the instance
        #[arg(long, default_value = "http://127.0.0.1:8000", env = "APP_LAYOUT_URL")]
        url: String,

        /// Show response details and every check
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Server { conf } => commands::server::execute(conf).await,
        Commands::Version => commands::version::execute(),
        Commands::Check { url, verbose } => commands::check::execute(url, verbose).await,
    };

    // Handle result
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            // Show context if available
            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}
