// SPDX-License-Identifier: AGPL-3.0
// Gophie CLI - Command line frontend

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Browse Gopherspace from the terminal
#[derive(Debug, Parser)]
#[command(name = "gophie", version, about)]
pub struct Cli {
    /// Directory downloads are saved to
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,

    /// Address used when a command is given none
    #[arg(long, global = true)]
    pub home: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a page and print it
    Fetch {
        /// Gopher address, e.g. gopher://gopher.floodgap.com/
        address: Option<String>,
        /// Item type code of the resource (1 = directory, 0 = text)
        #[arg(long, short, default_value_t = '1')]
        kind: char,
        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a full-text search (item type 7)
    Search {
        address: String,
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Download a resource into the download directory
    Download {
        address: String,
        /// Save to this path instead
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Print the final download state as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gophie_cli=info".parse().unwrap())
                .add_directive("gophie_core=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting Gophie v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
