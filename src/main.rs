// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use media_selector::Capability;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "media-selector")]
#[command(about = "Capture, review and select a photo or video")]
#[command(version = media_selector::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a capture flow driven by commands on stdin
    Run {
        /// Capability the user denies (asked again on `request`)
        #[arg(long, value_name = "CAP")]
        deny: Vec<Capability>,

        /// Capability the platform will not ask for again
        #[arg(long, value_name = "CAP")]
        block: Vec<Capability>,

        /// Directory for captured media (default: ~/Pictures/media-selector)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (default: ~/.config/media-selector/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Config file (default: ~/.config/media-selector/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=media_selector=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            deny,
            block,
            output,
            config,
        } => cli::run_flow(cli::RunOptions {
            deny,
            block,
            output,
            config,
        }),
        Commands::Config { config } => cli::show_config(config),
    }
}
