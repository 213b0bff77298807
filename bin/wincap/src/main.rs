mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "wincap")]
#[command(about = "Capture console output and network traffic of a browser window", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.wincap/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to a page of a running browser and capture it
    Watch {
        /// Remote debugging port of the browser
        #[arg(short, long, default_value_t = 9222)]
        port: u16,

        /// Page target id (defaults to the first page)
        #[arg(short, long)]
        target: Option<String>,

        /// Window id to file the capture under
        #[arg(short, long, default_value_t = 1)]
        window: u32,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Keep captured files when done
        #[arg(long)]
        keep: bool,
    },

    /// Show a persisted request detail
    Detail {
        #[arg(short, long)]
        window: u32,

        #[arg(short, long)]
        index: u64,
    },

    /// Show resolved configuration and paths
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let (config, paths) = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch {
            port,
            target,
            window,
            duration,
            keep,
        } => {
            let opts = commands::watch::WatchOptions {
                port,
                target,
                window,
                duration,
                keep,
            };
            commands::watch::run(&config, &paths, opts).await?;
        }
        Commands::Detail { window, index } => {
            commands::detail::run(&config, &paths, window, index).await?;
        }
        Commands::Status => {
            commands::status::run(&config, &paths, cli.config.as_deref()).await?;
        }
    }

    Ok(())
}
