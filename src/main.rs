//! pagcache CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "pagcache")]
#[command(about = "Memoized DAG to PAG conversion with identity-stable results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Cache configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the PAG of a DAG file
    Pag {
        /// Graph file (text format, or JSON with a .json extension)
        file: PathBuf,

        /// Print the PAG as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the structural fingerprint of a graph file
    Fingerprint {
        file: PathBuf,
    },
    /// Hammer one cache entry from parallel workers and print the counters
    Stress {
        file: PathBuf,

        /// Worker threads
        #[arg(short, long, default_value = "8")]
        workers: usize,

        /// Lookups per worker
        #[arg(short, long, default_value = "100")]
        rounds: usize,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "pagcache={log_level},pagcache_store={log_level},pagcache_transform={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Pag { file, json } => commands::pag(&file, config, json),
        Commands::Fingerprint { file } => commands::fingerprint(&file),
        Commands::Stress {
            file,
            workers,
            rounds,
        } => commands::stress(&file, config, workers, rounds),
        Commands::Version => {
            println!("pagcache v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
