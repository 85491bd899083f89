//! EntiKV CLI
//!
//! Command-line tools for inspecting and checking the keys an EntiKV
//! application keeps in Redis.
//!
//! # Commands
//!
//! - `inspect` - Display per-model key statistics
//! - `verify` - Cross-check index and unique entries against stored hashes
//! - `run-script` - Run a named script from a script directory
//! - `version` - Show version information

mod commands;
mod error;

use clap::{Parser, Subcommand};
use entikv_core::{Config, Database};
use entikv_store::Endpoint;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EntiKV command-line tools.
#[derive(Parser)]
#[command(name = "entikv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Redis URL
    #[arg(global = true, short, long, default_value = "redis://127.0.0.1:6379/0")]
    url: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-model key statistics
    Inspect {
        /// Model names
        #[arg(required = true)]
        models: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Cross-check index and unique entries of a model
    Verify {
        /// Model name
        model: String,

        /// Indexed attribute; discovered from the keyspace if none given
        #[arg(short, long = "index")]
        indices: Vec<String>,

        /// Unique attribute; discovered from the keyspace if none given
        #[arg(short = 'q', long = "unique")]
        uniques: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a named script
    RunScript {
        /// Script name, read from `<dir>/<name>.lua`
        name: String,

        /// Script directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Key passed in KEYS
        #[arg(short, long = "key")]
        keys: Vec<String>,

        /// Argument passed in ARGV
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::debug!(url = %cli.url, "using store");

    let config = || Config::new().endpoint(Endpoint::redis(cli.url.clone()));

    match &cli.command {
        Commands::Inspect { models, format } => {
            let db = Database::open(config());
            print!("{}", commands::inspect::run(&db, models, format)?);
        }
        Commands::Verify {
            model,
            indices,
            uniques,
            format,
        } => {
            let db = Database::open(config());
            let (output, ok) = commands::verify::run(&db, model, indices, uniques, format)?;
            print!("{output}");
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::RunScript {
            name,
            dir,
            keys,
            args,
        } => {
            let db = Database::open(config().script_dir(dir));
            println!("{}", commands::run_script::run(&db, name, keys, args)?);
        }
        Commands::Version => {
            println!("EntiKV CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntiKV Core v{}", entikv_core::VERSION);
        }
    }

    Ok(())
}
