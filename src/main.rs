//! # QA Harness CLI (`qa`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qa init` | Create the SQLite database schema |
//! | `qa process <FILE>` | Print a processed document as JSON |
//! | `qa index <PATH>...` | Rebuild the knowledge base from documents |
//! | `qa sources` | List indexed source documents |
//! | `qa clear` | Empty the knowledge base |
//! | `qa generate "<query>"` | Generate test cases as a JSON array |
//! | `qa script --test-cases F --markup F` | Generate a Selenium script |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default `info` level), so
//! stdout carries only command output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qa_harness::{config, generate, ingest, migrate, script_cmd, sources};

/// QA Harness: test cases and Selenium scripts grounded in your documentation.
#[derive(Parser)]
#[command(
    name = "qa",
    about = "QA Harness: test cases and Selenium scripts grounded in your documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qa.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Extract and chunk one document, printing the result as JSON.
    Process {
        /// Document to process (md, txt, json, html, pdf).
        file: PathBuf,
    },

    /// Process documents and rebuild the knowledge base.
    ///
    /// Directories are walked and filtered by the `[documents]` globs.
    /// The previous index is fully replaced.
    Index {
        /// Files or directories to index.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Show per-document chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// List indexed source documents.
    Sources,

    /// Remove every indexed chunk.
    Clear,

    /// Generate test cases for a testing request.
    Generate {
        /// Natural-language request, e.g. "discount code validation".
        query: String,

        /// Write the JSON array to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Generate a Selenium script for one test case.
    Script {
        /// JSON file of test cases (as written by `qa generate`).
        #[arg(long)]
        test_cases: PathBuf,

        /// Test case to render. Defaults to the first one in the file.
        #[arg(long)]
        test_id: Option<String>,

        /// HTML of the page under test.
        #[arg(long)]
        markup: PathBuf,

        /// Write the script to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Process { file } => {
            ingest::run_process(&cfg, &file)?;
        }
        Commands::Index { paths, dry_run } => {
            ingest::run_index(&cfg, &paths, dry_run).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg).await?;
        }
        Commands::Clear => {
            sources::clear(&cfg).await?;
        }
        Commands::Generate { query, output } => {
            generate::run_generate(&cfg, &query, output.as_deref()).await?;
        }
        Commands::Script {
            test_cases,
            test_id,
            markup,
            output,
        } => {
            script_cmd::run_script(
                &cfg,
                &test_cases,
                test_id.as_deref(),
                &markup,
                output.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
