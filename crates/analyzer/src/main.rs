//! oradep-extract CLI
//!
//! Command-line interface for extracting PL/SQL code objects from a source
//! tree into the object store.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use oradep_analyzer::{AnalyzerConfig, ExtractionWorkflow, ObjectStore};
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "oradep-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract PL/SQL procedures and functions into an object store", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a source tree and extract its code objects
    Extract {
        /// Configuration file (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Source root to walk (overrides the config file)
        #[arg(short, long)]
        source_root: Option<PathBuf>,

        /// Object store database path (overrides the config file)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Stored path(s) to reprocess even when unchanged
        #[arg(long = "force-reprocess", value_name = "PATH")]
        force_reprocess: Vec<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Extract {
            config,
            source_root,
            database,
            force_reprocess,
        } => run_extract(config, source_root, database, force_reprocess),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_extract(
    config_path: Option<PathBuf>,
    source_root: Option<PathBuf>,
    database: Option<PathBuf>,
    force_reprocess: Vec<String>,
) {
    let mut config = match config_path {
        Some(path) => match AnalyzerConfig::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {e}");
                process::exit(1);
            }
        },
        None => AnalyzerConfig::default(),
    };
    if let Some(root) = source_root {
        config.source_root = root;
    }
    config.force_reprocess.extend(force_reprocess);

    let db_path = database.unwrap_or_else(|| config.database_path());
    let store = match ObjectStore::open(&db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening object store {}: {e}", db_path.display());
            process::exit(1);
        }
    };

    let mut workflow = ExtractionWorkflow::new(&config, store);
    match workflow.run() {
        Ok(stats) => {
            println!(
                "Processed {} file(s), skipped {} unchanged; extracted {} object(s) \
                 ({} signature failures, {} store failures)",
                stats.files_processed,
                stats.files_skipped_unchanged,
                stats.objects_extracted,
                stats.objects_failed_signature,
                stats.objects_failed_store,
            );
            if stats.objects_failed_store > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Extraction failed: {e}");
            process::exit(1);
        }
    }
}
