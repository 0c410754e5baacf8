//! oradep-graph CLI
//!
//! Builds the dependency graph from a populated object store, saves and
//! inspects it, and runs the built-in analyses.

use clap::{CommandFactory, Parser as ClapParser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use oradep_analyzer::ObjectStore;
use oradep_graph::{GraphFormat, analysis, build_graph, load_graph, save_graph};
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "oradep-graph")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and analyze PL/SQL dependency graphs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency graph from an object store
    Build {
        /// Object store database produced by oradep-extract
        #[arg(short, long)]
        database: PathBuf,

        /// Output graph file (.json, .graphml, .gexf, .bin)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (overrides the file extension)
        #[arg(short, long)]
        format: Option<GraphFormatArg>,

        /// Drop full object payloads, keeping only id/name/package/kind
        #[arg(long)]
        structure_only: bool,
    },

    /// Run an analysis over a previously saved graph
    Analyze {
        /// Graph file saved by `build` (.json or .bin)
        graph: PathBuf,

        /// What to report
        #[arg(value_enum)]
        what: Analysis,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GraphFormatArg {
    Json,
    Graphml,
    Gexf,
    Bin,
}

impl From<GraphFormatArg> for GraphFormat {
    fn from(arg: GraphFormatArg) -> Self {
        match arg {
            GraphFormatArg::Json => GraphFormat::Json,
            GraphFormatArg::Graphml => GraphFormat::Graphml,
            GraphFormatArg::Gexf => GraphFormat::Gexf,
            GraphFormatArg::Bin => GraphFormat::Binary,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Analysis {
    /// Recursion cycles (strongly connected components)
    Cycles,
    /// Nodes nothing calls
    EntryPoints,
    /// Nodes that call nothing
    Terminals,
    /// Per-node in/out degrees
    Degrees,
    /// Structural roles per node
    Roles,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            database,
            output,
            format,
            structure_only,
        } => run_build(&database, &output, format.map(Into::into), structure_only),
        Commands::Analyze { graph, what } => run_analyze(&graph, what),
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

fn run_build(
    database: &PathBuf,
    output: &PathBuf,
    format: Option<GraphFormat>,
    structure_only: bool,
) {
    let store = match ObjectStore::open(database) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening object store {}: {e}", database.display());
            process::exit(1);
        }
    };
    let objects = match store.all_objects() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error loading objects: {e}");
            process::exit(1);
        }
    };
    if objects.is_empty() {
        eprintln!("Object store is empty; run oradep-extract first");
        process::exit(1);
    }

    let (graph, out_of_scope) = build_graph(objects);
    println!(
        "Graph: {} node(s), {} edge(s); {} out-of-scope call name(s)",
        graph.node_count(),
        graph.edge_count(),
        out_of_scope.len()
    );
    for name in out_of_scope.iter().take(20) {
        println!("  out of scope: {name}");
    }
    if out_of_scope.len() > 20 {
        println!("  ... and {} more", out_of_scope.len() - 20);
    }

    if let Err(e) = save_graph(&graph, output, format, structure_only) {
        eprintln!("Error saving graph to {}: {e}", output.display());
        process::exit(1);
    }
    println!("Graph written to {}", output.display());
}

fn run_analyze(path: &PathBuf, what: Analysis) {
    let graph = match load_graph(path, None) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error loading graph {}: {e}", path.display());
            process::exit(1);
        }
    };

    match what {
        Analysis::Cycles => {
            let cycles = analysis::find_cycles(&graph);
            if cycles.is_empty() {
                println!("No cycles found");
                return;
            }
            for (i, cycle) in cycles.iter().enumerate() {
                println!("Cycle {}: {}", i + 1, cycle.join(" -> "));
            }
        }
        Analysis::EntryPoints => {
            for id in analysis::entry_points(&graph) {
                println!("{id}");
            }
        }
        Analysis::Terminals => {
            for id in analysis::terminal_nodes(&graph) {
                println!("{id}");
            }
        }
        Analysis::Degrees => {
            for (id, (inc, out)) in analysis::node_degrees(&graph) {
                println!("{id}\tin={inc}\tout={out}");
            }
        }
        Analysis::Roles => {
            for (id, roles) in analysis::classify_nodes(&graph, 6) {
                let names: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
                println!("{id}\t{}", names.join(", "));
            }
        }
    }
}
