mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "umlgraph",
    about = "Load extracted UML class diagrams into an idempotent property graph",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .umlgraph/ or .git/)
    #[arg(long, global = true, env = "UMLGRAPH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .umlgraph/ with a default config and an empty graph store
    Init,

    /// Check an extraction file without writing anything
    Validate {
        /// Extraction file (.json, .yaml or .yml)
        file: PathBuf,
    },

    /// Upsert one or more extraction files into the graph store
    Ingest {
        /// Extraction files, processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override the derived spec id
        #[arg(long)]
        spec_id: Option<String>,

        /// Override the derived diagram id
        #[arg(long)]
        diagram_id: Option<String>,

        /// Prune entities, fields and relationships this block no longer declares
        #[arg(long)]
        replace: bool,

        /// Skip validation (structural checks still apply)
        #[arg(long)]
        no_validate: bool,

        /// Report what would change without committing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print idempotent Cypher for an extraction file
    Cypher {
        /// Extraction file (.json, .yaml or .yml)
        file: PathBuf,

        #[arg(long)]
        spec_id: Option<String>,

        #[arg(long)]
        diagram_id: Option<String>,

        /// Omit constraint and index statements
        #[arg(long)]
        no_schema: bool,

        /// Write the script to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Node and edge counts
    Stats,

    /// List entities
    Entities {
        /// Only entities of this spec
        #[arg(long)]
        spec: Option<String>,
    },

    /// Show an entity with its fields and relationships
    Show {
        /// Entity FQN, e.g. tmf620#ProductOffering
        fqn: String,
    },

    /// List schema blocks
    Blocks,

    /// List ingest runs, oldest first
    Runs {
        /// Only the most recent N runs
        #[arg(long)]
        last: Option<usize>,
    },

    /// Inspect and validate .umlgraph/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Ingest { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Validate { file } => cmd::validate::run(&root, &file, cli.json),
        Commands::Ingest {
            files,
            spec_id,
            diagram_id,
            replace,
            no_validate,
            dry_run,
        } => cmd::ingest::run(
            &root,
            &files,
            cmd::ingest::Flags {
                spec_id,
                diagram_id,
                replace,
                no_validate,
                dry_run,
            },
            cli.json,
        ),
        Commands::Cypher {
            file,
            spec_id,
            diagram_id,
            no_schema,
            output,
        } => cmd::cypher::run(
            &root,
            &file,
            spec_id,
            diagram_id,
            no_schema,
            output.as_deref(),
        ),
        Commands::Stats => cmd::stats::run(&root, cli.json),
        Commands::Entities { spec } => cmd::entities::run(&root, spec.as_deref(), cli.json),
        Commands::Show { fqn } => cmd::show::run(&root, &fqn, cli.json),
        Commands::Blocks => cmd::blocks::run(&root, cli.json),
        Commands::Runs { last } => cmd::runs::run(&root, last, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
