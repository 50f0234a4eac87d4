use clap::{Parser, Subcommand};
use doc_cascade::Result;
use doc_cascade::commands::{
    add_document, delete_documentation, list_documentations, search, seed_directory, serve_mcp,
    show_config,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doc-cascade")]
#[command(about = "Local-first documentation retrieval with cascade search and an MCP server")]
#[command(version)]
struct Cli {
    /// Directory holding the database, embeddings and configuration
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server on stdio
    Serve,
    /// Index every documentation JSON file in a directory
    Seed {
        /// Directory containing *.json documentation files
        dir: PathBuf,
    },
    /// Index a single documentation JSON file
    Add {
        /// Path to the documentation JSON file
        file: PathBuf,
    },
    /// List all indexed documentations
    List,
    /// Delete a documentation by name
    Delete {
        /// Documentation name to delete
        name: String,
    },
    /// Run a cascade search from the command line
    Search {
        /// Keywords or a natural-language question
        query: String,
        /// Restrict to one documentation by name
        #[arg(long)]
        doc: Option<String>,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the MCP protocol in serve mode.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            serve_mcp(&cli.data_dir).await?;
        }
        Commands::Seed { dir } => {
            seed_directory(&cli.data_dir, &dir).await?;
        }
        Commands::Add { file } => {
            add_document(&cli.data_dir, &file).await?;
        }
        Commands::List => {
            list_documentations(&cli.data_dir).await?;
        }
        Commands::Delete { name } => {
            delete_documentation(&cli.data_dir, &name).await?;
        }
        Commands::Search { query, doc, limit } => {
            search(&cli.data_dir, &query, doc, limit).await?;
        }
        Commands::Config => {
            show_config(&cli.data_dir)?;
        }
    }

    Ok(())
}
