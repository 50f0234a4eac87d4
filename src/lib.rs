use thiserror::Error;

pub type Result<T> = std::result::Result<T, CascadeError>;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Search deadline exceeded after {elapsed_ms}ms")]
    Timeout {
        elapsed_ms: u64,
        search_path: Vec<String>,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod mcp;
pub mod search;
pub mod text;
