use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::Result;
use crate::config::Config;
use crate::search::{SearchEngine, SearchOptions};

async fn open_engine(data_dir: &Path) -> Result<SearchEngine> {
    let config = Config::load(data_dir)?;
    SearchEngine::open(config).await
}

/// Start the MCP server on stdio
#[inline]
pub async fn serve_mcp(data_dir: &Path) -> Result<()> {
    let engine = Arc::new(open_engine(data_dir).await?);
    crate::mcp::serve(engine).await
}

/// Ingest every `*.json` documentation file in a directory
#[inline]
pub async fn seed_directory(data_dir: &Path, source_dir: &Path) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let mut paths: Vec<_> = std::fs::read_dir(source_dir)
        .with_context(|| format!("Failed to read directory: {}", source_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        println!("No .json files found in {}", source_dir.display());
        return Ok(());
    }

    for path in paths {
        let report = ingest_file(&engine, &path).await?;
        println!(
            "Seeding {}... done ({} sections)",
            path.file_name().unwrap_or_default().to_string_lossy(),
            report.sections_added
        );
    }

    engine.shutdown().await
}

/// Ingest a single documentation JSON file
#[inline]
pub async fn add_document(data_dir: &Path, file: &Path) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let report = ingest_file(&engine, file).await?;
    println!(
        "Indexed '{}' with {} sections",
        report.name, report.sections_added
    );

    engine.shutdown().await
}

async fn ingest_file(engine: &SearchEngine, path: &Path) -> Result<crate::search::IngestReport> {
    info!("Ingesting documentation file: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))?;

    engine.add_document_json(&value).await
}

/// List all indexed documentations
#[inline]
pub async fn list_documentations(data_dir: &Path) -> Result<()> {
    let engine = open_engine(data_dir).await?;
    let docs = engine.list_documents().await?;

    if docs.is_empty() {
        println!("No documentations have been indexed yet.");
        println!("Use 'doc-cascade seed <dir>' or 'doc-cascade add <file>' to index one.");
        return Ok(());
    }

    println!("Documentations ({} total):", docs.len());
    println!();
    for doc in &docs {
        println!(
            "  {} ({}) - {} sections{}",
            doc.name,
            doc.display_name,
            doc.sections,
            doc.version
                .as_deref()
                .map(|v| format!(", version {v}"))
                .unwrap_or_default()
        );
    }

    Ok(())
}

/// Delete a documentation by name
#[inline]
pub async fn delete_documentation(data_dir: &Path, name: &str) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    if engine.delete_document(name).await? {
        println!("Deleted documentation '{name}'");
    } else {
        println!("No documentation named '{name}'");
    }

    engine.shutdown().await
}

/// Run one cascade search and print the results with transparency
#[inline]
pub async fn search(
    data_dir: &Path,
    query: &str,
    doc_name: Option<String>,
    max_results: Option<usize>,
) -> Result<()> {
    let engine = open_engine(data_dir).await?;

    let options = SearchOptions {
        doc_name,
        max_results,
        ..SearchOptions::default()
    };
    let response = engine.search(query, &options).await?;

    println!(
        "method={} latency={:.2}ms path=[{}]",
        response.transparency.method,
        response.transparency.latency_ms,
        response.transparency.search_path.join(", ")
    );

    if !response.found {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in response.results.iter().enumerate() {
        let similarity = hit
            .similarity_score
            .map(|s| format!(" (similarity {s:.3})"))
            .unwrap_or_default();
        println!(
            "{}. [{}] {} - {}{}",
            rank + 1,
            hit.doc_name,
            hit.title,
            hit.path,
            similarity
        );
    }

    Ok(())
}

/// Print the effective configuration
#[inline]
pub fn show_config(data_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir)?;

    println!("data_dir = {}", config.data_dir.display());
    println!("embedder_enabled = {}", config.embedder_enabled);
    println!("cache_capacity = {}", config.cache_capacity);
    println!("fts_candidate_cap = {}", config.fts_candidate_cap);
    println!("hybrid_alpha = {}", config.hybrid_alpha);
    println!("hybrid_threshold = {}", config.hybrid_threshold);
    println!("strict_ingest = {}", config.strict_ingest);

    Ok(())
}
