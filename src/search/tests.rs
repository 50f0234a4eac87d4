use super::*;
use crate::database::sqlite::SectionInput;
use tempfile::TempDir;

async fn create_engine(embedder_enabled: bool) -> (TempDir, SearchEngine) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        embedder_enabled,
        ..Config::default()
    };

    let engine = SearchEngine::open(config)
        .await
        .expect("Failed to open engine");

    (temp_dir, engine)
}

fn doc(name: &str, sections: Vec<SectionInput>) -> DocumentInput {
    DocumentInput {
        name: name.to_string(),
        display_name: name.to_string(),
        version: Some("1.0".to_string()),
        base_url: "https://example.com/docs".to_string(),
        sections,
    }
}

fn section(title: &str, path: &str, keywords: &[&str], content: &str) -> SectionInput {
    SectionInput {
        title: title.to_string(),
        path: path.to_string(),
        url: format!("https://example.com/docs/{path}"),
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        priority: Some(5),
        content: content.to_string(),
        ..SectionInput::default()
    }
}

async fn seed_basic(engine: &SearchEngine) {
    engine
        .add_document(doc(
            "openrouter",
            vec![
                section(
                    "Authentication",
                    "auth",
                    &["auth", "api-key"],
                    "Every request carries an API key in the Authorization header.",
                ),
                section(
                    "Streaming",
                    "streaming",
                    &["streaming"],
                    "Enable server-sent events and read the stream until done.",
                ),
                section(
                    "Errors",
                    "errors",
                    &["errors"],
                    "Error responses carry a machine readable code.",
                ),
            ],
        ))
        .await
        .expect("Failed to seed documentation");
}

#[tokio::test]
async fn empty_query_is_invalid_input() {
    let (_temp_dir, engine) = create_engine(true).await;

    let err = engine
        .search("   ", &SearchOptions::default())
        .await
        .expect_err("Empty query should fail");

    assert!(matches!(err, CascadeError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_doc_name_is_invalid_input() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    let options = SearchOptions {
        doc_name: Some("missing".to_string()),
        ..SearchOptions::default()
    };
    let err = engine
        .search("auth", &options)
        .await
        .expect_err("Unknown doc should fail");

    assert!(matches!(err, CascadeError::InvalidInput(_)));
}

#[tokio::test]
async fn zero_deadline_times_out_with_partial_trace() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    let options = SearchOptions {
        deadline: Some(Duration::ZERO),
        ..SearchOptions::default()
    };
    let err = engine
        .search("auth", &options)
        .await
        .expect_err("Zero deadline should time out");

    match err {
        CascadeError::Timeout { search_path, .. } => {
            assert_eq!(search_path, vec!["cache_miss".to_string()]);
        }
        other => panic!("Expected timeout, got: {other}"),
    }
}

#[tokio::test]
async fn miss_trace_with_embedder() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    let response = engine
        .search("quantum teleportation", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(!response.found);
    assert_eq!(response.transparency.method, SearchMethod::None);
    assert_eq!(
        response.transparency.search_path,
        vec!["cache_miss", "metadata_miss", "fts_miss", "hybrid_empty"]
    );
}

#[tokio::test]
async fn miss_trace_without_embedder() {
    let (_temp_dir, engine) = create_engine(false).await;
    seed_basic(&engine).await;

    let response = engine
        .search("quantum teleportation", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(!response.found);
    assert_eq!(
        response.transparency.search_path,
        vec!["cache_miss", "metadata_miss", "fts_miss"]
    );
}

#[tokio::test]
async fn metadata_hit_is_cached_with_identical_results() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    let first = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert!(first.found);
    assert_eq!(first.transparency.method, SearchMethod::Metadata);
    assert!(!first.transparency.from_cache);

    let second = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert_eq!(second.transparency.method, SearchMethod::Cache);
    assert!(second.transparency.from_cache);
    assert_eq!(second.transparency.search_path, vec!["cache_hit"]);
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn cache_keys_normalize_query_text() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");

    let response = engine
        .search("  API-KEY  ", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert_eq!(response.transparency.method, SearchMethod::Cache);
}

#[tokio::test]
async fn deleted_sections_never_reappear() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    // Warm the cache, then drop the whole documentation.
    engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert!(
        engine
            .delete_document("openrouter")
            .await
            .expect("Delete failed")
    );

    let response = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(!response.found);
    assert!(!response.transparency.from_cache);
}

#[tokio::test]
async fn hybrid_fallback_serves_lexical_results() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(doc(
            "billing",
            vec![
                section(
                    "Invoices",
                    "invoices",
                    &[],
                    "Invoices include a billing line for every model call plus aggregate \
                     usage numbers, proration rules, currency handling, tax treatment, \
                     refunds, credit grants, spending caps, alert thresholds, payment \
                     methods, receipts, statements, exports, schedules, retries, \
                     disputes, adjustments, balances and quotas.",
                ),
                section(
                    "Webhooks",
                    "webhooks",
                    &[],
                    "Webhooks deliver events about completed generations.",
                ),
            ],
        ))
        .await
        .expect("Failed to seed documentation");

    let response = engine
        .search("billing", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(response.found);
    assert_eq!(response.transparency.method, SearchMethod::Fts);
    assert!(
        response
            .transparency
            .search_path
            .contains(&"hybrid_fallback".to_string())
    );
    assert!(response.results[0].similarity_score.is_none());
    assert_eq!(response.results[0].path, "invoices");
}

#[tokio::test]
async fn default_max_results_caps_output() {
    let (_temp_dir, engine) = create_engine(true).await;
    let sections = (0..8)
        .map(|i| {
            section(
                &format!("Page {i}"),
                &format!("page-{i}"),
                &["shared"],
                "Shared content.",
            )
        })
        .collect();
    engine
        .add_document(doc("big", sections))
        .await
        .expect("Failed to seed documentation");

    let response = engine
        .search("shared", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert_eq!(response.results.len(), DEFAULT_MAX_RESULTS);
}

#[tokio::test]
async fn section_lookup_not_found() {
    let (_temp_dir, engine) = create_engine(true).await;

    let err = engine.section(9999).await.expect_err("Lookup should fail");
    assert!(matches!(err, CascadeError::NotFound(_)));
}

#[tokio::test]
async fn ingest_clamps_priority() {
    let (_temp_dir, engine) = create_engine(true).await;

    let mut wild = section("Wild", "wild", &["wild"], "Out of range priority.");
    wild.priority = Some(42);
    let ids = {
        engine
            .add_document(doc("clamped", vec![wild]))
            .await
            .expect("Failed to ingest");
        engine
            .list_documents()
            .await
            .expect("Failed to list documents")
    };
    assert_eq!(ids[0].sections, 1);

    let response = engine
        .search("wild", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert_eq!(response.results[0].priority, 10);
}

#[tokio::test]
async fn strict_ingest_rejects_unknown_fields() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        strict_ingest: true,
        ..Config::default()
    };
    let engine = SearchEngine::open(config)
        .await
        .expect("Failed to open engine");

    let mut value = serde_json::to_value(doc("strict", vec![])).expect("Failed to encode");
    value["surprise"] = serde_json::json!(true);

    let err = engine
        .add_document_json(&value)
        .await
        .expect_err("Strict ingest should fail");
    assert!(matches!(err, CascadeError::InvalidInput(_)));
}

#[tokio::test]
async fn scoped_and_unscoped_queries_cache_separately() {
    let (_temp_dir, engine) = create_engine(true).await;
    seed_basic(&engine).await;

    engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");

    let scoped = SearchOptions {
        doc_name: Some("openrouter".to_string()),
        ..SearchOptions::default()
    };
    let response = engine
        .search("api-key", &scoped)
        .await
        .expect("Search failed");

    // Same query text, different scope: must not be served from the cache.
    assert!(!response.transparency.from_cache);
}
