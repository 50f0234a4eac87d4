//! End-to-end scenarios over a temp-dir backed engine: ingest, the four
//! cascade layers, transparency, degradation and persistence.

use doc_cascade::config::Config;
use doc_cascade::database::sqlite::{DocumentInput, SectionInput};
use doc_cascade::database::vector::VectorIndex;
use doc_cascade::embeddings::{DEFAULT_EMBEDDING_DIMENSION, HashedEmbedder};
use doc_cascade::search::{SearchEngine, SearchMethod, SearchOptions};
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

fn openrouter_doc() -> DocumentInput {
    DocumentInput {
        name: "openrouter".to_string(),
        display_name: "OpenRouter".to_string(),
        version: Some("1.0".to_string()),
        base_url: "https://openrouter.ai/docs".to_string(),
        sections: vec![
            SectionInput {
                title: "Authentication".to_string(),
                path: "auth".to_string(),
                url: "https://openrouter.ai/docs/auth".to_string(),
                keywords: vec!["auth".to_string(), "api-key".to_string()],
                use_cases: vec!["authenticate requests".to_string()],
                tags: vec!["security".to_string()],
                priority: Some(9),
                content: "Every request carries an API key in the Authorization header."
                    .to_string(),
            },
            SectionInput {
                title: "OAuth PKCE".to_string(),
                path: "oauth".to_string(),
                url: "https://openrouter.ai/docs/oauth".to_string(),
                keywords: vec!["pkce".to_string(), "authorization-code".to_string()],
                use_cases: vec!["connect user accounts".to_string()],
                tags: vec!["security".to_string()],
                priority: Some(8),
                content: "OAuth OpenRouter integration. OAuth OpenRouter PKCE lets \
                          applications authenticate. The OAuth flow redirects the user \
                          to OpenRouter for consent and returns an authorization code."
                    .to_string(),
            },
            SectionInput {
                title: "Quickstart".to_string(),
                path: "quickstart".to_string(),
                url: "https://openrouter.ai/docs/quickstart".to_string(),
                keywords: vec!["install".to_string(), "sdk".to_string()],
                use_cases: vec!["send a first request".to_string()],
                tags: vec!["getting-started".to_string()],
                priority: Some(7),
                content: "Install the SDK and send your first request.".to_string(),
            },
            SectionInput {
                title: "Rate Limits".to_string(),
                path: "limits".to_string(),
                url: "https://openrouter.ai/docs/limits".to_string(),
                keywords: vec!["limits".to_string()],
                use_cases: vec!["raise account limits".to_string()],
                tags: vec!["quota".to_string()],
                priority: Some(5),
                content: "Rate limits apply per account and reset every minute.".to_string(),
            },
        ],
    }
}

#[tokio::test]
async fn cache_short_circuit() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");

    let first = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert_eq!(first.transparency.method, SearchMethod::Metadata);
    assert!(!first.transparency.from_cache);
    assert_eq!(first.results[0].path, "auth");

    let second = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert_eq!(second.transparency.method, SearchMethod::Cache);
    assert!(second.transparency.from_cache);
    assert_eq!(second.results[0].section_id, first.results[0].section_id);
}

#[tokio::test]
async fn metadata_beats_fts() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(DocumentInput {
            name: "streaming-docs".to_string(),
            display_name: "Streaming Docs".to_string(),
            version: None,
            base_url: "https://example.com/docs".to_string(),
            sections: vec![
                SectionInput {
                    title: "Streaming API".to_string(),
                    path: "streaming-api".to_string(),
                    keywords: vec!["streaming".to_string()],
                    priority: Some(5),
                    content: "Server-sent events deliver incremental output.".to_string(),
                    ..SectionInput::default()
                },
                SectionInput {
                    title: "Responses".to_string(),
                    path: "responses".to_string(),
                    priority: Some(5),
                    content: "Enable streaming to receive partial data. When streaming \
                              is active, chunks arrive until streaming completes."
                        .to_string(),
                    ..SectionInput::default()
                },
            ],
        })
        .await
        .expect("Failed to ingest");

    let response = engine
        .search("streaming", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert_eq!(response.transparency.method, SearchMethod::Metadata);
    assert_eq!(response.results[0].path, "streaming-api");
}

#[tokio::test]
async fn natural_language_hybrid() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");

    let response = engine
        .search("how to do OAuth on OpenRouter", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(response.found);
    assert_eq!(response.transparency.method, SearchMethod::HybridRerank);
    assert_eq!(response.results[0].path, "oauth");
    let similarity = response.results[0]
        .similarity_score
        .expect("Hybrid results expose similarity");
    assert!(similarity >= 0.5, "similarity was {similarity}");
    assert!(response.transparency.similarity_scores.is_some());
}

#[tokio::test]
async fn graceful_degradation_without_embedder() {
    let (_temp_dir, engine) = create_engine(false).await;
    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");

    let response = engine
        .search("how to do OAuth on OpenRouter", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(response.found);
    assert_eq!(response.transparency.method, SearchMethod::Fts);
    assert_eq!(response.results[0].path, "oauth");
    assert!(response.results[0].similarity_score.is_none());
    assert!(
        response
            .transparency
            .search_path
            .contains(&"embedder_unavailable".to_string())
    );
}

#[tokio::test]
async fn miss_returns_empty_with_full_trace() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");

    let response = engine
        .search("quantum teleportation", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert!(!response.found);
    assert!(response.results.is_empty());
    assert_eq!(
        response.transparency.search_path,
        vec!["cache_miss", "metadata_miss", "fts_miss", "hybrid_empty"]
    );
}

#[tokio::test]
async fn idempotent_reingest() {
    let (temp_dir, engine) = create_engine(true).await;

    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");
    let first_docs = engine.list_documents().await.expect("Failed to list");
    let first_results = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");

    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to re-ingest");
    let second_docs = engine.list_documents().await.expect("Failed to list");
    let second_results = engine
        .search("api-key", &SearchOptions::default())
        .await
        .expect("Search failed");

    assert_eq!(first_docs, second_docs);
    assert_eq!(second_docs[0].sections, 4);
    assert_eq!(
        first_results.results.len(),
        second_results.results.len()
    );
    assert_eq!(first_results.results[0].path, second_results.results[0].path);

    // The dense matrix must not grow across re-ingests.
    let embedder = HashedEmbedder::new(DEFAULT_EMBEDDING_DIMENSION);
    let index = VectorIndex::load(temp_dir.path(), &embedder.identity(), embedder.dimension())
        .expect("Failed to load vector index")
        .expect("Vector index should be persisted");
    assert_eq!(index.len(), 4);
}

#[tokio::test]
async fn deleted_document_never_surfaces() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");
    engine
        .add_document(DocumentInput {
            name: "other".to_string(),
            display_name: "Other".to_string(),
            version: None,
            base_url: "https://example.com/docs".to_string(),
            sections: vec![SectionInput {
                title: "Overview".to_string(),
                path: "overview".to_string(),
                keywords: vec!["overview".to_string()],
                content: "General overview of the service.".to_string(),
                ..SectionInput::default()
            }],
        })
        .await
        .expect("Failed to ingest");

    assert!(
        engine
            .delete_document("openrouter")
            .await
            .expect("Delete failed")
    );

    for query in ["api-key", "oauth", "authentication header"] {
        let response = engine
            .search(query, &SearchOptions::default())
            .await
            .expect("Search failed");
        for hit in &response.results {
            assert_ne!(hit.doc_name, "openrouter");
        }
    }

    let docs = engine.list_documents().await.expect("Failed to list");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].name, "other");
}

#[tokio::test]
async fn titles_retrieve_their_sections() {
    let (_temp_dir, engine) = create_engine(true).await;
    let doc = openrouter_doc();
    engine
        .add_document(doc.clone())
        .await
        .expect("Failed to ingest");

    for section in &doc.sections {
        let options = SearchOptions {
            doc_name: Some(doc.name.clone()),
            ..SearchOptions::default()
        };
        let response = engine
            .search(&section.title, &options)
            .await
            .expect("Search failed");

        let top_paths: Vec<&str> = response
            .results
            .iter()
            .take(3)
            .map(|hit| hit.path.as_str())
            .collect();
        assert!(
            top_paths.contains(&section.path.as_str()),
            "'{}' not in top 3 for its own title: {:?}",
            section.path,
            top_paths
        );
    }
}

#[tokio::test]
async fn section_counts_match_ingest() {
    let (_temp_dir, engine) = create_engine(true).await;
    let doc = openrouter_doc();
    let section_count = doc.sections.len() as i64;
    engine.add_document(doc).await.expect("Failed to ingest");

    let docs = engine.list_documents().await.expect("Failed to list");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].sections, section_count);
}

#[tokio::test]
async fn stored_embeddings_match_fresh_embeddings() {
    let (temp_dir, engine) = create_engine(true).await;
    let doc = openrouter_doc();
    engine
        .add_document(doc.clone())
        .await
        .expect("Failed to ingest");

    let embedder = HashedEmbedder::new(DEFAULT_EMBEDDING_DIMENSION);
    let index = VectorIndex::load(temp_dir.path(), &embedder.identity(), embedder.dimension())
        .expect("Failed to load vector index")
        .expect("Vector index should be persisted");

    for section_id in index.section_ids() {
        let section = engine
            .section(section_id)
            .await
            .expect("Section should exist");
        let fresh = embedder.embed(&section.content);
        let scores = index.similarity(&fresh, &[section_id]);
        assert!(
            scores[0].1 >= 0.99,
            "Embedding drifted for section {section_id}: {}",
            scores[0].1
        );
    }
}

#[tokio::test]
async fn show_context_previews_injected_markdown() {
    let (_temp_dir, engine) = create_engine(true).await;
    engine
        .add_document(openrouter_doc())
        .await
        .expect("Failed to ingest");

    let preview = engine
        .show_context("api-key", None)
        .await
        .expect("Preview failed");

    assert!(preview.preview.starts_with("## Authentication"));
    assert_eq!(preview.preview_tokens, preview.preview.len() / 4);
    assert!(!preview.results.is_empty());
    assert_eq!(preview.transparency.method, SearchMethod::Metadata);
}

#[tokio::test]
async fn engine_reopens_with_persisted_state() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    {
        let engine = SearchEngine::open(config.clone())
            .await
            .expect("Failed to open engine");
        engine
            .add_document(openrouter_doc())
            .await
            .expect("Failed to ingest");
        engine.shutdown().await.expect("Shutdown failed");
    }

    let engine = SearchEngine::open(config)
        .await
        .expect("Failed to reopen engine");

    let response = engine
        .search("how to do OAuth on OpenRouter", &SearchOptions::default())
        .await
        .expect("Search failed");
    assert_eq!(response.transparency.method, SearchMethod::HybridRerank);
    assert_eq!(response.results[0].path, "oauth");
}
