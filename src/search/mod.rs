//! The cascade search engine: cache, metadata, full-text and hybrid
//! layers orchestrated with short-circuit semantics over one store and
//! one vector index.

pub mod cache;
pub mod fts;
pub mod hybrid;
pub mod metadata;

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::database::sqlite::{
    Database, DocumentInput, DocumentQueries, DocumentationSummary, Section, SectionQueries,
};
use crate::database::vector::VectorIndex;
use crate::embeddings::{self, DEFAULT_EMBEDDING_DIMENSION, HashedEmbedder};
use crate::{CascadeError, Result};
use self::cache::{CacheKey, QueryCache};
use self::fts::FtsSearcher;
use self::hybrid::HybridReranker;
use self::metadata::MetadataSearcher;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    Cache,
    Metadata,
    Fts,
    HybridRerank,
    None,
}

impl std::fmt::Display for SearchMethod {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SearchMethod::Cache => write!(f, "cache"),
            SearchMethod::Metadata => write!(f, "metadata"),
            SearchMethod::Fts => write!(f, "fts"),
            SearchMethod::HybridRerank => write!(f, "hybrid_rerank"),
            SearchMethod::None => write!(f, "none"),
        }
    }
}

/// One retrievable section in a search response. `similarity_score` is
/// present only when the hybrid layer produced the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub section_id: i64,
    pub doc_name: String,
    pub title: String,
    pub path: String,
    pub url: String,
    pub content: String,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
}

impl SearchHit {
    fn from_section(section: Section, similarity_score: Option<f32>) -> Self {
        Self {
            section_id: section.id,
            doc_name: section.doc_name,
            title: section.title,
            path: section.path,
            url: section.url,
            content: section.content,
            priority: section.priority,
            similarity_score,
        }
    }
}

/// Which layer served a query and how long the cascade took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transparency {
    pub method: SearchMethod,
    pub latency_ms: f64,
    pub search_path: Vec<String>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_scores: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub found: bool,
    pub results: Vec<SearchHit>,
    pub transparency: Transparency,
}

/// Exactly what a consumer would inject into context for a query, with a
/// rough token estimate (four characters per token).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPreview {
    pub query: String,
    pub doc_name: Option<String>,
    pub preview: String,
    pub preview_tokens: usize,
    pub results: Vec<SearchHit>,
    pub transparency: Transparency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub name: String,
    pub sections_added: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub doc_name: Option<String>,
    pub max_results: Option<usize>,
    /// Per-call override of the configured hybrid similarity threshold.
    pub threshold: Option<f32>,
    pub deadline: Option<Duration>,
}

/// The explicitly constructed engine value handed to the MCP layer and the
/// CLI. Reads run in parallel; ingest and delete serialize behind the
/// vector index write latch, which doubles as the store write latch.
pub struct SearchEngine {
    config: Config,
    db: Database,
    embedder: Option<HashedEmbedder>,
    vectors: RwLock<VectorIndex>,
    cache: Mutex<QueryCache>,
    degraded_logged: AtomicBool,
}

impl SearchEngine {
    /// Open (or create) the persistent state under `config.data_dir` and
    /// bring the vector index in agreement with the store.
    pub async fn open(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CascadeError::Config(e.to_string()))?;

        let db = Database::initialize_from_data_dir(&config.data_dir)
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to open store: {e:#}")))?;

        let embedder = config
            .embedder_enabled
            .then(|| HashedEmbedder::new(DEFAULT_EMBEDDING_DIMENSION));

        let vectors = match &embedder {
            Some(embedder) => Self::load_or_rebuild_vectors(&config, &db, embedder).await?,
            None => VectorIndex::new("disabled", DEFAULT_EMBEDDING_DIMENSION),
        };

        Ok(Self {
            cache: Mutex::new(QueryCache::new(config.cache_capacity)),
            config,
            db,
            embedder,
            vectors: RwLock::new(vectors),
            degraded_logged: AtomicBool::new(false),
        })
    }

    /// Run the cascade for a query. Layer order is strict: cache, then
    /// metadata, then full-text, then hybrid rerank, stopping at the first
    /// layer that produces a hit.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let started = Instant::now();

        let query_norm = crate::text::normalize_query(query);
        if query_norm.is_empty() {
            return Err(CascadeError::InvalidInput(
                "Query must not be empty".to_string(),
            ));
        }

        if let Some(doc_name) = options.doc_name.as_deref() {
            let known = DocumentQueries::get_by_name(self.db.pool(), doc_name)
                .await
                .map_err(|e| CascadeError::Store(format!("Store lookup failed: {e:#}")))?;
            if known.is_none() {
                return Err(CascadeError::InvalidInput(format!(
                    "Unknown documentation: {doc_name}"
                )));
            }
        }

        let max_results = options.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1);
        let threshold = options.threshold.unwrap_or(self.config.hybrid_threshold);
        let doc_name = options.doc_name.as_deref();
        let mut search_path: Vec<String> = Vec::new();

        // Layer 1: exact-query cache.
        let cache_key = CacheKey {
            query: query_norm.clone(),
            doc_name: options.doc_name.clone(),
        };
        if let Some(hits) = self.cached_hits(&cache_key).await? {
            search_path.push("cache_hit".to_string());
            debug!("Cache hit for query: {query_norm}");
            return Ok(self.respond(SearchMethod::Cache, hits, search_path, true, started));
        }
        search_path.push("cache_miss".to_string());

        // Layer 2: structured metadata match.
        self.check_deadline(started, options.deadline, &search_path)?;
        let metadata = MetadataSearcher::search(self.db.pool(), &query_norm, doc_name, max_results)
            .await
            .map_err(|e| CascadeError::Store(format!("Metadata layer failed: {e:#}")))?;
        if metadata.is_hit {
            search_path.push("metadata_hit".to_string());
            let hits: Vec<SearchHit> = metadata
                .results
                .into_iter()
                .map(|m| SearchHit::from_section(m.section, None))
                .collect();
            self.store_in_cache(cache_key, &hits).await;
            return Ok(self.respond(SearchMethod::Metadata, hits, search_path, false, started));
        }
        search_path.push("metadata_miss".to_string());

        // Layer 3: BM25 full-text search.
        self.check_deadline(started, options.deadline, &search_path)?;
        let fts = FtsSearcher::search(
            self.db.pool(),
            &query_norm,
            doc_name,
            self.config.fts_candidate_cap,
        )
        .await
        .map_err(|e| CascadeError::Store(format!("Full-text layer failed: {e:#}")))?;

        if fts.candidates.is_empty() {
            search_path.push("fts_miss".to_string());
            if self.embedder.is_some() {
                search_path.push("hybrid_empty".to_string());
            }
            return Ok(self.respond(SearchMethod::None, Vec::new(), search_path, false, started));
        }

        // Layer 4: hybrid rerank, or BM25-only when the embedder is absent.
        let Some(embedder) = &self.embedder else {
            if self.degraded_logged.swap(true, Ordering::Relaxed) {
                debug!("Semantic rerank unavailable, serving BM25-only results");
            } else {
                warn!("Embedder unavailable, degrading to BM25-only results");
            }

            if !fts.is_hit {
                search_path.push("fts_miss".to_string());
                return Ok(self.respond(
                    SearchMethod::None,
                    Vec::new(),
                    search_path,
                    false,
                    started,
                ));
            }

            search_path.push("fts_hit".to_string());
            search_path.push("embedder_unavailable".to_string());
            let hits: Vec<SearchHit> = fts
                .candidates
                .into_iter()
                .take(max_results)
                .map(|c| SearchHit::from_section(c.section, None))
                .collect();
            self.store_in_cache(cache_key, &hits).await;
            return Ok(self.respond(SearchMethod::Fts, hits, search_path, false, started));
        };

        search_path.push("fts_hit".to_string());
        self.check_deadline(started, options.deadline, &search_path)?;

        let ranked = {
            let vectors = self.vectors.read().await;
            HybridReranker::rerank(
                embedder,
                &vectors,
                &query_norm,
                &fts.candidates,
                self.config.hybrid_alpha,
                threshold,
                max_results,
            )
        };

        if ranked.is_empty() {
            // Every candidate fell below both floors; serve the lexical
            // ranking rather than declaring a miss on non-empty input.
            search_path.push("hybrid_fallback".to_string());
            let hits: Vec<SearchHit> = fts
                .candidates
                .into_iter()
                .take(max_results)
                .map(|c| SearchHit::from_section(c.section, None))
                .collect();
            self.store_in_cache(cache_key, &hits).await;
            return Ok(self.respond(SearchMethod::Fts, hits, search_path, false, started));
        }

        search_path.push("hybrid_rerank".to_string());
        let similarity_scores: Vec<f32> = ranked.iter().map(|r| r.similarity).collect();
        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .map(|r| SearchHit::from_section(r.section, Some(r.similarity)))
            .collect();
        self.store_in_cache(cache_key, &hits).await;

        let mut response = self.respond(
            SearchMethod::HybridRerank,
            hits,
            search_path,
            false,
            started,
        );
        response.transparency.similarity_scores = Some(similarity_scores);
        Ok(response)
    }

    /// Same retrieval as [`search`](Self::search), plus the exact markdown
    /// that would be injected into an agent's context and its token estimate.
    pub async fn show_context(
        &self,
        query: &str,
        doc_name: Option<&str>,
    ) -> Result<ContextPreview> {
        let options = SearchOptions {
            doc_name: doc_name.map(str::to_string),
            ..SearchOptions::default()
        };
        let response = self.search(query, &options).await?;

        let preview = response
            .results
            .iter()
            .map(|hit| format!("## {}\n\n{}", hit.title, hit.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ContextPreview {
            query: query.to_string(),
            doc_name: doc_name.map(str::to_string),
            preview_tokens: preview.len() / 4,
            preview,
            results: response.results,
            transparency: response.transparency,
        })
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentationSummary>> {
        DocumentQueries::list_all(self.db.pool())
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to list documentations: {e:#}")))
    }

    pub async fn section(&self, section_id: i64) -> Result<Section> {
        SectionQueries::get_by_id(self.db.pool(), section_id)
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to load section: {e:#}")))?
            .ok_or_else(|| CascadeError::NotFound(format!("Section {section_id}")))
    }

    /// Parse and ingest a document from its external JSON form.
    pub async fn add_document_json(&self, value: &serde_json::Value) -> Result<IngestReport> {
        let input = DocumentInput::from_json(value, self.config.strict_ingest)?;
        self.add_document(input).await
    }

    /// Ingest or replace a document by name. The store transaction and the
    /// vector index update run under the exclusive write latch; readers see
    /// pre-write or post-write state, never partial.
    pub async fn add_document(&self, input: DocumentInput) -> Result<IngestReport> {
        input.validate()?;

        let mut vectors = self.vectors.write().await;

        let old_ids = SectionQueries::ids_for_doc(self.db.pool(), &input.name)
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to load previous sections: {e:#}")))?;

        let new_ids = DocumentQueries::upsert(self.db.pool(), &input)
            .await
            .map_err(|e| CascadeError::Ingest(format!("Failed to ingest '{}': {e:#}", input.name)))?;

        if let Some(embedder) = &self.embedder {
            vectors.remove_many(&old_ids);

            let sections = SectionQueries::list_for_doc(self.db.pool(), &input.name)
                .await
                .map_err(|e| {
                    CascadeError::Store(format!("Failed to load ingested sections: {e:#}"))
                })?;
            let contents: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
            for (section, embedding) in sections.iter().zip(embedder.embed_batch(&contents)) {
                if embeddings::is_zero(&embedding) {
                    debug!("Section {} has no embeddable content", section.id);
                    continue;
                }
                vectors
                    .add(section.id, &embedding)
                    .map_err(|e| CascadeError::Ingest(format!("Failed to index embedding: {e:#}")))?;
            }

            vectors
                .persist(&self.config.data_dir)
                .map_err(|e| CascadeError::Store(format!("Failed to persist embeddings: {e:#}")))?;
        }

        self.cache.lock().await.purge_sections(&old_ids);

        info!(
            "Ingested documentation '{}' with {} sections",
            input.name,
            new_ids.len()
        );

        Ok(IngestReport {
            name: input.name,
            sections_added: new_ids.len(),
        })
    }

    /// Remove a document, its sections, FTS rows and embeddings.
    pub async fn delete_document(&self, name: &str) -> Result<bool> {
        let mut vectors = self.vectors.write().await;

        let old_ids = SectionQueries::ids_for_doc(self.db.pool(), name)
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to load sections: {e:#}")))?;

        let deleted = DocumentQueries::delete(self.db.pool(), name)
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to delete '{name}': {e:#}")))?;

        if deleted {
            if self.embedder.is_some() {
                vectors.remove_many(&old_ids);
                vectors
                    .persist(&self.config.data_dir)
                    .map_err(|e| CascadeError::Store(format!("Failed to persist embeddings: {e:#}")))?;
            }
            self.cache.lock().await.purge_sections(&old_ids);
            info!("Deleted documentation '{name}'");
        }

        Ok(deleted)
    }

    /// Flush process-local state. Called on teardown; the cache is dropped
    /// and the vector index is persisted one last time.
    pub async fn shutdown(&self) -> Result<()> {
        self.cache.lock().await.clear();

        if self.embedder.is_some() {
            self.vectors
                .write()
                .await
                .persist(&self.config.data_dir)
                .map_err(|e| CascadeError::Store(format!("Failed to persist embeddings: {e:#}")))?;
        }

        Ok(())
    }

    async fn load_or_rebuild_vectors(
        config: &Config,
        db: &Database,
        embedder: &HashedEmbedder,
    ) -> Result<VectorIndex> {
        let loaded =
            VectorIndex::load(&config.data_dir, &embedder.identity(), embedder.dimension())
                .map_err(|e| CascadeError::Store(format!("Failed to load vector index: {e:#}")))?;

        let sections = SectionQueries::list_all(db.pool())
            .await
            .map_err(|e| CascadeError::Store(format!("Failed to list sections: {e:#}")))?;

        let mut expected: Vec<i64> = sections
            .iter()
            .filter(|s| !crate::text::tokenize(&s.content).is_empty())
            .map(|s| s.id)
            .collect();
        expected.sort_unstable();

        if let Some(index) = loaded {
            if index.section_ids() == expected {
                return Ok(index);
            }
            warn!("Vector index disagrees with the store, rebuilding");
        }

        let mut index = VectorIndex::new(&embedder.identity(), embedder.dimension());
        for section in &sections {
            let embedding = embedder.embed(&section.content);
            if embeddings::is_zero(&embedding) {
                continue;
            }
            index
                .add(section.id, &embedding)
                .map_err(|e| CascadeError::Store(format!("Failed to rebuild embeddings: {e:#}")))?;
        }
        index
            .persist(&config.data_dir)
            .map_err(|e| CascadeError::Store(format!("Failed to persist embeddings: {e:#}")))?;

        info!("Rebuilt vector index with {} embeddings", index.len());
        Ok(index)
    }

    /// Cached hits are served only while every referenced section is still
    /// live; stale entries are invalidated and treated as a miss.
    async fn cached_hits(&self, key: &CacheKey) -> Result<Option<Vec<SearchHit>>> {
        let cached = self.cache.lock().await.get(key);
        let Some(hits) = cached else {
            return Ok(None);
        };

        let ids: Vec<i64> = hits.iter().map(|h| h.section_id).collect();
        let live = SectionQueries::all_exist(self.db.pool(), &ids)
            .await
            .map_err(|e| CascadeError::Store(format!("Cache validation failed: {e:#}")))?;

        if !live {
            self.cache.lock().await.invalidate(key);
            return Ok(None);
        }

        Ok(Some(hits))
    }

    async fn store_in_cache(&self, key: CacheKey, hits: &[SearchHit]) {
        self.cache.lock().await.put(key, hits.to_vec());
    }

    fn check_deadline(
        &self,
        started: Instant,
        deadline: Option<Duration>,
        search_path: &[String],
    ) -> Result<()> {
        if let Some(deadline) = deadline
            && started.elapsed() >= deadline
        {
            return Err(CascadeError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
                search_path: search_path.to_vec(),
            });
        }
        Ok(())
    }

    fn respond(
        &self,
        method: SearchMethod,
        results: Vec<SearchHit>,
        search_path: Vec<String>,
        from_cache: bool,
        started: Instant,
    ) -> SearchResponse {
        SearchResponse {
            found: !results.is_empty(),
            results,
            transparency: Transparency {
                method,
                latency_ms: started.elapsed().as_secs_f64() * 1000.0,
                search_path,
                from_cache,
                similarity_scores: None,
            },
        }
    }
}
