//! Hybrid semantic reranking, the fourth cascade layer.
//!
//! Blends the BM25-normalized score of each FTS candidate with the cosine
//! similarity between the query embedding and the candidate's stored
//! embedding. Pure in-memory math; the caller supplies the candidates and
//! a read view of the vector index.


use crate::database::sqlite::Section;
use crate::database::vector::VectorIndex;
use crate::embeddings::{self, HashedEmbedder};
use crate::search::fts::FtsCandidate;

/// A candidate with weak semantic similarity still survives when its
/// lexical score alone clears this floor.
pub const FTS_OVERRIDE_FLOOR: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct RankedHit {
    pub section: Section,
    pub blended: f64,
    pub similarity: f32,
    pub fts_score: f64,
}

pub struct HybridReranker;

impl HybridReranker {
    /// Reorder FTS candidates by `alpha * sim + (1 - alpha) * fts_score`,
    /// dropping candidates below the similarity threshold unless their
    /// lexical score is strong on its own. Sections without embeddings get
    /// similarity 0 so they cannot dominate but may still survive.
    pub fn rerank(
        embedder: &HashedEmbedder,
        vectors: &VectorIndex,
        query_norm: &str,
        candidates: &[FtsCandidate],
        alpha: f64,
        threshold: f32,
        max_results: usize,
    ) -> Vec<RankedHit> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let query_embedding = embedder.embed(query_norm);
        let candidate_ids: Vec<i64> = candidates.iter().map(|c| c.section.id).collect();
        let similarities = if embeddings::is_zero(&query_embedding) {
            candidate_ids.iter().map(|id| (*id, 0.0)).collect()
        } else {
            vectors.similarity(&query_embedding, &candidate_ids)
        };

        let mut ranked: Vec<RankedHit> = candidates
            .iter()
            .zip(similarities)
            .filter_map(|(candidate, (_, similarity))| {
                if similarity < threshold && candidate.score < FTS_OVERRIDE_FLOOR {
                    return None;
                }

                let blended = alpha * f64::from(similarity) + (1.0 - alpha) * candidate.score;
                Some(RankedHit {
                    section: candidate.section.clone(),
                    blended,
                    similarity,
                    fts_score: candidate.score,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.blended
                .total_cmp(&a.blended)
                .then(b.section.priority.cmp(&a.section.priority))
                .then(a.section.id.cmp(&b.section.id))
        });

        ranked.truncate(max_results);
        ranked
    }
}
