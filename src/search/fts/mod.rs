//! BM25 full-text retrieval, the third cascade layer.


use crate::database::sqlite::{Section, SectionQueries};
use anyhow::Result;
use sqlx::SqlitePool;

/// Normalized-score floor separating real BM25 matches from near-zero
/// incidental hits.
pub const HIT_SCORE_FLOOR: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct FtsCandidate {
    pub section: Section,
    /// BM25 relevance mapped monotonically into [0, 1) for blending.
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FtsOutcome {
    pub candidates: Vec<FtsCandidate>,
    pub is_hit: bool,
}

pub struct FtsSearcher;

impl FtsSearcher {
    pub async fn search(
        pool: &SqlitePool,
        query_norm: &str,
        doc_name: Option<&str>,
        candidate_cap: usize,
    ) -> Result<FtsOutcome> {
        let match_expr = escape_match_query(query_norm);
        if match_expr.is_empty() {
            return Ok(FtsOutcome::default());
        }

        let ranked =
            SectionQueries::fts_search(pool, &match_expr, doc_name, candidate_cap).await?;

        let mut candidates: Vec<FtsCandidate> = ranked
            .into_iter()
            .map(|(section, rank)| FtsCandidate {
                section,
                score: normalize_rank(rank),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.section.priority.cmp(&a.section.priority))
                .then(a.section.id.cmp(&b.section.id))
        });

        let is_hit = candidates.iter().any(|c| c.score >= HIT_SCORE_FLOOR);

        Ok(FtsOutcome { candidates, is_hit })
    }
}

/// SQLite's `bm25()` reports relevance negated (more negative is better).
/// Map it into [0, 1): zero relevance stays 0, growing relevance approaches 1.
fn normalize_rank(rank: f64) -> f64 {
    let relevance = (-rank).max(0.0);
    relevance / (1.0 + relevance)
}

/// Quote each query word for FTS5 MATCH so special syntax characters
/// (`?`, `*`, `"`, `-`) cannot break the expression. Words combine with
/// OR so natural-language queries still reach sections matching only
/// their salient terms; BM25 ranks fuller matches higher anyway.
fn escape_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}
