//! Structured metadata matching, the second cascade layer.
//!
//! Scores sections by token overlap between the query and the keyword,
//! use-case and tag facets. Keyword overlap weighs most because keywords
//! are curated for retrieval; tags weigh least so a lone tag overlap
//! cannot short-circuit the higher-recall layers below.


use crate::database::sqlite::{Section, SectionQueries};
use crate::text;
use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;

const KEYWORD_WEIGHT: f64 = 3.0;
const USE_CASE_WEIGHT: f64 = 2.0;
const TAG_WEIGHT: f64 = 1.0;
const PRIORITY_WEIGHT: f64 = 0.1;

/// Minimum facet score for the layer to declare a hit when no keyword matched.
const HIT_FACET_FLOOR: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct MetadataMatch {
    pub section: Section,
    pub score: f64,
    pub facet_score: f64,
    pub keyword_hits: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataOutcome {
    pub results: Vec<MetadataMatch>,
    pub is_hit: bool,
}

pub struct MetadataSearcher;

impl MetadataSearcher {
    pub async fn search(
        pool: &SqlitePool,
        query_norm: &str,
        doc_name: Option<&str>,
        max_results: usize,
    ) -> Result<MetadataOutcome> {
        let query_tokens: HashSet<String> = text::tokenize(query_norm).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(MetadataOutcome::default());
        }

        let sections = match doc_name {
            Some(doc_name) => SectionQueries::list_for_doc(pool, doc_name).await?,
            None => SectionQueries::list_all(pool).await?,
        };

        let mut results: Vec<MetadataMatch> = sections
            .into_iter()
            .filter_map(|section| score_section(section, &query_tokens))
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.section.priority.cmp(&a.section.priority))
                .then(a.section.id.cmp(&b.section.id))
        });

        let is_hit = results
            .iter()
            .any(|m| m.facet_score >= HIT_FACET_FLOOR || m.keyword_hits > 0);

        results.truncate(max_results);

        Ok(MetadataOutcome { results, is_hit })
    }
}

/// A section is a candidate only when at least one facet overlaps the query.
fn score_section(section: Section, query_tokens: &HashSet<String>) -> Option<MetadataMatch> {
    let keyword_hits = section
        .keywords
        .iter()
        .filter(|k| query_tokens.contains(*k))
        .count();

    let use_case_tokens: HashSet<String> = section
        .use_cases
        .iter()
        .flat_map(|phrase| text::tokenize(phrase))
        .collect();
    let use_case_hits = use_case_tokens
        .iter()
        .filter(|t| query_tokens.contains(*t))
        .count();

    let tag_hits = section
        .tags
        .iter()
        .filter(|t| query_tokens.contains(*t))
        .count();

    let facet_score = KEYWORD_WEIGHT * keyword_hits as f64
        + USE_CASE_WEIGHT * use_case_hits as f64
        + TAG_WEIGHT * tag_hits as f64;

    if facet_score < 1.0 {
        return None;
    }

    let score = facet_score + PRIORITY_WEIGHT * section.priority as f64;

    Some(MetadataMatch {
        section,
        score,
        facet_score,
        keyword_hits,
    })
}
