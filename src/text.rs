//! Text normalization shared by the metadata matcher and the embedder.

/// Tokens that carry no retrieval signal and are dropped during tokenization.
const STOP_TOKENS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "for", "from", "how", "i",
    "if", "in", "into", "is", "it", "its", "my", "no", "not", "of", "on", "or", "our", "so", "that",
    "the", "their", "then", "there", "these", "this", "to", "up", "use", "using", "was", "we",
    "what", "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Split text into lower-cased tokens on whitespace and punctuation,
/// keeping intra-word hyphens and underscores so identifiers like
/// `api-key` or `use_cases` survive as single tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .filter(|t| !t.is_empty())
        .map(|t| t.trim_matches(|c| c == '-' || c == '_').to_lowercase())
        .filter(|t| !t.is_empty() && !STOP_TOKENS.contains(&t.as_str()))
        .collect()
}

/// Normalize a query for cache keys and layer inputs: trim, lower-case,
/// collapse internal whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
