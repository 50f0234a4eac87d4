use super::*;

#[test]
fn embeddings_have_configured_dimension() {
    let embedder = HashedEmbedder::new(DEFAULT_EMBEDDING_DIMENSION);
    let vector = embedder.embed("authentication with api keys");

    assert_eq!(vector.len(), DEFAULT_EMBEDDING_DIMENSION);
    assert_eq!(embedder.dimension(), DEFAULT_EMBEDDING_DIMENSION);
}

#[test]
fn embeddings_are_unit_norm() {
    let embedder = HashedEmbedder::new(128);
    let vector = embedder.embed("stream chat completions over server-sent events");

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn embedding_is_deterministic() {
    let embedder = HashedEmbedder::new(128);

    let a = embedder.embed("OAuth PKCE flow");
    let b = embedder.embed("OAuth PKCE flow");

    assert_eq!(a, b);
}

#[test]
fn self_similarity_is_one() {
    let embedder = HashedEmbedder::new(256);
    let vector = embedder.embed("rate limits and retries");

    assert!((dot(&vector, &vector) - 1.0).abs() < 1e-5);
}

#[test]
fn related_texts_score_higher_than_unrelated() {
    let embedder = HashedEmbedder::new(DEFAULT_EMBEDDING_DIMENSION);

    let query = embedder.embed("oauth openrouter");
    let related = embedder.embed("OAuth PKCE authorization flow for OpenRouter applications");
    let unrelated = embedder.embed("quantum teleportation of entangled photons");

    assert!(dot(&query, &related) > dot(&query, &unrelated));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let embedder = HashedEmbedder::new(64);
    let vector = embedder.embed("   ");

    assert!(is_zero(&vector));
}

#[test]
fn batch_matches_single_embeds() {
    let embedder = HashedEmbedder::new(64);
    let texts = vec![
        "authentication".to_string(),
        "streaming responses".to_string(),
    ];

    let batch = embedder.embed_batch(&texts);

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], embedder.embed(&texts[0]));
    assert_eq!(batch[1], embedder.embed(&texts[1]));
}

#[test]
fn identity_includes_dimension() {
    let embedder = HashedEmbedder::new(384);
    assert_eq!(embedder.identity(), "hashed-ngram-v1/384");
}
