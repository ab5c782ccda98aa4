//! The `Embedder` capability: turns text into vectors
//! and optionally reranks a candidate set. `veclite-embed` provides a
//! `fastembed`-backed implementation; this crate also ships a
//! deterministic test double for use in doctests and integration tests
//! that don't want a model download.

use crate::error::Result;

/// Capability a `Client` is configured with per vector-bearing column.
/// Every error is mapped to `Error::EmbedderError`, which is always
/// always retryable.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Rerank `candidates` against `query`, returning their indices
    /// sorted best-first. The default implementation is an identity
    /// pass-through (no capability beyond embedding) since reranking is
    /// optional.
    fn rerank(&self, _query: &str, candidates: &[&str], _k: usize) -> Result<Vec<usize>> {
        Ok((0..candidates.len()).collect())
    }
}

/// Deterministic test double: hashes each word into a fixed-size
/// vector so cosine similarity ranks lexically-similar strings highest
/// without pulling in a real model.
pub struct IdentityEmbedder {
    dimension: usize,
}

impl IdentityEmbedder {
    pub fn new(dimension: usize) -> Self {
        IdentityEmbedder { dimension }
    }
}

impl Embedder for IdentityEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
    }
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimension];
    for word in text.split_whitespace() {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        use std::hash::{Hash, Hasher};
        word.to_lowercase().hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % dimension;
        v[bucket] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}
