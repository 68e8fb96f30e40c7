//! Embedding contract (spec §4.9 step 3, non-goals): this crate consumes an
//! embedder, it does not implement one. Callers wire up whatever model
//! backend they use to produce normalized 768-dimensional vectors.

use async_trait::async_trait;

use crate::error::Result;
use crate::stores::VECTOR_DIMENSION;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a document-side piece of text (a chunk or extraction) for
    /// storage.
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a user's search query. Kept separate from `embed_document`
    /// since some embedding models use asymmetric document/query encoders.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic, non-semantic embedder used only in tests: hashes the
/// input into a fixed-size vector so orchestrator/storage tests don't need
/// a real model backend.
#[cfg(any(test, feature = "test-support"))]
pub struct HashEmbedder;

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embed(text))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embed(text))
    }
}

#[cfg(any(test, feature = "test-support"))]
fn hash_embed(text: &str) -> Vec<f32> {
    use sha2::{Digest, Sha256};
    let mut vector = vec![0.0_f32; VECTOR_DIMENSION];
    let mut seed = text.as_bytes().to_vec();
    let mut i = 0;
    while i < VECTOR_DIMENSION {
        let mut hasher = Sha256::new();
        hasher.update(&seed);
        let digest = hasher.finalize();
        for byte in digest.iter() {
            if i >= VECTOR_DIMENSION {
                break;
            }
            vector[i] = (*byte as f32 / 255.0) - 0.5;
            i += 1;
        }
        seed = digest.to_vec();
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedder_produces_correct_dimension() {
        let embedder = HashEmbedder;
        let vector = embedder.embed_document("hello world").await.unwrap();
        assert_eq!(vector.len(), VECTOR_DIMENSION);
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder;
        let a = embedder.embed_document("same text").await.unwrap();
        let b = embedder.embed_document("same text").await.unwrap();
        assert_eq!(a, b);
    }
}
