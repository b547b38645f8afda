use crate::VectorError;
use async_trait::async_trait;
use std::cmp::Ordering;
use studybuddy_core::{Chunk, Result, ScoredChunk, VectorStore};
use tracing::debug;

/// Name of the backend `create_vector_store` hands out.
#[cfg(feature = "faiss")]
pub const VECTOR_STORE_BACKEND: &str = "faiss";
#[cfg(not(feature = "faiss"))]
pub const VECTOR_STORE_BACKEND: &str = "in-memory";

/// Fresh, empty store for one run: a FAISS flat index when built with the
/// `faiss` feature, otherwise the exact in-process scan.
pub fn create_vector_store() -> Box<dyn VectorStore> {
    #[cfg(feature = "faiss")]
    {
        Box::new(crate::faiss_store::FaissVectorStore::new())
    }
    #[cfg(not(feature = "faiss"))]
    {
        Box::new(InMemoryVectorStore::new())
    }
}

/// Checks shared by every backend; returns the common dimension.
pub(crate) fn validate_build_input(
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> std::result::Result<usize, VectorError> {
    if chunks.len() != vectors.len() {
        return Err(VectorError::BatchSizeMismatch(chunks.len(), vectors.len()));
    }
    let dimension = match vectors.first() {
        Some(v) if !v.is_empty() => v.len(),
        _ => return Err(VectorError::EmptyVector),
    };
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(VectorError::DimensionMismatch(dimension, bad.len()));
    }
    Ok(dimension)
}

/// Best score first, equal scores in chunk order.
pub(crate) fn by_score_then_index(a: (f32, &Chunk), b: (f32, &Chunk)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.index.cmp(&b.1.index))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> std::result::Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch(a.len(), b.len()));
    }

    let mut dot_product = 0.0f32;
    let mut norm_a_squared = 0.0f32;
    let mut norm_b_squared = 0.0f32;

    for (&va, &vb) in a.iter().zip(b.iter()) {
        dot_product += va * vb;
        norm_a_squared += va * va;
        norm_b_squared += vb * vb;
    }

    let norm_product = (norm_a_squared * norm_b_squared).sqrt();
    if norm_product == 0.0 {
        Ok(0.0)
    } else {
        Ok(dot_product / norm_product)
    }
}

/// Exact cosine scan over a fixed set of chunks. Test double for the FAISS
/// store and the fallback when that feature is off.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: Vec<(Chunk, Vec<f32>)>,
    dimension: usize,
    built: bool,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn build(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if self.built {
            return Err(VectorError::AlreadyBuilt.into());
        }
        let dimension = validate_build_input(&chunks, &vectors)?;

        self.entries = chunks.into_iter().zip(vectors).collect();
        self.dimension = dimension;
        self.built = true;
        debug!(
            "Built in-memory index: {} chunks, {} dims",
            self.entries.len(),
            dimension
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if !self.built {
            return Err(VectorError::NotBuilt.into());
        }

        let mut scored = Vec::with_capacity(self.entries.len());
        for (chunk, stored) in &self.entries {
            let score = cosine_similarity(vector, stored)?;
            if score.is_finite() {
                scored.push((score, chunk));
            }
        }

        scored.sort_by(|a, b| by_score_then_index(*a, *b));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use studybuddy_core::Granularity;

    fn chunk(index: usize) -> Chunk {
        let text = format!("chunk {}", index);
        Chunk {
            index,
            granularity: Granularity::Fine,
            end: text.len(),
            text,
            start: 0,
            token_count: 2,
            overlap_with_previous: 0,
        }
    }

    async fn store_with(vectors: Vec<Vec<f32>>) -> InMemoryVectorStore {
        let chunks = (0..vectors.len()).map(chunk).collect();
        let mut store = InMemoryVectorStore::new();
        store.build(chunks, vectors).await.unwrap();
        store
    }

    #[test]
    fn test_cosine_similarity() {
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap(), 1.0);
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert_relative_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[tokio::test]
    async fn test_query_orders_by_score_then_index() {
        let store = store_with(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![2.0, 0.0],
        ])
        .await;

        let results = store.query(&[1.0, 0.0], 3).await.unwrap();
        let indices: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(indices, vec![1, 3, 2]);
        assert_relative_eq!(results[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let store = store_with(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).await;
        assert_eq!(store.query(&[1.0, 1.0], 10).await.unwrap().len(), 2);
        assert!(store.query(&[1.0, 1.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_is_one_shot() {
        let mut store = store_with(vec![vec![1.0]]).await;
        let err = store.build(vec![chunk(0)], vec![vec![1.0]]).await.unwrap_err();
        assert!(err.to_string().contains("already been built"));
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let mut store = InMemoryVectorStore::new();
        assert!(store.query(&[1.0], 1).await.is_err());
        assert!(store
            .build(vec![chunk(0), chunk(1)], vec![vec![1.0]])
            .await
            .is_err());
        assert!(store
            .build(vec![chunk(0), chunk(1)], vec![vec![1.0], vec![1.0, 2.0]])
            .await
            .is_err());

        let built = store_with(vec![vec![1.0, 0.0]]).await;
        let err = built.query(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert_eq!(err.kind(), studybuddy_core::ErrorKind::Retrieval);
    }

    #[tokio::test]
    async fn test_nan_scores_never_rank() {
        let store = store_with(vec![
            vec![f32::NAN, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![f32::NAN, f32::NAN],
        ])
        .await;

        let results = store.query(&[1.0, 0.0], 4).await.unwrap();
        let indices: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(results.iter().all(|r| r.score.is_finite()));
    }

    #[cfg(not(feature = "faiss"))]
    #[tokio::test]
    async fn test_default_backend_without_faiss() {
        assert_eq!(VECTOR_STORE_BACKEND, "in-memory");
        let mut store = create_vector_store();
        store.build(vec![chunk(0)], vec![vec![1.0, 0.0]]).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
