use crate::store::{by_score_then_index, validate_build_input};
use crate::VectorError;
use async_trait::async_trait;
use faiss::{index::IndexImpl, Index, MetricType};
use parking_lot::Mutex;
use studybuddy_core::{Chunk, Result, ScoredChunk, VectorStore};
use tracing::debug;

/// FAISS flat inner-product index over L2-normalised vectors, so scores are
/// cosine similarities. Label `i` is the position of chunk `i` in `chunks`.
pub struct FaissVectorStore {
    index: Mutex<Option<IndexImpl>>,
    chunks: Vec<Chunk>,
    dimension: usize,
}

impl FaissVectorStore {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(None),
            chunks: Vec::new(),
            dimension: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for FaissVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalized(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

#[async_trait]
impl VectorStore for FaissVectorStore {
    async fn build(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if self.index.get_mut().is_some() {
            return Err(VectorError::AlreadyBuilt.into());
        }
        let dimension = validate_build_input(&chunks, &vectors)?;

        let flat: Vec<f32> = vectors.iter().flat_map(|v| normalized(v)).collect();
        let mut index = faiss::index_factory(dimension as u32, "Flat", MetricType::InnerProduct)
            .map_err(|e| VectorError::Backend(e.to_string()))?;
        index
            .add(&flat)
            .map_err(|e| VectorError::Backend(e.to_string()))?;

        debug!(
            "Built FAISS index: {} chunks, {} dims",
            index.ntotal(),
            dimension
        );
        *self.index.get_mut() = Some(index);
        self.chunks = chunks;
        self.dimension = dimension;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.chunks.is_empty() {
            return Err(VectorError::NotBuilt.into());
        }
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch(self.dimension, vector.len()).into());
        }
        let k = k.min(self.chunks.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = normalized(vector);
        let result = {
            let mut guard = self.index.lock();
            let index = guard.as_mut().ok_or(VectorError::NotBuilt)?;
            index
                .search(&query, k)
                .map_err(|e| VectorError::Backend(e.to_string()))?
        };

        let mut hits: Vec<(f32, &Chunk)> = result
            .labels
            .iter()
            .zip(result.distances.iter())
            .filter_map(|(label, &score)| {
                let chunk = self.chunks.get(label.get()? as usize)?;
                score.is_finite().then_some((score, chunk))
            })
            .collect();
        hits.sort_by(|a, b| by_score_then_index(*a, *b));

        Ok(hits
            .into_iter()
            .map(|(score, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }
}
