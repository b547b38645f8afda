use crate::{Chunk, Document, Result, RunOutput, ScoredChunk};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Document>;
}

/// Similarity-search store built once per run from the fine chunk set.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk insert; a store accepts exactly one build.
    async fn build(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()>;

    /// Top `k` chunks by similarity, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait OutputSink: Send + Sync {
    /// Persist the run and return where it went.
    fn write(&self, output: &RunOutput) -> Result<PathBuf>;
}
