// Embedder doubles for unit tests

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Embedder;

/// Deterministic bag-of-bytes embedding; identical texts get identical vectors
#[derive(Debug)]
pub(crate) struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for (i, byte) in text.to_lowercase().bytes().enumerate() {
            vector[(usize::from(byte) + i) % self.dimension] += 1.0;
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn model(&self) -> &str {
        "hash-test"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Fails every call
#[derive(Debug, Default)]
pub(crate) struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model(&self) -> &str {
        "hash-test"
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow::anyhow!("embedding service unavailable"))
    }
}
