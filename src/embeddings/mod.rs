// Embeddings module
// Ollama integration and the descriptive text each laptop is embedded from

#[cfg(test)]
pub(crate) mod fakes;
pub mod ollama;
pub mod text;

use anyhow::Result;

pub use ollama::{DEFAULT_EMBEDDING_DIMENSION, OllamaClient};
pub use text::describe_laptop;

/// Turns text into dense vectors.
///
/// Implementations must return exactly one vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Model identifier recorded in the build manifest
    fn model(&self) -> &str;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        if vectors.len() != 1 {
            return Err(anyhow::anyhow!(
                "Embedder returned {} vectors for one input",
                vectors.len()
            ));
        }
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedder returned no vector"))
    }
}
