// LanceDB vector database module
// Handles vector storage and exact nearest-neighbour search for laptop embeddings

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};

/// One laptop embedding as stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Dense zero-based offset of this vector within the build
    pub position: u32,
    /// Catalog row id the vector was computed from
    pub row_id: i64,
    pub vector: Vec<f32>,
}

impl VectorRecord {
    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
