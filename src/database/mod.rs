// Database module
// SQLite holds the catalog and history, LanceDB holds the laptop vectors

pub mod lancedb;
pub mod sqlite;

pub use lancedb::VectorRecord;
pub use lancedb::vector_store::{Neighbor, VectorStore};
pub use sqlite::*;
