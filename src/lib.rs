use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, DealError>;

#[derive(Error, Debug)]
pub enum DealError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Index error: {0}")]
    Index(String),
}

pub mod catalog;
pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod embeddings;
pub mod history;
pub mod indexer;
pub mod llm;
pub mod recommend;
mod retry;
pub mod search;
