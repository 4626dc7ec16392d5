//! Collaborator interfaces for the external document store and stroke persistence.
//!
//! Calls are independent: nothing here promises atomicity across two calls.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BlockId, BlockUpdate, NewBlock, PageRef, PersistedBlock, StoredStroke};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block {0} not found")]
    BlockNotFound(BlockId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Blocks on `page` that carry stroke metadata.
    async fn list_blocks(&self, page: &PageRef) -> Result<Vec<PersistedBlock>, StoreError>;

    async fn create_block(&self, page: &PageRef, block: NewBlock) -> Result<BlockId, StoreError>;

    /// Rewrites text and canonical key. Bounds are never touched.
    async fn update_block(&self, id: &BlockId, update: BlockUpdate) -> Result<(), StoreError>;

    async fn delete_block(&self, id: &BlockId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StrokeStore: Send + Sync {
    async fn load_strokes(&self, page: &PageRef) -> Result<Vec<StoredStroke>, StoreError>;

    /// Replaces the persisted snapshot for `page`.
    async fn save_strokes(&self, page: &PageRef, strokes: Vec<StoredStroke>)
        -> Result<(), StoreError>;
}
