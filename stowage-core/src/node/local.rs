use super::StorageNode;
use crate::Result;
use crate::storage::{ChunkPayload, ChunkStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// In-process storage node backed directly by a `ChunkStore`.
pub struct LocalStorageNode {
    node_id: String,
    store: Arc<ChunkStore>,
}

impl LocalStorageNode {
    pub fn new(node_id: impl Into<String>, store: Arc<ChunkStore>) -> Self {
        Self {
            node_id: node_id.into(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }
}

#[async_trait]
impl StorageNode for LocalStorageNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn write_chunk(&self, storage_id: &str, data: Bytes, checksum: &str) -> Result<()> {
        self.store
            .put_chunk(storage_id, data, Some(checksum))
            .await
            .map(|_| ())
    }

    async fn read_chunk(&self, storage_id: &str) -> Result<ChunkPayload> {
        self.store.get_chunk(storage_id).await
    }
}
