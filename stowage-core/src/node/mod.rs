//! Storage node contract and the fixed set of nodes a gateway replicates to.

pub mod http;
pub mod local;

pub use http::HttpStorageNode;
pub use local::LocalStorageNode;

use crate::error::{Result, StowError};
use crate::storage::ChunkPayload;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;

/// Header carrying the hex checksum of a chunk body in both directions.
pub const CHECKSUM_HEADER: &str = "x-checksum";

/// An independent byte store keyed by opaque identifier.
///
/// `write_chunk` must reject the body without persisting anything when the
/// supplied checksum does not match, and must fully overwrite any previous
/// chunk under the same identifier otherwise.
#[async_trait]
pub trait StorageNode: Send + Sync {
    fn node_id(&self) -> &str;

    async fn write_chunk(&self, storage_id: &str, data: Bytes, checksum: &str) -> Result<()>;

    async fn read_chunk(&self, storage_id: &str) -> Result<ChunkPayload>;
}

pub type DynStorageNode = Arc<dyn StorageNode>;

/// Fixed, ordered list of storage nodes. Iteration order is the probe order
/// used by reads.
#[derive(Clone)]
pub struct NodeSet {
    nodes: Vec<DynStorageNode>,
}

impl NodeSet {
    pub fn new(nodes: Vec<DynStorageNode>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(StowError::Config(
                "at least one storage node is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.node_id().to_string()) {
                return Err(StowError::Config(format!(
                    "duplicate storage node id: {}",
                    node.node_id()
                )));
            }
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynStorageNode> {
        self.nodes.iter()
    }

    pub fn get(&self, node_id: &str) -> Option<&DynStorageNode> {
        self.nodes.iter().find(|node| node.node_id() == node_id)
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|node| node.node_id().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ChunkStore;

    fn local_node(dir: &tempfile::TempDir, node_id: &str) -> DynStorageNode {
        let store = ChunkStore::new(dir.path().join(node_id)).unwrap();
        Arc::new(LocalStorageNode::new(node_id, Arc::new(store)))
    }

    #[test]
    fn test_node_set_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let set = NodeSet::new(vec![
            local_node(&dir, "node-b"),
            local_node(&dir, "node-a"),
            local_node(&dir, "node-c"),
        ])
        .unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.node_ids(), vec!["node-b", "node-a", "node-c"]);
        assert!(set.get("node-a").is_some());
        assert!(set.get("node-z").is_none());
    }

    #[test]
    fn test_node_set_rejects_duplicates_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NodeSet::new(Vec::new()).is_err());

        let result = NodeSet::new(vec![local_node(&dir, "node-a"), local_node(&dir, "node-a")]);
        assert!(matches!(result, Err(StowError::Config(_))));
    }
}
