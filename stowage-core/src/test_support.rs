use crate::config::ReplicationConfig;
use crate::coordinator::Coordinator;
use crate::metrics::Metrics;
use crate::node::{DynStorageNode, LocalStorageNode, NodeSet, StorageNode};
use crate::storage::{ChunkPayload, ChunkStore, compute_checksum};
use crate::{Result, StowError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Chunk-store backed node that can be taken offline, made to hang on
/// writes, or made to serve corrupted bytes.
pub(crate) struct FlakyNode {
    inner: LocalStorageNode,
    online: AtomicBool,
    hang_writes: AtomicBool,
    corrupt_reads: AtomicBool,
    writes: AtomicUsize,
}

impl FlakyNode {
    pub(crate) fn new(dir: &Path, node_id: &str) -> Arc<Self> {
        let store = ChunkStore::new(dir.join(node_id)).unwrap();
        Arc::new(Self {
            inner: LocalStorageNode::new(node_id, Arc::new(store)),
            online: AtomicBool::new(true),
            hang_writes: AtomicBool::new(false),
            corrupt_reads: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn set_hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    pub(crate) fn set_corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn has_chunk(&self, storage_id: &str) -> bool {
        self.inner.store().chunk_exists(storage_id)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StowError::NodeUnreachable(self.inner.node_id().to_string()))
        }
    }
}

#[async_trait]
impl StorageNode for FlakyNode {
    fn node_id(&self) -> &str {
        self.inner.node_id()
    }

    async fn write_chunk(&self, storage_id: &str, data: Bytes, checksum: &str) -> Result<()> {
        if self.hang_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
        self.ensure_online()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_chunk(storage_id, data, checksum).await
    }

    async fn read_chunk(&self, storage_id: &str) -> Result<ChunkPayload> {
        self.ensure_online()?;
        let payload = self.inner.read_chunk(storage_id).await?;
        if !self.corrupt_reads.load(Ordering::SeqCst) {
            return Ok(payload);
        }

        let mut bytes = payload.bytes.to_vec();
        bytes.push(b'!');
        let checksum = compute_checksum(&bytes);
        Ok(ChunkPayload {
            bytes: Bytes::from(bytes),
            checksum,
        })
    }
}

pub(crate) fn flaky_cluster(
    dir: &Path,
    node_count: usize,
    write_quorum: usize,
) -> (Vec<Arc<FlakyNode>>, Arc<Coordinator>) {
    let flaky: Vec<Arc<FlakyNode>> = (1..=node_count)
        .map(|index| FlakyNode::new(dir, &format!("node-{}", index)))
        .collect();
    let nodes: Vec<DynStorageNode> = flaky
        .iter()
        .map(|node| node.clone() as DynStorageNode)
        .collect();

    let replication = ReplicationConfig {
        write_quorum,
        node_timeout_ms: 500,
    };
    let coordinator =
        Coordinator::new(NodeSet::new(nodes).unwrap(), &replication, Metrics::new()).unwrap();
    (flaky, Arc::new(coordinator))
}
