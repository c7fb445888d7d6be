use crate::config::ReplicationConfig;
use crate::metrics::Metrics;
use crate::node::{DynStorageNode, NodeSet};
use crate::storage::ChunkPayload;
use crate::{Result, StowError};
use bytes::Bytes;
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Result of one node's part in a write fan-out.
#[derive(Debug)]
pub struct NodeWriteOutcome {
    pub node_id: String,
    pub result: Result<()>,
}

impl NodeWriteOutcome {
    pub fn is_ack(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every node's outcome for a single fan-out, in node-set order.
#[derive(Debug)]
pub struct FanOutReport {
    pub outcomes: Vec<NodeWriteOutcome>,
}

impl FanOutReport {
    pub fn acknowledged(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_ack()).count()
    }

    pub fn acknowledged_nodes(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_ack())
            .map(|outcome| outcome.node_id.clone())
            .collect()
    }

    pub fn failed_nodes(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.is_ack())
            .map(|outcome| outcome.node_id.clone())
            .collect()
    }
}

/// Coordinator owns the node set and the per-call deadline, and decides
/// write quorum.
pub struct Coordinator {
    nodes: NodeSet,
    write_quorum: usize,
    node_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl Coordinator {
    pub fn new(
        nodes: NodeSet,
        replication: &ReplicationConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        replication.validate(nodes.len())?;

        Ok(Self {
            nodes,
            write_quorum: replication.write_quorum,
            node_timeout: replication.node_timeout(),
            metrics,
        })
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn write_quorum(&self) -> usize {
        self.write_quorum
    }

    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn is_quorum(&self, acknowledged: usize) -> bool {
        acknowledged >= self.write_quorum
    }

    /// Write the chunk to every node concurrently and wait for all of them.
    ///
    /// No call is abandoned once quorum is reached: the full set of failures
    /// is needed to schedule repairs.
    pub async fn fan_out_write(
        &self,
        storage_id: &str,
        data: Bytes,
        checksum: &str,
    ) -> FanOutReport {
        let writes = self.nodes.iter().map(|node| {
            let data = data.clone();
            async move {
                let result = self.write_to_node(node, storage_id, data, checksum).await;
                NodeWriteOutcome {
                    node_id: node.node_id().to_string(),
                    result,
                }
            }
        });

        let outcomes = join_all(writes).await;

        for outcome in &outcomes {
            if let Err(error) = &outcome.result {
                self.metrics.record_node_failure(&outcome.node_id);
                tracing::warn!(
                    "Replica write failed: node={} storage_id={} error={}",
                    outcome.node_id,
                    storage_id,
                    error
                );
            }
        }

        FanOutReport { outcomes }
    }

    pub async fn write_to_node(
        &self,
        node: &DynStorageNode,
        storage_id: &str,
        data: Bytes,
        checksum: &str,
    ) -> Result<()> {
        with_deadline(
            node.node_id(),
            self.node_timeout,
            node.write_chunk(storage_id, data, checksum),
        )
        .await
    }

    pub async fn read_from_node(
        &self,
        node: &DynStorageNode,
        storage_id: &str,
    ) -> Result<ChunkPayload> {
        with_deadline(node.node_id(), self.node_timeout, node.read_chunk(storage_id)).await
    }
}

async fn with_deadline<T>(
    node_id: &str,
    deadline: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StowError::Timeout {
            node_id: node_id.to_string(),
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}
