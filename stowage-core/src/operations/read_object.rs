use crate::coordinator::Coordinator;
use crate::repair::{RepairJob, RepairQueue};
use crate::storage::{MetadataStore, ObjectVersion, verify_checksum};
use crate::{Result, StowError};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReadObjectOperation {
    coordinator: Arc<Coordinator>,
    metadata: Arc<MetadataStore>,
    repair_queue: Option<RepairQueue>,
}

#[derive(Debug, Clone)]
pub struct ReadObjectOperationRequest {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct ReadObjectOperationResult {
    pub version: ObjectVersion,
    pub body: Bytes,
    pub served_by: String,
}

#[derive(Debug, Clone)]
pub enum ReadObjectOperationOutcome {
    Found(ReadObjectOperationResult),
    NotFound,
}

impl ReadObjectOperation {
    /// `repair_queue` is only set when mismatching replicas found on read
    /// should be rewritten.
    pub fn new(
        coordinator: Arc<Coordinator>,
        metadata: Arc<MetadataStore>,
        repair_queue: Option<RepairQueue>,
    ) -> Self {
        Self {
            coordinator,
            metadata,
            repair_queue,
        }
    }

    pub async fn run(
        &self,
        request: ReadObjectOperationRequest,
    ) -> Result<ReadObjectOperationOutcome> {
        let ReadObjectOperationRequest { bucket, key } = request;

        let Some(version) = self.metadata.latest(&bucket, &key).await else {
            return Ok(ReadObjectOperationOutcome::NotFound);
        };

        let metrics = self.coordinator.metrics();
        let mut mismatched = Vec::new();

        for node in self.coordinator.nodes().iter() {
            let payload = match self
                .coordinator
                .read_from_node(node, &version.storage_id)
                .await
            {
                Ok(payload) => payload,
                Err(error) => {
                    if error.is_node_failure() {
                        tracing::warn!(
                            "Replica read failed: node={} storage_id={} error={}",
                            node.node_id(),
                            version.storage_id,
                            error
                        );
                    } else {
                        tracing::error!(
                            "Replica read error: node={} storage_id={} error={}",
                            node.node_id(),
                            version.storage_id,
                            error
                        );
                    }
                    continue;
                }
            };

            if let Err(error) = verify_checksum(&payload.bytes, &version.checksum) {
                metrics
                    .checksum_mismatch
                    .with_label_values(&[node.node_id()])
                    .inc();
                tracing::warn!(
                    "Replica failed verification: node={} storage_id={} error={}",
                    node.node_id(),
                    version.storage_id,
                    error
                );
                mismatched.push(node.node_id().to_string());
                continue;
            }

            if let Some(queue) = &self.repair_queue {
                for node_id in mismatched {
                    queue.enqueue(RepairJob::new(
                        version.storage_id.clone(),
                        node_id,
                        payload.bytes.clone(),
                        version.checksum.clone(),
                    ));
                }
            }

            return Ok(ReadObjectOperationOutcome::Found(ReadObjectOperationResult {
                served_by: node.node_id().to_string(),
                body: payload.bytes,
                version,
            }));
        }

        Err(StowError::DataUnavailable(format!(
            "no replica of {}/{} passed verification",
            bucket, key
        )))
    }
}
