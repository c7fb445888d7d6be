use crate::coordinator::Coordinator;
use crate::repair::{RepairJob, RepairQueue};
use crate::storage::{MetadataStore, ObjectVersion, compute_checksum};
use crate::{Result, StowError};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct PutObjectOperation {
    coordinator: Arc<Coordinator>,
    metadata: Arc<MetadataStore>,
    repair_queue: RepairQueue,
}

#[derive(Debug, Clone)]
pub struct PutObjectOperationRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct PutObjectOperationResult {
    pub version: ObjectVersion,
    pub acknowledged: usize,
    pub failed_nodes: Vec<String>,
}

impl PutObjectOperation {
    pub fn new(
        coordinator: Arc<Coordinator>,
        metadata: Arc<MetadataStore>,
        repair_queue: RepairQueue,
    ) -> Self {
        Self {
            coordinator,
            metadata,
            repair_queue,
        }
    }

    pub async fn run(
        &self,
        request: PutObjectOperationRequest,
    ) -> Result<PutObjectOperationResult> {
        let PutObjectOperationRequest { bucket, key, body } = request;

        if bucket.is_empty() || key.is_empty() {
            return Err(StowError::InvalidRequest(
                "bucket and key must be non-empty".to_string(),
            ));
        }

        let checksum = compute_checksum(&body);
        let storage_id = ulid::Ulid::new().to_string();
        let version_id = ulid::Ulid::new().to_string();
        let size = body.len() as u64;

        let report = self
            .coordinator
            .fan_out_write(&storage_id, body.clone(), &checksum)
            .await;
        let acknowledged = report.acknowledged();

        if !self.coordinator.is_quorum(acknowledged) {
            let orphaned = report.acknowledged_nodes();
            if !orphaned.is_empty() {
                tracing::warn!(
                    "Write quorum not met for {}/{}: storage_id={} left on nodes {:?}",
                    bucket,
                    key,
                    storage_id,
                    orphaned
                );
            }
            return Err(StowError::QuorumNotMet {
                required: self.coordinator.write_quorum(),
                acknowledged,
            });
        }

        let version = ObjectVersion {
            version_id,
            storage_id: storage_id.clone(),
            size,
            checksum: checksum.clone(),
            timestamp: Utc::now(),
        };
        self.metadata.append(&bucket, &key, version.clone()).await?;

        let failed_nodes = report.failed_nodes();
        if !failed_nodes.is_empty() {
            tracing::warn!(
                "Quorum met, but nodes failed: {:?}. Scheduling repair.",
                failed_nodes
            );
            for node_id in &failed_nodes {
                self.repair_queue.enqueue(RepairJob::new(
                    storage_id.clone(),
                    node_id.clone(),
                    body.clone(),
                    checksum.clone(),
                ));
            }
        }

        Ok(PutObjectOperationResult {
            version,
            acknowledged,
            failed_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::repair_channel;
    use crate::test_support::flaky_cluster;
    use tokio_test::assert_ok;

    fn request(key: &str, body: &'static str) -> PutObjectOperationRequest {
        PutObjectOperationRequest {
            bucket: "photos".to_string(),
            key: key.to_string(),
            body: Bytes::from(body),
        }
    }

    #[tokio::test]
    async fn test_put_all_nodes_ack() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, coordinator) = flaky_cluster(dir.path(), 3, 2);
        let (queue, mut inbox) = repair_channel(coordinator.metrics().clone());
        let metadata = Arc::new(MetadataStore::in_memory());
        let operation = PutObjectOperation::new(coordinator, metadata.clone(), queue.clone());

        let result = assert_ok!(operation.run(request("cat.jpg", "meow")).await);

        assert_eq!(result.acknowledged, 3);
        assert!(result.failed_nodes.is_empty());
        assert_eq!(result.version.size, 4);
        assert_eq!(result.version.checksum, compute_checksum(b"meow"));
        assert!(inbox.drain().is_empty());
        assert_eq!(queue.backlog(), 0);
        for node in &nodes {
            assert!(node.has_chunk(&result.version.storage_id));
        }
        assert_eq!(
            metadata.latest("photos", "cat.jpg").await,
            Some(result.version)
        );
    }

    #[tokio::test]
    async fn test_put_schedules_one_job_per_failed_node() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, coordinator) = flaky_cluster(dir.path(), 5, 3);
        let (queue, mut inbox) = repair_channel(coordinator.metrics().clone());
        let metadata = Arc::new(MetadataStore::in_memory());
        let operation = PutObjectOperation::new(coordinator, metadata, queue.clone());

        nodes[1].set_online(false);
        nodes[4].set_online(false);
        let result = assert_ok!(operation.run(request("dog.jpg", "woof")).await);

        assert_eq!(result.acknowledged, 3);
        assert_eq!(result.failed_nodes, vec!["node-2", "node-5"]);
        assert_eq!(queue.backlog(), 2);

        let jobs = inbox.drain();
        assert_eq!(jobs.len(), 2);
        for job in &jobs {
            assert_eq!(job.storage_id, result.version.storage_id);
            assert_eq!(job.payload, Bytes::from("woof"));
            assert_eq!(job.checksum, result.version.checksum);
            assert_eq!(job.attempts, 0);
        }
    }

    #[tokio::test]
    async fn test_quorum_miss_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, coordinator) = flaky_cluster(dir.path(), 3, 2);
        let (queue, mut inbox) = repair_channel(coordinator.metrics().clone());
        let metadata = Arc::new(MetadataStore::in_memory());
        let operation = PutObjectOperation::new(coordinator, metadata.clone(), queue.clone());

        nodes[0].set_online(false);
        nodes[2].set_online(false);
        let error = operation.run(request("cat.jpg", "meow")).await.unwrap_err();

        assert!(matches!(
            error,
            StowError::QuorumNotMet {
                required: 2,
                acknowledged: 1
            }
        ));
        assert!(metadata.latest("photos", "cat.jpg").await.is_none());
        assert_eq!(queue.backlog(), 0);
        assert!(inbox.drain().is_empty());
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, coordinator) = flaky_cluster(dir.path(), 3, 2);
        let (queue, _inbox) = repair_channel(coordinator.metrics().clone());
        let operation =
            PutObjectOperation::new(coordinator, Arc::new(MetadataStore::in_memory()), queue);

        let error = operation.run(request("", "meow")).await.unwrap_err();
        assert!(matches!(error, StowError::InvalidRequest(_)));
        assert_eq!(nodes[0].write_count(), 0);
    }

    #[tokio::test]
    async fn test_versions_are_prepended() {
        let dir = tempfile::tempdir().unwrap();
        let (_nodes, coordinator) = flaky_cluster(dir.path(), 3, 2);
        let (queue, _inbox) = repair_channel(coordinator.metrics().clone());
        let metadata = Arc::new(MetadataStore::in_memory());
        let operation = PutObjectOperation::new(coordinator, metadata.clone(), queue);

        let first = operation.run(request("notes.txt", "v1")).await.unwrap();
        let second = operation.run(request("notes.txt", "v2")).await.unwrap();

        let versions = metadata.versions("photos", "notes.txt").await;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version_id, second.version.version_id);
        assert_eq!(versions[1].version_id, first.version.version_id);
        assert_ne!(first.version.storage_id, second.version.storage_id);
    }
}
