use crate::config::{ReadConfig, RepairConfig, ReplicationConfig};
use crate::coordinator::Coordinator;
use crate::metrics::Metrics;
use crate::node::NodeSet;
use crate::operations::{
    PutObjectOperation, PutObjectOperationRequest, PutObjectOperationResult, ReadObjectOperation,
    ReadObjectOperationOutcome, ReadObjectOperationRequest, ReadObjectOperationResult,
};
use crate::repair::{RepairQueue, RepairWorker, repair_channel};
use crate::storage::{MetadataStore, ObjectVersion};
use crate::{Result, StowError};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub replication: ReplicationConfig,
    pub repair: RepairConfig,
    pub read: ReadConfig,
}

/// Entry point for object traffic. Owns the write and read paths; the
/// matching `RepairWorker` is handed back from `new` for the caller to spawn.
#[derive(Clone)]
pub struct Gateway {
    coordinator: Arc<Coordinator>,
    metadata: Arc<MetadataStore>,
    repair_queue: RepairQueue,
    put_object: PutObjectOperation,
    read_object: ReadObjectOperation,
}

impl Gateway {
    pub fn new(
        nodes: NodeSet,
        metadata: Arc<MetadataStore>,
        settings: &GatewaySettings,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, RepairWorker)> {
        settings.repair.validate()?;

        let coordinator = Arc::new(Coordinator::new(
            nodes,
            &settings.replication,
            metrics.clone(),
        )?);
        let (repair_queue, inbox) = repair_channel(metrics);

        let put_object =
            PutObjectOperation::new(coordinator.clone(), metadata.clone(), repair_queue.clone());
        let read_object = ReadObjectOperation::new(
            coordinator.clone(),
            metadata.clone(),
            settings
                .read
                .repair_on_mismatch
                .then(|| repair_queue.clone()),
        );
        let worker = RepairWorker::new(inbox, coordinator.clone(), &settings.repair);

        Ok((
            Self {
                coordinator,
                metadata,
                repair_queue,
                put_object,
                read_object,
            },
            worker,
        ))
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<PutObjectOperationResult> {
        self.put_object
            .run(PutObjectOperationRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
                body,
            })
            .await
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ReadObjectOperationResult> {
        let outcome = self
            .read_object
            .run(ReadObjectOperationRequest {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
            .await?;

        match outcome {
            ReadObjectOperationOutcome::Found(result) => Ok(result),
            ReadObjectOperationOutcome::NotFound => {
                Err(StowError::ObjectNotFound(format!("{}/{}", bucket, key)))
            }
        }
    }

    pub async fn list_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>> {
        let versions = self.metadata.versions(bucket, key).await;
        if versions.is_empty() {
            return Err(StowError::ObjectNotFound(format!("{}/{}", bucket, key)));
        }
        Ok(versions)
    }

    pub async fn list_keys(&self, bucket: &str) -> Vec<String> {
        self.metadata.list_keys(bucket).await
    }

    pub fn repair_backlog(&self) -> usize {
        self.repair_queue.backlog()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.coordinator.metrics()
    }

    pub fn write_quorum(&self) -> usize {
        self.coordinator.write_quorum()
    }

    pub fn node_count(&self) -> usize {
        self.coordinator.nodes().len()
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.coordinator.nodes().node_ids()
    }
}
