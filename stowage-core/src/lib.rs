//! Stowage Core - replication coordinator for a small object storage gateway
//!
//! Objects are replicated to a fixed set of storage nodes:
//! - writes fan out to every node and commit on a W-of-N quorum
//! - SHA256 checksums are verified by nodes on write and by the gateway on read
//! - nodes that missed a committed write are repaired in the background
//! - versioned object metadata is persisted as a single JSON index

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod node;
pub mod operations;
pub mod repair;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ReadConfig, RepairConfig, ReplicationConfig};
pub use coordinator::{Coordinator, FanOutReport, NodeWriteOutcome};
pub use error::{Result, StowError};
pub use gateway::{Gateway, GatewaySettings};
pub use metrics::Metrics;
pub use node::{
    CHECKSUM_HEADER, DynStorageNode, HttpStorageNode, LocalStorageNode, NodeSet, StorageNode,
};
pub use operations::{
    PutObjectOperation, PutObjectOperationRequest, PutObjectOperationResult, ReadObjectOperation,
    ReadObjectOperationOutcome, ReadObjectOperationRequest, ReadObjectOperationResult,
};
pub use repair::{
    RepairInbox, RepairJob, RepairQueue, RepairTickReport, RepairWorker, RepairWorkerHandle,
    repair_channel,
};
pub use storage::{
    ChunkPayload, ChunkStore, MetadataIndex, MetadataStore, ObjectVersion, compute_checksum,
    verify_checksum,
};
