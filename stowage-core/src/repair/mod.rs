//! Re-replication of chunks that missed a quorum-successful write.
//!
//! The write path enqueues one `RepairJob` per failed node through a
//! `RepairQueue`; a single `RepairWorker` owns the other end of the channel
//! and replays jobs on a fixed interval until the target accepts them.

pub mod queue;
pub mod worker;

pub use queue::{RepairInbox, RepairJob, RepairQueue, repair_channel};
pub use worker::{RepairTickReport, RepairWorker, RepairWorkerHandle};
