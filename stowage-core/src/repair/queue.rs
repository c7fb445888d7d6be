use crate::metrics::Metrics;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A write that reached quorum but missed `target_node`. Replaying it sends
/// the exact original payload and checksum again.
#[derive(Debug, Clone)]
pub struct RepairJob {
    pub storage_id: String,
    pub target_node: String,
    pub payload: Bytes,
    pub checksum: String,
    pub attempts: u32,
}

impl RepairJob {
    pub fn new(
        storage_id: impl Into<String>,
        target_node: impl Into<String>,
        payload: Bytes,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            storage_id: storage_id.into(),
            target_node: target_node.into(),
            payload,
            checksum: checksum.into(),
            attempts: 0,
        }
    }

    fn in_flight_key(&self) -> (String, String) {
        (self.storage_id.clone(), self.target_node.clone())
    }
}

/// `(storage_id, target_node)` pairs queued or retained but not yet released.
type InFlight = Arc<Mutex<HashSet<(String, String)>>>;

/// Creates the two halves of the repair queue: the cloneable producer side
/// used by the write path and the inbox owned by the repair worker.
pub fn repair_channel(metrics: Arc<Metrics>) -> (RepairQueue, RepairInbox) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let backlog = Arc::new(AtomicUsize::new(0));
    let in_flight = InFlight::default();

    let queue = RepairQueue {
        sender,
        backlog: backlog.clone(),
        in_flight: in_flight.clone(),
        metrics: metrics.clone(),
    };
    let inbox = RepairInbox {
        receiver,
        backlog,
        in_flight,
        metrics,
    };
    (queue, inbox)
}

/// Producer side. Jobs live only in memory and are lost on restart.
#[derive(Clone)]
pub struct RepairQueue {
    sender: mpsc::UnboundedSender<RepairJob>,
    backlog: Arc<AtomicUsize>,
    in_flight: InFlight,
    metrics: Arc<Metrics>,
}

impl RepairQueue {
    /// Queue `job` unless a repair of the same chunk on the same node is
    /// already pending. Returns whether the job was queued.
    pub fn enqueue(&self, job: RepairJob) -> bool {
        let key = job.in_flight_key();
        if !lock_in_flight(&self.in_flight).insert(key.clone()) {
            tracing::debug!(
                "Repair already pending for storage_id={} target={}",
                job.storage_id,
                job.target_node
            );
            return false;
        }

        self.backlog.fetch_add(1, Ordering::SeqCst);
        self.metrics.repair_backlog.inc();

        if let Err(error) = self.sender.send(job) {
            lock_in_flight(&self.in_flight).remove(&key);
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            self.metrics.repair_backlog.dec();
            tracing::error!(
                "Repair worker is gone, dropping repair for storage_id={} target={}",
                error.0.storage_id,
                error.0.target_node
            );
            return false;
        }
        true
    }

    /// Jobs not yet resolved, whether still in the channel or retained by the
    /// worker for retry.
    pub fn backlog(&self) -> usize {
        self.backlog.load(Ordering::SeqCst)
    }
}

/// Consumer side, owned by `RepairWorker`.
pub struct RepairInbox {
    receiver: mpsc::UnboundedReceiver<RepairJob>,
    backlog: Arc<AtomicUsize>,
    in_flight: InFlight,
    metrics: Arc<Metrics>,
}

impl RepairInbox {
    /// Take every job that has arrived so far. Jobs sent after this returns
    /// stay in the channel for the next drain.
    pub fn drain(&mut self) -> Vec<RepairJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = self.receiver.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    /// Remove `job` from the backlog after it resolved or was dropped.
    pub fn release(&self, job: &RepairJob) {
        lock_in_flight(&self.in_flight).remove(&job.in_flight_key());
        self.backlog.fetch_sub(1, Ordering::SeqCst);
        self.metrics.repair_backlog.dec();
    }
}

fn lock_in_flight(
    in_flight: &InFlight,
) -> std::sync::MutexGuard<'_, HashSet<(String, String)>> {
    in_flight
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
