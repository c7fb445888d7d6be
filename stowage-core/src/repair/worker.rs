use super::queue::{RepairInbox, RepairJob};
use crate::config::RepairConfig;
use crate::coordinator::Coordinator;
use crate::{Result, StowError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairTickReport {
    pub attempted: usize,
    pub resolved: usize,
    pub retained: usize,
    pub dead_lettered: usize,
}

/// Drains the repair queue on a fixed interval, replaying each job against
/// its target node. Failed jobs are kept for the next tick.
pub struct RepairWorker {
    inbox: RepairInbox,
    pending: Vec<RepairJob>,
    coordinator: Arc<Coordinator>,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl RepairWorker {
    pub fn new(inbox: RepairInbox, coordinator: Arc<Coordinator>, config: &RepairConfig) -> Self {
        Self {
            inbox,
            pending: Vec::new(),
            coordinator,
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }

    /// Jobs retained from failed replays, waiting for the next tick.
    pub fn pending(&self) -> &[RepairJob] {
        &self.pending
    }

    /// One repair pass over the retained jobs plus everything enqueued since
    /// the last pass.
    pub async fn run_once(&mut self) -> RepairTickReport {
        let mut working = std::mem::take(&mut self.pending);
        working.extend(self.inbox.drain());

        let mut report = RepairTickReport::default();
        if working.is_empty() {
            return report;
        }

        tracing::info!("Starting repair job for {} items...", working.len());

        let metrics = self.coordinator.metrics().clone();
        let mut retained = Vec::new();

        for mut job in working {
            report.attempted += 1;

            match self.replay(&job).await {
                Ok(()) => {
                    tracing::info!(
                        "Repair successful for {} on {}",
                        job.storage_id,
                        job.target_node
                    );
                    self.inbox.release(&job);
                    metrics.repair_jobs.with_label_values(&["resolved"]).inc();
                    report.resolved += 1;
                }
                Err(error) => {
                    job.attempts += 1;

                    if self
                        .max_attempts
                        .is_some_and(|max_attempts| job.attempts >= max_attempts)
                    {
                        tracing::error!(
                            "Repair abandoned after {} attempts: storage_id={} target={} error={}",
                            job.attempts,
                            job.storage_id,
                            job.target_node,
                            error
                        );
                        self.inbox.release(&job);
                        metrics
                            .repair_jobs
                            .with_label_values(&["dead_lettered"])
                            .inc();
                        report.dead_lettered += 1;
                        continue;
                    }

                    tracing::warn!(
                        "Repair failed, retrying next tick: storage_id={} target={} attempts={} error={}",
                        job.storage_id,
                        job.target_node,
                        job.attempts,
                        error
                    );
                    metrics.repair_jobs.with_label_values(&["retried"]).inc();
                    retained.push(job);
                }
            }
        }

        report.retained = retained.len();
        self.pending = retained;
        report
    }

    async fn replay(&self, job: &RepairJob) -> Result<()> {
        let node = self.coordinator.nodes().get(&job.target_node).ok_or_else(|| {
            StowError::Internal(format!("unknown repair target node: {}", job.target_node))
        })?;

        self.coordinator
            .write_to_node(node, &job.storage_id, job.payload.clone(), &job.checksum)
            .await
    }

    /// Run the worker on its interval until the handle is shut down. The
    /// first pass happens one interval after spawning.
    pub fn spawn(mut self) -> RepairWorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let report = self.run_once().await;
                        if report.attempted > 0 {
                            tracing::debug!(
                                "Repair tick: attempted={} resolved={} retained={} dead_lettered={}",
                                report.attempted,
                                report.resolved,
                                report.retained,
                                report.dead_lettered
                            );
                        }
                    }
                }
            }

            tracing::info!("Repair worker stopped with {} retained jobs", self.pending.len());
        });

        RepairWorkerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

pub struct RepairWorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RepairWorkerHandle {
    /// Stop the loop after the current pass, if any, completes.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(error) = self.task.await {
            tracing::warn!("Repair worker task ended abnormally: {}", error);
        }
    }
}
