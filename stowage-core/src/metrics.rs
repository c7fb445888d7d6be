use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Counters and gauges the replication path updates. Updates are
/// fire-and-forget and never affect the outcome of a request.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub node_failures: IntCounterVec,
    pub checksum_mismatch: IntCounterVec,
    pub repair_backlog: IntGauge,
    pub repair_jobs: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        let registry = Registry::new();

        let node_failures = IntCounterVec::new(
            Opts::new("stowage_node_failures_total", "Storage node failures"),
            &["node"],
        )
        .expect("node_failures");
        let checksum_mismatch = IntCounterVec::new(
            Opts::new(
                "stowage_checksum_mismatch_total",
                "Replicas that failed checksum verification on read",
            ),
            &["node"],
        )
        .expect("checksum_mismatch");
        let repair_backlog = IntGauge::new("stowage_repair_backlog", "Pending repairs")
            .expect("repair_backlog");
        let repair_jobs = IntCounterVec::new(
            Opts::new("stowage_repair_jobs_total", "Repair job attempts"),
            &["result"],
        )
        .expect("repair_jobs");

        register_collector(&registry, &node_failures);
        register_collector(&registry, &checksum_mismatch);
        register_collector(&registry, &repair_backlog);
        register_collector(&registry, &repair_jobs);

        Arc::new(Self {
            registry,
            node_failures,
            checksum_mismatch,
            repair_backlog,
            repair_jobs,
        })
    }

    pub fn record_node_failure(&self, node_id: &str) {
        self.node_failures.with_label_values(&[node_id]).inc();
    }

    pub fn node_failure_count(&self, node_id: &str) -> u64 {
        self.node_failures.with_label_values(&[node_id]).get()
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn encode_text(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(error) = encoder.encode(&self.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", error);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn register_collector<C>(registry: &Registry, collector: &C)
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone())).ok();
}
