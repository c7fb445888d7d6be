use crate::{Result, StowError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Minimum acknowledging nodes for a write to commit (W).
    #[serde(default = "default_write_quorum")]
    pub write_quorum: usize,
    /// Deadline for every outbound node call.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            write_quorum: default_write_quorum(),
            node_timeout_ms: default_node_timeout_ms(),
        }
    }
}

impl ReplicationConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn validate(&self, node_count: usize) -> Result<()> {
        if self.write_quorum == 0 || self.write_quorum > node_count {
            return Err(StowError::Config(format!(
                "write_quorum must be between 1 and {} (node count), got {}",
                node_count, self.write_quorum
            )));
        }
        if self.node_timeout_ms == 0 {
            return Err(StowError::Config(
                "node_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    #[serde(default = "default_repair_interval_ms")]
    pub interval_ms: u64,
    /// Failed replays tolerated per job before it is dropped. `None` retries
    /// forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_repair_interval_ms(),
            max_attempts: None,
        }
    }
}

impl RepairConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(StowError::Config(
                "repair interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(StowError::Config(
                "repair max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Enqueue repair jobs for replicas that fail checksum verification on
    /// read. Off by default: repairs are driven by the write path only.
    #[serde(default)]
    pub repair_on_mismatch: bool,
}

fn default_write_quorum() -> usize {
    2
}

fn default_node_timeout_ms() -> u64 {
    2000
}

fn default_repair_interval_ms() -> u64 {
    10_000
}
