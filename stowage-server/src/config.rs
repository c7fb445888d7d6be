use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use stowage_core::{
    GatewaySettings, ReadConfig, RepairConfig, ReplicationConfig, Result, StowError,
};

const ENV_PREFIX: &str = "STOWAGE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,
    pub nodes: Vec<NodeEndpointConfig>,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub read: ReadConfig,
    #[serde(default = "default_gateway_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEndpointConfig {
    pub node_id: String,
    pub url: String,
}

impl GatewayConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let config: GatewayConfig = load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(StowError::Config(
                "at least one storage node is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.node_id.trim().is_empty() {
                return Err(StowError::Config("node_id cannot be empty".to_string()));
            }
            if !seen.insert(node.node_id.as_str()) {
                return Err(StowError::Config(format!(
                    "duplicate node_id in nodes: {}",
                    node.node_id
                )));
            }
        }

        self.replication.validate(self.nodes.len())?;
        self.repair.validate()?;
        parse_bind_addr(&self.bind_addr)?;
        Ok(())
    }

    pub fn settings(&self) -> GatewaySettings {
        GatewaySettings {
            replication: self.replication.clone(),
            repair: self.repair.clone(),
            read: self.read.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeServerConfig {
    pub node_id: String,
    #[serde(default = "default_node_bind_addr")]
    pub bind_addr: String,
    /// Defaults to `storage_<port>` next to the working directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_node_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl NodeServerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let config: NodeServerConfig = load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(StowError::Config("node_id cannot be empty".to_string()));
        }
        parse_bind_addr(&self.bind_addr)?;
        Ok(())
    }

    pub fn effective_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let addr = parse_bind_addr(&self.bind_addr)?;
        Ok(PathBuf::from(format!("storage_{}", addr.port())))
    }
}

fn load<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let settings = ::config::Config::builder()
        .add_source(::config::File::with_name(path))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| StowError::Config(e.to_string()))?;

    settings
        .try_deserialize()
        .map_err(|e| StowError::Config(e.to_string()))
}

fn parse_bind_addr(bind_addr: &str) -> Result<SocketAddr> {
    bind_addr
        .parse()
        .map_err(|e| StowError::Config(format!("invalid bind_addr {}: {}", bind_addr, e)))
}

fn default_gateway_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_node_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("metadata.json")
}

fn default_gateway_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_node_max_body_bytes() -> usize {
    500 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_config(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_gateway_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "gateway.yaml",
            r#"
nodes:
  - node_id: node-1
    url: http://127.0.0.1:3001
  - node_id: node-2
    url: http://127.0.0.1:3002
  - node_id: node-3
    url: http://127.0.0.1:3003
"#,
        );

        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.metadata_path, PathBuf::from("metadata.json"));
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.replication.write_quorum, 2);
        assert_eq!(config.replication.node_timeout_ms, 2000);
        assert_eq!(config.repair.interval_ms, 10_000);
        assert!(config.repair.max_attempts.is_none());
        assert!(!config.read.repair_on_mismatch);
        assert_eq!(config.max_body_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_gateway_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "gateway.yaml",
            r#"
bind_addr: 127.0.0.1:9000
nodes:
  - node_id: a
    url: http://10.0.0.1:3001
  - node_id: b
    url: http://10.0.0.2:3001
replication:
  write_quorum: 1
  node_timeout_ms: 500
repair:
  interval_ms: 1000
  max_attempts: 5
read:
  repair_on_mismatch: true
"#,
        );

        let config = GatewayConfig::from_file(&path).unwrap();
        let settings = config.settings();
        assert_eq!(settings.replication.write_quorum, 1);
        assert_eq!(settings.replication.node_timeout_ms, 500);
        assert_eq!(settings.repair.max_attempts, Some(5));
        assert!(settings.read.repair_on_mismatch);
    }

    #[test]
    fn test_gateway_config_rejects_quorum_above_node_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "gateway.yaml",
            r#"
nodes:
  - node_id: node-1
    url: http://127.0.0.1:3001
replication:
  write_quorum: 2
"#,
        );

        assert!(matches!(
            GatewayConfig::from_file(&path),
            Err(StowError::Config(_))
        ));
    }

    #[test]
    fn test_gateway_config_rejects_duplicate_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "gateway.yaml",
            r#"
nodes:
  - node_id: node-1
    url: http://127.0.0.1:3001
  - node_id: node-1
    url: http://127.0.0.1:3002
replication:
  write_quorum: 1
"#,
        );

        assert!(GatewayConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_node_config_data_dir_follows_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "node.yaml",
            r#"
node_id: node-2
bind_addr: 127.0.0.1:3002
"#,
        );

        let config = NodeServerConfig::from_file(&path).unwrap();
        assert_eq!(
            config.effective_data_dir().unwrap(),
            PathBuf::from("storage_3002")
        );
        assert_eq!(config.max_body_bytes, 500 * 1024 * 1024);
    }
}
