use super::{CHECKSUM_HEADER, StorageNode};
use crate::storage::{ChunkPayload, compute_checksum};
use crate::{Result, StowError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct NodeErrorPayload {
    #[serde(default)]
    error: String,
    #[serde(default)]
    actual: Option<String>,
}

/// Remote storage node reached over the `/data/{id}` HTTP contract.
#[derive(Clone)]
pub struct HttpStorageNode {
    node_id: String,
    base_url: String,
    client: Client,
}

impl HttpStorageNode {
    pub fn new(
        node_id: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|error| {
            StowError::Config(format!("invalid node url {}: {}", base_url, error))
        })?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| StowError::Http(error.to_string()))?;

        Ok(Self {
            node_id: node_id.into(),
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A 400 carrying `actual` is a checksum rejection; any other failure
    /// keeps the node's own error message.
    fn write_error(
        &self,
        storage_id: &str,
        checksum: &str,
        status: StatusCode,
        payload: Option<NodeErrorPayload>,
    ) -> StowError {
        let (message, actual) = payload
            .map(|payload| (payload.error, payload.actual))
            .unwrap_or_default();

        if status == StatusCode::BAD_REQUEST {
            if let Some(actual) = actual {
                return StowError::ChecksumMismatch {
                    expected: checksum.to_string(),
                    actual,
                };
            }
        }

        StowError::Http(format!(
            "chunk write failed: node={} status={} storage_id={} error={}",
            self.node_id, status, storage_id, message
        ))
    }

    fn chunk_url(&self, storage_id: &str) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|error| StowError::Http(error.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StowError::Http(format!("node url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push("data")
            .push(storage_id);
        Ok(url)
    }
}

#[async_trait]
impl StorageNode for HttpStorageNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn write_chunk(&self, storage_id: &str, data: Bytes, checksum: &str) -> Result<()> {
        let url = self.chunk_url(storage_id)?;
        let response = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(CHECKSUM_HEADER, checksum)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let payload = response.json::<NodeErrorPayload>().await.ok();
        Err(self.write_error(storage_id, checksum, status, payload))
    }

    async fn read_chunk(&self, storage_id: &str) -> Result<ChunkPayload> {
        let url = self.chunk_url(storage_id)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StowError::ChunkNotFound(storage_id.to_string()));
        }
        if !status.is_success() {
            return Err(StowError::Http(format!(
                "chunk read failed: node={} status={} storage_id={}",
                self.node_id, status, storage_id
            )));
        }

        let echoed = response
            .headers()
            .get(CHECKSUM_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let bytes = response.bytes().await?;
        let checksum = echoed.unwrap_or_else(|| compute_checksum(&bytes));

        Ok(ChunkPayload { bytes, checksum })
    }
}
